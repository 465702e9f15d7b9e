use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use clap::{Parser, Subcommand};
use rand::RngCore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use gatekeeper::security::signature::{
    canonical_message, sign, signed_path, X_SIGNATURE, X_TIMESTAMP,
};

#[derive(Parser)]
#[command(name = "gatekeeper-cli")]
#[command(about = "Client and operator CLI for the gatekeeper", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the headers for a signed request
    Sign {
        #[arg(long)]
        token: String,
        #[arg(long)]
        secret: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
        /// Unix seconds; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Generate a random HMAC secret and API token
    GenerateSecrets {
        /// Random bytes in the secret
        #[arg(long, default_value_t = 64, allow_negative_numbers = true)]
        secret_length: i64,
        /// Random bytes in the token
        #[arg(long, default_value_t = 64, allow_negative_numbers = true)]
        token_length: i64,
    },
    /// Send a signed request and print the response
    Request {
        #[arg(long)]
        token: String,
        #[arg(long)]
        secret: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Check service status (admin)
    Status {
        #[arg(short, long)]
        admin_key: String,
    },
    /// Show abuse tracker counts (admin)
    Security {
        #[arg(short, long)]
        admin_key: String,
    },
}

/// The three headers of a signed request for `path` as it will be sent.
fn signature_headers(
    token: &str,
    secret: &str,
    method: &str,
    path: &str,
    timestamp: i64,
) -> [(&'static str, String); 3] {
    let timestamp = timestamp.to_string();
    let signature = sign(
        secret.as_bytes(),
        &canonical_message(token, &timestamp, method, &signed_path(path)),
    );
    [
        ("authorization", format!("Bearer {token}")),
        (X_TIMESTAMP, timestamp),
        (X_SIGNATURE, signature),
    ]
}

fn random_string(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let now = chrono::Utc::now().timestamp();

    match cli.command {
        Commands::Sign {
            token,
            secret,
            method,
            path,
            timestamp,
        } => {
            let method = method.to_uppercase();
            for (name, value) in
                signature_headers(&token, &secret, &method, &path, timestamp.unwrap_or(now))
            {
                println!("{name}: {value}");
            }
        }
        Commands::GenerateSecrets {
            secret_length,
            token_length,
        } => {
            if secret_length <= 0 || token_length <= 0 {
                return Err("both lengths must be positive integers".into());
            }
            println!("Generated Secure Secret: {}", random_string(secret_length as usize));
            println!("Generated API Access Token: {}", random_string(token_length as usize));
        }
        Commands::Request {
            token,
            secret,
            method,
            path,
            body,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut headers = HeaderMap::new();
            for (name, value) in signature_headers(&token, &secret, method.as_str(), &path, now) {
                headers.insert(name, HeaderValue::from_str(&value)?);
            }

            let mut request = client
                .request(method, format!("{}{}", cli.url, path))
                .headers(headers);
            if let Some(body) = body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body);
            }
            print_response(request.send().await?).await?;
        }
        Commands::Status { admin_key } => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(admin_headers(&admin_key)?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Security { admin_key } => {
            let res = client
                .get(format!("{}/admin/security", cli.url))
                .headers(admin_headers(&admin_key)?)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn admin_headers(key: &str) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    Ok(headers)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("Status: {status}");

    let text = res.text().await?;
    if text.is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
