//! Adaptive failure tracking, blocking and slowdown.
//!
//! # State
//! - Per address: failures in the current sliding window, time of the last
//!   failure, block expiry, accumulated slowdown.
//! - Per IPv4 /24: block expiry, created when an address inside it is blocked.
//!
//! # Rules
//! - The failure count restarts at zero when more than `fail_window` has
//!   passed since the previous failure.
//! - Reaching `max_failures` blocks the address until `now + block_duration`
//!   and, unless the address is loopback or not IPv4, its /24 as well. Each
//!   further qualifying failure moves both expiries to `now + block_duration`.
//! - Slowdown grows by `slowdown_step` per failure, capped at `slowdown_max`.
//! - A success forgets the address entirely.
//! - Cleanup drops addresses idle for more than ten windows and expired subnets.
//!
//! Both maps sit behind one mutex. Nothing logs or sleeps while it is held.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::observability::metrics;

/// Idle addresses survive this many failure windows before cleanup.
const CLEANUP_WINDOWS: i32 = 10;

#[derive(Debug, Clone)]
struct AddressState {
    failures: u32,
    last_seen: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
    slowdown: Duration,
}

impl AddressState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            failures: 0,
            last_seen: now,
            blocked_until: None,
            slowdown: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    addresses: HashMap<String, AddressState>,
    subnets: HashMap<Ipv4Addr, DateTime<Utc>>,
}

/// What a recorded failure did to the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Failures inside the current window, including this one.
    pub failures: u32,
    /// Delay now applied to the address.
    pub slowdown: Duration,
    /// This failure brought the slowdown up to the ceiling.
    pub slowdown_capped: bool,
    /// Set when this failure blocked (or re-blocked) the address.
    pub blocked_until: Option<DateTime<Utc>>,
    /// Network address of the /24 blocked alongside it.
    pub blocked_subnet: Option<Ipv4Addr>,
}

/// Result of one cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CleanupReport {
    pub addresses_removed: usize,
    pub subnets_removed: usize,
    pub addresses_remaining: usize,
    pub subnets_remaining: usize,
}

/// Point-in-time counts for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackerStats {
    pub tracked_addresses: usize,
    pub blocked_addresses: usize,
    pub subnet_blocks: usize,
}

/// Shared failure/block/slowdown bookkeeping for client addresses.
///
/// Constructed once and shared via `Arc`; every operation takes the same
/// exclusive lock, so per-address updates are totally ordered.
pub struct AbuseTracker {
    state: Mutex<TrackerState>,
    clock: Arc<dyn Clock>,
    max_failures: u32,
    fail_window: TimeDelta,
    block_duration: TimeDelta,
    slowdown_step: Duration,
    slowdown_max: Duration,
}

impl AbuseTracker {
    pub fn new(config: &SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            clock,
            max_failures: config.max_failures,
            fail_window: delta(config.fail_window()),
            block_duration: delta(config.block_duration()),
            slowdown_step: config.slowdown_step(),
            slowdown_max: config.slowdown_max(),
        }
    }

    // Operations are total, so a panic elsewhere must not wedge the tracker.
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while the address, or its /24, is blocked.
    pub fn is_blocked(&self, address: &str) -> bool {
        let now = self.clock.now_utc();
        let subnet = subnet_of(address);
        let state = self.lock();

        let address_blocked = state
            .addresses
            .get(address)
            .and_then(|s| s.blocked_until)
            .is_some_and(|until| now < until);

        address_blocked
            || subnet
                .and_then(|net| state.subnets.get(&net))
                .is_some_and(|until| now < *until)
    }

    /// Delay to apply before processing the address; zero if untracked.
    pub fn current_slowdown(&self, address: &str) -> Duration {
        self.lock()
            .addresses
            .get(address)
            .map(|s| s.slowdown)
            .unwrap_or_default()
    }

    /// Count a failed attempt.
    pub fn record_failure(&self, address: &str) -> FailureOutcome {
        let now = self.clock.now_utc();
        let subnet = escalation_subnet(address);

        let outcome = {
            let mut guard = self.lock();
            let TrackerState { addresses, subnets } = &mut *guard;
            let entry = addresses
                .entry(address.to_string())
                .or_insert_with(|| AddressState::new(now));

            if now - entry.last_seen > self.fail_window {
                entry.failures = 0;
            }
            entry.failures = entry.failures.saturating_add(1);
            entry.last_seen = now;

            let mut slowdown_capped = false;
            if entry.slowdown < self.slowdown_max {
                entry.slowdown = entry
                    .slowdown
                    .saturating_add(self.slowdown_step)
                    .min(self.slowdown_max);
                slowdown_capped = entry.slowdown == self.slowdown_max;
            }

            let mut outcome = FailureOutcome {
                failures: entry.failures,
                slowdown: entry.slowdown,
                slowdown_capped,
                blocked_until: None,
                blocked_subnet: None,
            };

            if entry.failures >= self.max_failures {
                let until = now
                    .checked_add_signed(self.block_duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                entry.blocked_until = Some(until);
                outcome.blocked_until = Some(until);

                if let Some(net) = subnet {
                    subnets.insert(net, until);
                    outcome.blocked_subnet = Some(net);
                }
            }

            outcome
        };

        tracing::info!(
            client = %address,
            failures = outcome.failures,
            max_failures = self.max_failures,
            "Recording failure"
        );
        if outcome.slowdown_capped {
            tracing::info!(client = %address, slowdown = ?self.slowdown_max, "Client reached maximum slowdown");
        }
        if let Some(until) = outcome.blocked_until {
            tracing::warn!(
                client = %address,
                failures = outcome.failures,
                until = %until,
                "Blocking client"
            );
            metrics::record_block("address");
        }
        if let Some(net) = outcome.blocked_subnet {
            tracing::warn!(subnet = %format!("{net}/24"), "Blocking subnet");
            metrics::record_block("subnet");
        }

        outcome
    }

    /// Forget everything about the address. Returns whether it was tracked.
    pub fn record_success(&self, address: &str) -> bool {
        let removed = self.lock().addresses.remove(address).is_some();
        if removed {
            tracing::info!(client = %address, "Resetting failure count after successful authentication");
        }
        removed
    }

    /// Drop idle addresses and expired subnet blocks.
    pub fn run_cleanup(&self) -> CleanupReport {
        let now = self.clock.now_utc();
        let horizon = self
            .fail_window
            .checked_mul(CLEANUP_WINDOWS)
            .unwrap_or(TimeDelta::MAX);

        let mut state = self.lock();
        let addresses_before = state.addresses.len();
        let subnets_before = state.subnets.len();

        state.addresses.retain(|_, s| now - s.last_seen <= horizon);
        state.subnets.retain(|_, until| *until >= now);

        CleanupReport {
            addresses_removed: addresses_before - state.addresses.len(),
            subnets_removed: subnets_before - state.subnets.len(),
            addresses_remaining: state.addresses.len(),
            subnets_remaining: state.subnets.len(),
        }
    }

    pub fn stats(&self) -> TrackerStats {
        let now = self.clock.now_utc();
        let state = self.lock();
        TrackerStats {
            tracked_addresses: state.addresses.len(),
            blocked_addresses: state
                .addresses
                .values()
                .filter(|s| s.blocked_until.is_some_and(|until| now < until))
                .count(),
            subnet_blocks: state.subnets.values().filter(|until| now < **until).count(),
        }
    }
}

impl std::fmt::Debug for AbuseTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbuseTracker")
            .field("max_failures", &self.max_failures)
            .field("fail_window", &self.fail_window)
            .field("block_duration", &self.block_duration)
            .finish_non_exhaustive()
    }
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

/// IPv4 view of an address, unwrapping IPv4-mapped IPv6.
fn ipv4_of(address: &str) -> Option<Ipv4Addr> {
    match address.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

fn mask24(v4: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(v4) & 0xFFFF_FF00)
}

/// The /24 network address containing `address`, if it is IPv4.
pub fn subnet_of(address: &str) -> Option<Ipv4Addr> {
    ipv4_of(address).map(mask24)
}

// Loopback clients are never escalated to a subnet block.
fn escalation_subnet(address: &str) -> Option<Ipv4Addr> {
    ipv4_of(address).filter(|v4| !v4.is_loopback()).map(mask24)
}

/// Background sweep calling [`AbuseTracker::run_cleanup`] on a fixed interval.
pub struct CleanupTask {
    tracker: Arc<AbuseTracker>,
    tick: Duration,
}

impl CleanupTask {
    pub fn new(tracker: Arc<AbuseTracker>, tick: Duration) -> Self {
        Self {
            tracker,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Sweep every tick until the shutdown signal fires.
    ///
    /// The first sweep happens one full tick after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.tick, "Abuse tracker cleanup starting");

        let mut ticker = time::interval_at(time::Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tracker.run_cleanup();
                    tracing::info!(
                        tracked_addresses = report.addresses_remaining,
                        subnet_blocks = report.subnets_remaining,
                        cleaned_addresses = report.addresses_removed,
                        cleaned_subnets = report.subnets_removed,
                        "Security stats"
                    );
                    metrics::record_tracker_size(report.addresses_remaining, report.subnets_remaining);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cleanup task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
