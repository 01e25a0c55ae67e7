//! Continuous conflict detection loop.
//!
//! Periodically scans a snapshot of airborne aircraft, replaces the stored
//! conflict picture and publishes each cycle's alerts. HIGH and CRITICAL
//! alerts are logged as operator advisories.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use radar_core::{ConflictAlert, ConflictDetector};

use crate::state::World;

/// Run one detection pass against the world and publish the result.
///
/// The previous cycle's alerts are superseded even when the new scan is
/// empty.
pub fn scan_and_publish(
    world: &World,
    detector: &ConflictDetector,
    alerts_tx: &broadcast::Sender<Vec<ConflictAlert>>,
    now: DateTime<Utc>,
) -> Vec<ConflictAlert> {
    let airborne = world.airborne_aircraft();
    let alerts = detector.scan_once(&airborne, now);
    world.replace_conflicts(&alerts);

    if !alerts.is_empty() {
        tracing::debug!(
            "Detected {} conflict(s) among {} airborne aircraft",
            alerts.len(),
            airborne.len()
        );
    }

    for alert in alerts.iter().filter(|alert| alert.requires_notification()) {
        for aircraft_id in [&alert.aircraft1_id, &alert.aircraft2_id] {
            if let Some(advisory) = alert.advisory_for(aircraft_id) {
                tracing::warn!("[{:?}] to {}: {}", alert.severity, aircraft_id, advisory);
            }
        }
    }

    let _ = alerts_tx.send(alerts.clone());
    alerts
}

/// Start the conflict detection loop.
pub async fn run_conflict_loop(
    world: Arc<World>,
    detector: ConflictDetector,
    period: Duration,
    alerts_tx: broadcast::Sender<Vec<ConflictAlert>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    if period.is_zero() {
        tracing::error!("Conflict loop not started: scan period is zero");
        return;
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Conflict loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                scan_and_publish(&world, &detector, &alerts_tx, Utc::now());
            }
        }
    }
}
