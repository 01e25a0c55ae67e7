//! Conflict detection between airborne aircraft.
//!
//! Every pair of airborne aircraft with a known position is checked against
//! [`SeparationRules`]. A scan is stateless: each cycle's alerts supersede the
//! previous cycle's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy;
use crate::models::{AircraftState, GeoPoint};
use crate::rules::SeparationRules;

/// Severity levels for detected conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Low,
    /// Inside the advisory band
    Medium,
    /// Separation minima violated
    High,
    /// Immediate collision risk
    Critical,
}

/// Detected conflict between two aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictAlert {
    /// Lexicographically smaller id of the pair
    pub aircraft1_id: String,
    pub aircraft2_id: String,
    pub horizontal_distance_km: f64,
    pub vertical_separation_m: f64,
    pub closing_speed_kmh: f64,
    /// Seconds until the horizontal gap closes; `None` when not closing
    pub time_to_conflict_s: Option<f64>,
    pub severity: ConflictSeverity,
    pub detected_at: DateTime<Utc>,
}

impl ConflictAlert {
    /// Time to conflict, infinite when the aircraft are not closing.
    pub fn time_to_conflict(&self) -> f64 {
        self.time_to_conflict_s.unwrap_or(f64::INFINITY)
    }

    pub fn involves(&self, aircraft_id: &str) -> bool {
        self.aircraft1_id == aircraft_id || self.aircraft2_id == aircraft_id
    }

    /// HIGH and CRITICAL alerts are relayed to operators.
    pub fn requires_notification(&self) -> bool {
        self.severity >= ConflictSeverity::High
    }

    /// Operator-facing advisory addressed to one aircraft of the pair.
    pub fn advisory_for(&self, aircraft_id: &str) -> Option<String> {
        let other = if aircraft_id == self.aircraft1_id {
            &self.aircraft2_id
        } else if aircraft_id == self.aircraft2_id {
            &self.aircraft1_id
        } else {
            return None;
        };

        let prefix = match self.severity {
            ConflictSeverity::Critical => "CRITICAL ALERT",
            ConflictSeverity::High => "ALERT",
            ConflictSeverity::Medium | ConflictSeverity::Low => "ADVISORY",
        };

        let mut message = format!(
            "{}: traffic {} - distance {:.1} km - vertical {:.0} m",
            prefix, other, self.horizontal_distance_km, self.vertical_separation_m
        );

        if let Some(secs) = self.time_to_conflict_s.filter(|secs| secs.is_finite() && *secs > 0.0) {
            message.push_str(&format!(" - est. {:.0} s", secs));
        }

        match self.severity {
            ConflictSeverity::Critical => {
                message.push_str(" - ACTION REQUIRED: adjust altitude or speed immediately")
            }
            ConflictSeverity::High => message.push_str(" - monitor closely"),
            _ => {}
        }

        Some(message)
    }
}

/// Approximate closing speed from headings and ground speeds (km/h).
///
/// Aircraft whose headings differ by more than `converging_heading_deg` are
/// treated as converging (speeds add); otherwise as travelling the same way
/// (speed difference). This is not a relative-velocity vector.
pub fn closing_speed_kmh(
    speed_a_kmh: f64,
    heading_a_deg: f64,
    speed_b_kmh: f64,
    heading_b_deg: f64,
    converging_heading_deg: f64,
) -> f64 {
    if geodesy::heading_difference(heading_a_deg, heading_b_deg) > converging_heading_deg {
        speed_a_kmh + speed_b_kmh
    } else {
        (speed_a_kmh - speed_b_kmh).abs()
    }
}

/// Pairwise proximity detector.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    pub rules: SeparationRules,
}

impl ConflictDetector {
    pub fn new(rules: SeparationRules) -> Self {
        Self { rules }
    }

    /// Severity for the given geometry, or `None` when no alert is due.
    pub fn classify(
        &self,
        horizontal_km: f64,
        vertical_m: f64,
        time_to_conflict_s: Option<f64>,
    ) -> Option<ConflictSeverity> {
        let rules = &self.rules;
        let severity = if horizontal_km < rules.critical_horizontal_km && vertical_m < rules.vertical_m {
            ConflictSeverity::Critical
        } else if horizontal_km < rules.high_horizontal_km && vertical_m < rules.vertical_m {
            ConflictSeverity::High
        } else if horizontal_km < rules.medium_horizontal_km && vertical_m < rules.medium_vertical_m {
            ConflictSeverity::Medium
        } else {
            return None;
        };

        let imminent = time_to_conflict_s
            .map(|secs| secs < rules.imminent_secs)
            .unwrap_or(false);
        if imminent {
            return Some(ConflictSeverity::Critical);
        }

        Some(severity)
    }

    /// Check one pair. Both aircraft must be airborne with a known position.
    pub fn check_pair(
        &self,
        a: &AircraftState,
        b: &AircraftState,
        now: DateTime<Utc>,
    ) -> Option<ConflictAlert> {
        let pos_a = a.airborne_position()?;
        let pos_b = b.airborne_position()?;
        self.check_positions(a, pos_a, b, pos_b, now)
    }

    fn check_positions(
        &self,
        a: &AircraftState,
        pos_a: GeoPoint,
        b: &AircraftState,
        pos_b: GeoPoint,
        now: DateTime<Utc>,
    ) -> Option<ConflictAlert> {
        let horizontal_distance_km = pos_a.distance_km(&pos_b);
        let vertical_separation_m = (a.altitude_m - b.altitude_m).abs();
        let closing_speed_kmh = closing_speed_kmh(
            a.ground_speed_kmh,
            a.heading_deg,
            b.ground_speed_kmh,
            b.heading_deg,
            self.rules.converging_heading_deg,
        );
        let time_to_conflict_s = if closing_speed_kmh > 0.0 {
            Some(horizontal_distance_km / closing_speed_kmh * 3600.0)
        } else {
            None
        };

        let severity = self.classify(horizontal_distance_km, vertical_separation_m, time_to_conflict_s)?;

        let (aircraft1_id, aircraft2_id) = if a.aircraft_id <= b.aircraft_id {
            (a.aircraft_id.clone(), b.aircraft_id.clone())
        } else {
            (b.aircraft_id.clone(), a.aircraft_id.clone())
        };

        Some(ConflictAlert {
            aircraft1_id,
            aircraft2_id,
            horizontal_distance_km,
            vertical_separation_m,
            closing_speed_kmh,
            time_to_conflict_s,
            severity,
            detected_at: now,
        })
    }

    /// Scan every unordered pair of airborne aircraft in the snapshot.
    ///
    /// Aircraft that are not airborne or have no position are ignored.
    pub fn scan_once(&self, aircraft: &[AircraftState], now: DateTime<Utc>) -> Vec<ConflictAlert> {
        let airborne: Vec<(&AircraftState, GeoPoint)> = aircraft
            .iter()
            .filter_map(|state| state.airborne_position().map(|pos| (state, pos)))
            .collect();

        let mut alerts = Vec::new();
        for i in 0..airborne.len() {
            for j in (i + 1)..airborne.len() {
                let (a, pos_a) = airborne[i];
                let (b, pos_b) = airborne[j];
                if a.aircraft_id == b.aircraft_id {
                    continue;
                }
                if let Some(alert) = self.check_positions(a, pos_a, b, pos_b, now) {
                    alerts.push(alert);
                }
            }
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AircraftStatus;

    fn at(id: &str, origin: GeoPoint, bearing: f64, distance_km: f64, altitude_m: f64) -> AircraftState {
        let position = origin.project(bearing, distance_km);
        AircraftState::airborne(id, position, altitude_m, 0.0, 0.0, Utc::now())
    }

    fn origin() -> GeoPoint {
        GeoPoint::new(33.3675, -7.5898)
    }

    #[test]
    fn critical_when_close_and_level() {
        let a = at("A", origin(), 0.0, 0.0, 10_000.0);
        let b = at("B", origin(), 90.0, 1.5, 10_100.0);

        let alerts = ConflictDetector::default().scan_once(&[a, b], Utc::now());
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.severity, ConflictSeverity::Critical);
        assert!((alert.horizontal_distance_km - 1.5).abs() < 1e-6);
        assert!((alert.vertical_separation_m - 100.0).abs() < 1e-9);
    }

    #[test]
    fn severity_bands() {
        let detector = ConflictDetector::default();
        assert_eq!(detector.classify(1.9, 299.0, None), Some(ConflictSeverity::Critical));
        assert_eq!(detector.classify(4.9, 299.0, None), Some(ConflictSeverity::High));
        assert_eq!(detector.classify(1.9, 350.0, None), Some(ConflictSeverity::Medium));
        assert_eq!(detector.classify(7.4, 449.0, None), Some(ConflictSeverity::Medium));
        assert_eq!(detector.classify(7.5, 100.0, None), None);
        assert_eq!(detector.classify(3.0, 450.0, None), None);
    }

    #[test]
    fn imminent_closure_escalates_flagged_pairs_only() {
        let detector = ConflictDetector::default();
        assert_eq!(detector.classify(7.0, 400.0, Some(30.0)), Some(ConflictSeverity::Critical));
        assert_eq!(detector.classify(7.0, 400.0, Some(90.0)), Some(ConflictSeverity::Medium));
        assert_eq!(detector.classify(20.0, 0.0, Some(5.0)), None);
    }

    #[test]
    fn closing_speed_depends_on_heading_difference() {
        assert_eq!(closing_speed_kmh(800.0, 90.0, 700.0, 270.0, 90.0), 1500.0);
        assert_eq!(closing_speed_kmh(800.0, 10.0, 700.0, 350.0, 90.0), 100.0);
        assert_eq!(closing_speed_kmh(800.0, 0.0, 800.0, 0.0, 90.0), 0.0);
    }

    #[test]
    fn head_on_pair_reports_time_to_conflict() {
        let a = AircraftState::airborne("A", origin(), 10_000.0, 800.0, 90.0, Utc::now());
        let b_pos = origin().project(90.0, 6.0);
        let b = AircraftState::airborne("B", b_pos, 10_000.0, 700.0, 270.0, Utc::now());

        let alert = ConflictDetector::default()
            .check_pair(&a, &b, Utc::now())
            .expect("conflict");
        assert_eq!(alert.closing_speed_kmh, 1500.0);
        // 6 km at 1500 km/h = 14.4 s, well inside the imminent window
        let ttc = alert.time_to_conflict();
        assert!((ttc - 14.4).abs() < 0.01);
        assert_eq!(alert.severity, ConflictSeverity::Critical);
    }

    #[test]
    fn parallel_pair_has_infinite_time_to_conflict() {
        let a = AircraftState::airborne("A", origin(), 10_000.0, 800.0, 0.0, Utc::now());
        let b_pos = origin().project(90.0, 4.0);
        let b = AircraftState::airborne("B", b_pos, 10_000.0, 800.0, 0.0, Utc::now());

        let alert = ConflictDetector::default()
            .check_pair(&a, &b, Utc::now())
            .expect("conflict");
        assert_eq!(alert.time_to_conflict_s, None);
        assert!(alert.time_to_conflict().is_infinite());
        assert_eq!(alert.severity, ConflictSeverity::High);
    }

    #[test]
    fn classification_is_symmetric() {
        let a = AircraftState::airborne("ZULU", origin(), 9_800.0, 780.0, 45.0, Utc::now());
        let b_pos = origin().project(30.0, 3.2);
        let b = AircraftState::airborne("ALPHA", b_pos, 10_000.0, 640.0, 200.0, Utc::now());
        let now = Utc::now();

        let detector = ConflictDetector::default();
        let forward = detector.scan_once(&[a.clone(), b.clone()], now);
        let reverse = detector.scan_once(&[b, a], now);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward, reverse);
        assert_eq!(forward[0].aircraft1_id, "ALPHA");
    }

    #[test]
    fn ignores_ground_and_unpositioned_aircraft() {
        let a = at("A", origin(), 0.0, 0.0, 0.0);
        let mut b = at("B", origin(), 90.0, 0.5, 0.0);
        b.status = AircraftStatus::OnGround;
        let mut c = at("C", origin(), 180.0, 0.5, 0.0);
        c.position = None;

        let alerts = ConflictDetector::default().scan_once(&[a, b, c], Utc::now());
        assert!(alerts.is_empty());
    }

    #[test]
    fn no_alert_when_far_apart() {
        let a = at("A", origin(), 0.0, 0.0, 10_000.0);
        let b = at("B", origin(), 0.0, 50.0, 10_000.0);
        assert!(ConflictDetector::default().scan_once(&[a, b], Utc::now()).is_empty());
    }

    #[test]
    fn advisory_names_the_other_aircraft() {
        let alert = ConflictAlert {
            aircraft1_id: "CN-AT01".to_string(),
            aircraft2_id: "CN-AT05".to_string(),
            horizontal_distance_km: 1.5,
            vertical_separation_m: 100.0,
            closing_speed_kmh: 1500.0,
            time_to_conflict_s: Some(3.6),
            severity: ConflictSeverity::Critical,
            detected_at: Utc::now(),
        };

        let message = alert.advisory_for("CN-AT01").unwrap();
        assert!(message.starts_with("CRITICAL ALERT: traffic CN-AT05"));
        assert!(message.contains("distance 1.5 km"));
        assert!(message.contains("vertical 100 m"));
        assert!(message.contains("est. 4 s"));
        assert!(message.contains("ACTION REQUIRED"));
        assert!(alert.advisory_for("CN-AT09").is_none());
        assert!(alert.requires_notification());
    }
}
