//! Tracking thresholds and classification rules.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Configuration for the surveillance core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingRules {
    /// Ground speed above which an aircraft counts as airborne (knots)
    pub max_ground_speed_kt: f64,
    /// Altitude above which an aircraft counts as airborne (feet)
    pub min_altitude_ft: f64,
    /// Absolute vertical rate above which an aircraft counts as airborne (ft/min)
    pub vertical_rate_threshold_fpm: f64,
    /// Sessions shorter than this are discarded as sensor noise
    pub min_flight_duration_secs: u64,
    /// Open sessions without an update for this long are force-closed
    pub flight_end_timeout_secs: u64,
    /// Squawk codes that flag an emergency
    pub emergency_codes: Vec<EmergencyCode>,
    /// ICAO code of the preferred airport for inference
    pub home_airport: Option<String>,
    /// Emit `flight:updated` on every airborne tick
    pub emit_flight_updates: bool,
    /// Case-insensitive substring identifying final approach airspaces
    pub final_approach_marker: String,
}

impl Default for TrackingRules {
    fn default() -> Self {
        Self {
            max_ground_speed_kt: 30.0,
            min_altitude_ft: 500.0,
            vertical_rate_threshold_fpm: 100.0,
            min_flight_duration_secs: 60,
            flight_end_timeout_secs: 300,
            emergency_codes: vec![
                EmergencyCode::new("7500", EmergencyKind::Hijack),
                EmergencyCode::new("7600", EmergencyKind::RadioFailure),
                EmergencyCode::new("7700", EmergencyKind::General),
            ],
            home_airport: None,
            emit_flight_updates: false,
            final_approach_marker: "final approach".into(),
        }
    }
}

impl TrackingRules {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let thresholds = [
            ("max_ground_speed_kt", self.max_ground_speed_kt),
            ("min_altitude_ft", self.min_altitude_ft),
            ("vertical_rate_threshold_fpm", self.vertical_rate_threshold_fpm),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidRules(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.flight_end_timeout_secs == 0 {
            return Err(CoreError::InvalidRules(
                "flight_end_timeout_secs must be greater than zero".into(),
            ));
        }
        if let Some(code) = self.emergency_codes.iter().find(|code| {
            code.squawk.len() != 4 || !code.squawk.chars().all(|c| ('0'..='7').contains(&c))
        }) {
            return Err(CoreError::InvalidRules(format!(
                "emergency code '{}' is not a 4-digit octal squawk",
                code.squawk
            )));
        }
        if self.final_approach_marker.trim().is_empty() {
            return Err(CoreError::InvalidRules(
                "final_approach_marker must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Parse rules from JSON and validate them. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let rules: TrackingRules =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidRules(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn is_emergency_squawk(&self, squawk: &str) -> bool {
        self.emergency_codes.iter().any(|code| code.squawk == squawk)
    }

    /// Classify a squawk against the configured emergency codes.
    pub fn classify_squawk(&self, squawk: Option<&str>) -> EmergencyKind {
        squawk
            .and_then(|sq| self.emergency_codes.iter().find(|code| code.squawk == sq))
            .map(|code| code.kind)
            .unwrap_or(EmergencyKind::Unknown)
    }

    pub fn min_flight_duration_ms(&self) -> i64 {
        (self.min_flight_duration_secs as i64).saturating_mul(1000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyCode {
    pub squawk: String,
    pub kind: EmergencyKind,
}

impl EmergencyCode {
    pub fn new(squawk: impl Into<String>, kind: EmergencyKind) -> Self {
        Self {
            squawk: squawk.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    Hijack,
    RadioFailure,
    General,
    /// Emergency flag set without a recognised code
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_are_valid() {
        assert!(TrackingRules::default().validate().is_ok());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let rules = TrackingRules {
            min_altitude_ft: -1.0,
            ..TrackingRules::default()
        };
        assert!(matches!(rules.validate(), Err(CoreError::InvalidRules(_))));
    }

    #[test]
    fn malformed_emergency_code_is_rejected() {
        let mut rules = TrackingRules::default();
        rules.emergency_codes.push(EmergencyCode::new("7900", EmergencyKind::General));
        assert!(rules.validate().is_err());
    }

    #[test]
    fn squawk_classification() {
        let rules = TrackingRules::default();
        assert_eq!(rules.classify_squawk(Some("7500")), EmergencyKind::Hijack);
        assert_eq!(rules.classify_squawk(Some("7600")), EmergencyKind::RadioFailure);
        assert_eq!(rules.classify_squawk(Some("7700")), EmergencyKind::General);
        assert_eq!(rules.classify_squawk(Some("1200")), EmergencyKind::Unknown);
        assert_eq!(rules.classify_squawk(None), EmergencyKind::Unknown);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let rules: TrackingRules =
            serde_json::from_str(r#"{ "min_flight_duration_secs": 5, "home_airport": "EGPK" }"#)
                .expect("parse rules");
        assert_eq!(rules.min_flight_duration_secs, 5);
        assert_eq!(rules.home_airport.as_deref(), Some("EGPK"));
        assert_eq!(rules.max_ground_speed_kt, 30.0);
        assert_eq!(rules.emergency_codes.len(), 3);
    }

    #[test]
    fn from_json_validates() {
        let rules = TrackingRules::from_json(r#"{ "emit_flight_updates": true }"#).expect("valid");
        assert!(rules.emit_flight_updates);

        let err = TrackingRules::from_json(r#"{ "flight_end_timeout_secs": 0 }"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRules(_)));
        assert!(TrackingRules::from_json("not json").is_err());
    }
}
