//! # Nav Session
//!
//! Turn-by-turn navigation session: owns a computed route while the device moves
//! and turns raw GPS fixes into guidance decisions.
//!
//! This library provides:
//! - Map-matching of GPS fixes against the route ahead of the progress cursor
//! - Drift detection that decides when the route must be rebuilt
//! - A session state machine driving an asynchronous, cancellable router
//! - Turn notifications, lane hints, speed limits and camera warnings
//!
//! ## Features
//!
//! - **`serde`** - Serialize/deserialize settings and snapshot types, load settings from JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nav_session::{
//!     BlockingRouter, Checkpoints, GpsFix, GpsPoint, RouteGeometry, RouteRequest,
//!     RouterDelegate, RouterError, RouterResult, RoutingEngine, RoutingSession,
//!     RoutingSettings,
//! };
//!
//! struct Beeline;
//!
//! impl RoutingEngine for Beeline {
//!     fn name(&self) -> &str {
//!         "beeline"
//!     }
//!
//!     fn calculate_route(&self, request: &RouteRequest, _: &RouterDelegate) -> RouterResult {
//!         RouteGeometry::from_points("beeline", request.id, request.checkpoints.points().to_vec())
//!             .map_err(|e| RouterError::Internal(e.to_string()))
//!     }
//! }
//!
//! # async fn drive() {
//! let router = Arc::new(BlockingRouter::new(Beeline));
//! let mut session = RoutingSession::new(
//!     router,
//!     tokio::runtime::Handle::current(),
//!     RoutingSettings::default(),
//! );
//!
//! let start = GpsPoint::new(51.5074, -0.1278);
//! let finish = GpsPoint::new(51.5120, -0.1278);
//! session.build(Checkpoints::from_start_finish(start, finish), Duration::from_secs(10));
//! session.next_route_event().await;
//!
//! let state = session.on_position_changed(&GpsFix::new(51.5080, -0.1278).with_speed(8.0));
//! println!("{} ({:.0}% done)", state, session.progress());
//! # }
//! ```

use thiserror::Error;

pub mod geo_utils;

pub mod checkpoints;
pub use checkpoints::Checkpoints;

// Route data model: shared geometry plus progress cursor
pub mod route;
pub use route::{
    CarDirection, LaneWay, PedestrianDirection, RoadNameInfo, Route, RouteCursor, RouteError,
    RouteGeometry, RouteResult, RouteSegment, SingleLane, SpeedCamera, SpeedGroup, SpeedLimit,
    TurnItem, TurnItemDist,
};

pub mod matcher;
pub use matcher::{match_fix, matching_threshold, MatchOutcome};

pub mod position;
pub use position::PositionAccumulator;

pub mod rebuild;
pub use rebuild::{DriftVerdict, RebuildPolicy};

// Router collaborator and the adapters the session drives it through
pub mod router;
pub use router::{
    AsyncRouter, BlockingRouter, RouteRequest, RouteResponse, Router, RouterDelegate, RouterError,
    RouterResult, RouterResultCode, RoutingEngine,
};

pub mod notifications;
pub use notifications::{NotificationManager, TurnNotificationManager};

pub mod speed;
pub use speed::{CameraWarning, RouteSpeedAdvisor, SpeedAdvisor};

pub mod session;
pub use session::{
    FollowingInfo, NoopObserver, RequestKind, RoutingSession, SessionObserver, SessionState,
    ThreadChecker,
};

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use nav_session::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One position report from the location provider.
///
/// # Example
/// ```
/// use nav_session::GpsFix;
/// let fix = GpsFix::new(51.5074, -0.1278).with_speed(12.0).with_bearing(90.0);
/// assert!(fix.has_speed());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsFix {
    pub point: GpsPoint,
    /// Ground speed, m/s
    pub speed_mps: Option<f64>,
    /// Direction of travel, degrees clockwise from north
    pub bearing_deg: Option<f64>,
    /// Horizontal accuracy radius, meters
    pub accuracy_m: Option<f64>,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(GpsPoint::new(latitude, longitude))
    }

    pub fn at(point: GpsPoint) -> Self {
        Self {
            point,
            speed_mps: None,
            bearing_deg: None,
            accuracy_m: None,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_bearing(mut self, bearing_deg: f64) -> Self {
        self.bearing_deg = Some(bearing_deg);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn has_speed(&self) -> bool {
        self.speed_mps.map_or(false, |s| s.is_finite() && s >= 0.0)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Kind of traveller the session guides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleType {
    #[default]
    Car,
    Pedestrian,
    Bicycle,
}

/// Errors raised while loading or validating [`RoutingSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid setting `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[cfg(feature = "serde")]
    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for matching, rebuild decisions and guidance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RoutingSettings {
    /// Preset the other fields start from in [`RoutingSettings::from_json`].
    pub vehicle_type: VehicleType,

    /// Base distance within which a fix counts as on the route.
    /// Default: 50.0 meters
    pub matching_threshold_m: f64,

    /// Upper bound for the threshold widened by poor fix accuracy.
    /// Default: 100.0 meters
    pub max_matching_threshold_m: f64,

    /// Number of segments ahead of the cursor searched for a match.
    /// Default: 20
    pub lookahead_segments: u32,

    /// Largest allowed angle between fix bearing and segment direction.
    /// Default: 90.0 degrees
    pub max_bearing_deviation_deg: f64,

    /// Bearings are only trusted at or above this speed.
    /// Default: 3.0 m/s
    pub min_speed_for_bearing_check_mps: f64,

    /// The route is rebuilt once the weighted miss count exceeds this.
    /// Default: 10
    pub on_route_missed_count: u32,

    /// Unmatched fixes at or above this speed weigh `fast_miss_weight`.
    /// Default: 5.0 m/s
    pub min_speed_for_route_rebuild_mps: f64,

    /// Default: 1
    pub slow_miss_weight: u32,

    /// Default: 2
    pub fast_miss_weight: u32,

    /// Unmatched distances closer than this to the previous one count as the same sample.
    /// Default: 0.01 meters
    pub runaway_distance_sensitivity_m: f64,

    /// Lanes are shown when the next turn is closer than this.
    /// Default: 500.0 meters
    pub show_lanes_min_distance_m: f64,

    /// Pedestrian turns are shown when closer than this.
    /// Default: 20.0 meters
    pub show_pedestrian_turn_m: f64,

    /// Smallest ETA reported while the destination is not reached.
    /// Default: 60.0 seconds
    pub min_eta_s: f64,

    /// Report the turn after next in [`FollowingInfo`].
    pub show_turn_after_next: bool,

    /// Voice turn instructions.
    pub sound_direction: bool,

    /// Include street names in instructions.
    pub announce_streets: bool,

    /// Cameras further ahead than this are not reported.
    /// Default: 1000.0 meters
    pub camera_lookahead_m: f64,

    /// Pass the recent direction of travel to the router on rebuilds.
    pub use_direction_for_route_building: bool,

    /// Timeout of rebuilds triggered by traffic updates.
    /// Default: 30.0 seconds
    pub traffic_rebuild_timeout_s: f64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self::for_vehicle(VehicleType::Car)
    }
}

impl RoutingSettings {
    /// Preset tuned for the given kind of traveller.
    pub fn for_vehicle(vehicle_type: VehicleType) -> Self {
        let car = Self {
            vehicle_type,
            matching_threshold_m: 50.0,
            max_matching_threshold_m: 100.0,
            lookahead_segments: 20,
            max_bearing_deviation_deg: 90.0,
            min_speed_for_bearing_check_mps: 3.0,
            on_route_missed_count: 10,
            min_speed_for_route_rebuild_mps: 5.0,
            slow_miss_weight: 1,
            fast_miss_weight: 2,
            runaway_distance_sensitivity_m: 0.01,
            show_lanes_min_distance_m: 500.0,
            show_pedestrian_turn_m: 20.0,
            min_eta_s: 60.0,
            show_turn_after_next: true,
            sound_direction: true,
            announce_streets: true,
            camera_lookahead_m: 1000.0,
            use_direction_for_route_building: true,
            traffic_rebuild_timeout_s: 30.0,
        };

        match vehicle_type {
            VehicleType::Car => car,
            VehicleType::Pedestrian => Self {
                matching_threshold_m: 20.0,
                max_matching_threshold_m: 50.0,
                max_bearing_deviation_deg: 180.0,
                min_speed_for_route_rebuild_mps: 1.5,
                show_turn_after_next: false,
                use_direction_for_route_building: false,
                camera_lookahead_m: 0.0,
                ..car
            },
            VehicleType::Bicycle => Self {
                matching_threshold_m: 30.0,
                max_matching_threshold_m: 70.0,
                min_speed_for_route_rebuild_mps: 3.0,
                min_speed_for_bearing_check_mps: 2.0,
                camera_lookahead_m: 0.0,
                ..car
            },
        }
    }

    /// Reject values the session cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn positive(field: &'static str, value: f64) -> Result<(), SettingsError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SettingsError::InvalidValue {
                    field,
                    reason: format!("must be a positive number, got {}", value),
                })
            }
        }
        fn non_negative(field: &'static str, value: f64) -> Result<(), SettingsError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SettingsError::InvalidValue {
                    field,
                    reason: format!("must be zero or positive, got {}", value),
                })
            }
        }

        positive("matching_threshold_m", self.matching_threshold_m)?;
        positive("max_matching_threshold_m", self.max_matching_threshold_m)?;
        if self.max_matching_threshold_m < self.matching_threshold_m {
            return Err(SettingsError::InvalidValue {
                field: "max_matching_threshold_m",
                reason: format!("must not be below matching_threshold_m ({})", self.matching_threshold_m),
            });
        }
        if self.lookahead_segments == 0 {
            return Err(SettingsError::InvalidValue {
                field: "lookahead_segments",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=180.0).contains(&self.max_bearing_deviation_deg) {
            return Err(SettingsError::InvalidValue {
                field: "max_bearing_deviation_deg",
                reason: format!("must be within [0, 180], got {}", self.max_bearing_deviation_deg),
            });
        }
        non_negative("min_speed_for_bearing_check_mps", self.min_speed_for_bearing_check_mps)?;
        non_negative("min_speed_for_route_rebuild_mps", self.min_speed_for_route_rebuild_mps)?;
        if self.slow_miss_weight == 0 || self.fast_miss_weight == 0 {
            return Err(SettingsError::InvalidValue {
                field: "slow_miss_weight",
                reason: "miss weights must be at least 1".to_string(),
            });
        }
        non_negative("runaway_distance_sensitivity_m", self.runaway_distance_sensitivity_m)?;
        non_negative("show_lanes_min_distance_m", self.show_lanes_min_distance_m)?;
        non_negative("show_pedestrian_turn_m", self.show_pedestrian_turn_m)?;
        non_negative("min_eta_s", self.min_eta_s)?;
        non_negative("camera_lookahead_m", self.camera_lookahead_m)?;
        positive("traffic_rebuild_timeout_s", self.traffic_rebuild_timeout_s)?;
        Ok(())
    }

    /// Load settings from a JSON object.
    ///
    /// Fields left out come from the preset of the given `vehicle_type` (car when
    /// that is missing too).
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        use serde::de::Error as _;
        use serde::Deserialize;

        let serde_json::Value::Object(overrides) = serde_json::from_str(json)? else {
            return Err(serde_json::Error::custom("settings must be a JSON object").into());
        };
        let vehicle_type = match overrides.get("vehicle_type") {
            Some(value) => VehicleType::deserialize(value)?,
            None => VehicleType::default(),
        };

        let mut fields = match serde_json::to_value(Self::for_vehicle(vehicle_type))? {
            serde_json::Value::Object(fields) => fields,
            _ => serde_json::Map::new(),
        };
        fields.extend(overrides);

        let settings: Self = serde_json::from_value(serde_json::Value::Object(fields))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_fix_builder() {
        let fix = GpsFix::new(1.0, 2.0).with_speed(4.0).with_bearing(45.0).with_accuracy(8.0);
        assert_eq!(fix.point, GpsPoint::new(1.0, 2.0));
        assert_eq!(fix.speed_mps, Some(4.0));
        assert_eq!(fix.bearing_deg, Some(45.0));
        assert_eq!(fix.accuracy_m, Some(8.0));
        assert!(fix.has_speed());
        assert!(!GpsFix::new(1.0, 2.0).has_speed());
        assert!(!GpsFix::new(1.0, 2.0).with_speed(f64::NAN).has_speed());
    }

    #[test]
    fn test_default_settings_are_car_preset() {
        let settings = RoutingSettings::default();
        assert_eq!(settings.vehicle_type, VehicleType::Car);
        assert_eq!(settings.on_route_missed_count, 10);
        assert_eq!(settings.runaway_distance_sensitivity_m, 0.01);
        assert_eq!(settings.show_lanes_min_distance_m, 500.0);
        assert_eq!(settings.min_eta_s, 60.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_vehicle_presets_validate() {
        for vehicle in [VehicleType::Car, VehicleType::Pedestrian, VehicleType::Bicycle] {
            let settings = RoutingSettings::for_vehicle(vehicle);
            assert_eq!(settings.vehicle_type, vehicle);
            assert!(settings.validate().is_ok(), "{:?} preset rejected", vehicle);
        }
        let walking = RoutingSettings::for_vehicle(VehicleType::Pedestrian);
        assert!(walking.matching_threshold_m < RoutingSettings::default().matching_threshold_m);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = RoutingSettings { matching_threshold_m: -1.0, ..Default::default() };
        assert!(matches!(
            bad.validate(),
            Err(SettingsError::InvalidValue { field: "matching_threshold_m", .. })
        ));

        let inverted = RoutingSettings {
            matching_threshold_m: 80.0,
            max_matching_threshold_m: 40.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let no_window = RoutingSettings { lookahead_segments: 0, ..Default::default() };
        assert!(no_window.validate().is_err());

        let bad_angle = RoutingSettings { max_bearing_deviation_deg: 270.0, ..Default::default() };
        assert!(bad_angle.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_from_json() {
        let settings = RoutingSettings::from_json(r#"{"on_route_missed_count": 6, "vehicle_type": "Bicycle"}"#).unwrap();
        assert_eq!(settings.on_route_missed_count, 6);
        assert_eq!(settings.vehicle_type, VehicleType::Bicycle);
        // Everything else comes from the bicycle preset
        let bicycle = RoutingSettings::for_vehicle(VehicleType::Bicycle);
        assert_eq!(settings, RoutingSettings { on_route_missed_count: 6, ..bicycle });

        let car = RoutingSettings::from_json(r#"{"min_eta_s": 30.0}"#).unwrap();
        assert_eq!(car, RoutingSettings { min_eta_s: 30.0, ..RoutingSettings::default() });

        let walking = RoutingSettings::from_json(r#"{"vehicle_type": "Pedestrian", "matching_threshold_m": 25.0}"#).unwrap();
        assert_eq!(walking.matching_threshold_m, 25.0);
        assert_eq!(walking.max_bearing_deviation_deg, 180.0);

        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(RoutingSettings::from_json(&json).unwrap(), settings);

        assert!(matches!(RoutingSettings::from_json("{"), Err(SettingsError::Json(_))));
        assert!(matches!(RoutingSettings::from_json("[]"), Err(SettingsError::Json(_))));
        assert!(matches!(
            RoutingSettings::from_json(r#"{"vehicle_type": "Tram"}"#),
            Err(SettingsError::Json(_))
        ));
        assert!(matches!(
            RoutingSettings::from_json(r#"{"lookahead_segments": 0}"#),
            Err(SettingsError::InvalidValue { .. })
        ));
    }
}
