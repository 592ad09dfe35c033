//! Drift accounting that decides when a route must be rebuilt.
//!
//! Every unmatched fix is weighed by how fast the device moves: slow drift is more
//! likely GPS jitter, fast drift is more likely a real departure from the route.
//! Fixes whose distance from the last good projection barely changed count as
//! repeats of the previous sample, so a parked device cannot trigger a rebuild.

use log::{debug, info};

use crate::RoutingSettings;

/// What the policy made of one unmatched fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftVerdict {
    /// Same sample as before (or the policy already fired); nothing counted.
    Repeated,
    /// Counted; carries the miss count after this fix.
    Counted(u32),
    /// The miss count crossed the threshold. Reported once per drift episode.
    Fire,
}

/// Consecutive-miss counter behind the `NeedsRebuild` transition.
#[derive(Debug, Clone, Default)]
pub struct RebuildPolicy {
    miss_count: u32,
    last_distance: f64,
    fired: bool,
}

impl RebuildPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn miss_count(&self) -> u32 {
        self.miss_count
    }

    pub fn last_distance(&self) -> f64 {
        self.last_distance
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// A fix matched the route: drift is over.
    pub fn on_matched(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        self.miss_count = 0;
        self.last_distance = 0.0;
        self.fired = false;
    }

    /// Account one unmatched fix `distance_m` away from the last good projection.
    pub fn on_unmatched(
        &mut self,
        distance_m: f64,
        speed_mps: Option<f64>,
        settings: &RoutingSettings,
    ) -> DriftVerdict {
        if self.fired {
            return DriftVerdict::Repeated;
        }

        if (distance_m - self.last_distance).abs() < settings.runaway_distance_sensitivity_m {
            debug!(
                "[RebuildPolicy] Repeated sample at {:.2}m, miss count stays {}",
                distance_m, self.miss_count
            );
            return DriftVerdict::Repeated;
        }

        let weight = match speed_mps {
            Some(speed) if speed >= settings.min_speed_for_route_rebuild_mps => settings.fast_miss_weight,
            _ => settings.slow_miss_weight,
        };
        self.miss_count = self.miss_count.saturating_add(weight);
        self.last_distance = distance_m;

        if self.miss_count > settings.on_route_missed_count {
            self.fired = true;
            info!(
                "[RebuildPolicy] Off route: {} misses (threshold {}), last distance {:.1}m",
                self.miss_count, settings.on_route_missed_count, distance_m
            );
            return DriftVerdict::Fire;
        }

        DriftVerdict::Counted(self.miss_count)
    }
}
