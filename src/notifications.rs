//! Turn instructions for voice guidance.
//!
//! The session hands upcoming turns to a [`NotificationManager`] after each matched
//! fix; the manager decides, from the distance to the turn, whether anything should
//! be said yet. [`TurnNotificationManager`] is a plain-English implementation with
//! a two-stage schedule: a notice well before the turn and a final call right at it.

use log::debug;

use crate::route::{CarDirection, PedestrianDirection, RoadNameInfo, TurnItem, TurnItemDist};

/// Produces instruction texts for upcoming turns.
pub trait NotificationManager {
    fn enable(&mut self, enable: bool);

    fn is_enabled(&self) -> bool;

    /// Current speed, used to scale announcement distances.
    fn set_speed(&mut self, speed_mps: f64);

    /// Instructions due now for `turns` (nearest first). Empty when nothing is due.
    fn generate(&mut self, turns: &[TurnItemDist], next_street: Option<&RoadNameInfo>) -> Vec<String>;

    /// Text announced once after a route rebuild was requested.
    fn recalculating_text(&self) -> String;

    /// Turn after the next one, when it follows closely enough to be shown.
    fn second_turn(&self) -> Option<CarDirection>;

    /// Forget what was already announced.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Notice,
    Final,
}

/// Distance-scheduled English turn announcements.
#[derive(Debug, Clone)]
pub struct TurnNotificationManager {
    enabled: bool,
    speed_mps: f64,
    /// Seconds of driving at current speed before a turn when the notice is given
    pub notice_seconds: f64,
    pub min_notice_m: f64,
    pub max_notice_m: f64,
    pub final_distance_m: f64,
    /// Two turns closer than this are announced together
    pub chain_distance_m: f64,
    announced: Option<(usize, Stage)>,
    second_turn: Option<CarDirection>,
}

impl Default for TurnNotificationManager {
    fn default() -> Self {
        Self {
            enabled: true,
            speed_mps: 0.0,
            notice_seconds: 20.0,
            min_notice_m: 100.0,
            max_notice_m: 1000.0,
            final_distance_m: 30.0,
            chain_distance_m: 100.0,
            announced: None,
            second_turn: None,
        }
    }
}

impl TurnNotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn notice_distance(&self) -> f64 {
        (self.speed_mps * self.notice_seconds).clamp(self.min_notice_m, self.max_notice_m)
    }

    fn already_announced(&self, segment_index: usize, stage: Stage) -> bool {
        matches!(self.announced, Some((idx, done)) if idx == segment_index && done >= stage)
    }
}

impl NotificationManager for TurnNotificationManager {
    fn enable(&mut self, enable: bool) {
        if !enable {
            self.reset();
        }
        self.enabled = enable;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_speed(&mut self, speed_mps: f64) {
        if speed_mps.is_finite() && speed_mps >= 0.0 {
            self.speed_mps = speed_mps;
        }
    }

    fn generate(&mut self, turns: &[TurnItemDist], next_street: Option<&RoadNameInfo>) -> Vec<String> {
        let Some(first) = turns.first() else {
            self.second_turn = None;
            return Vec::new();
        };

        self.second_turn = turns
            .get(1)
            .filter(|t| t.distance_m - first.distance_m <= self.chain_distance_m)
            .map(|t| t.turn.direction)
            .filter(|d| d.is_normal_turn());

        if !self.enabled || phrase(&first.turn).is_none() {
            return Vec::new();
        }

        let stage = if first.distance_m <= self.final_distance_m {
            Stage::Final
        } else if first.distance_m <= self.notice_distance() {
            Stage::Notice
        } else {
            return Vec::new();
        };

        if self.already_announced(first.segment_index, stage) {
            return Vec::new();
        }
        self.announced = Some((first.segment_index, stage));

        let mut text = instruction(&first.turn, stage, first.distance_m);
        if let Some(street) = next_street.filter(|s| !s.is_empty()) {
            if !first.turn.is_destination() {
                text.push_str(" onto ");
                text.push_str(&street.full_name());
            }
        }
        if let Some(second) = turns.get(1) {
            if second.distance_m - first.distance_m <= self.chain_distance_m {
                if let Some(then) = phrase(&second.turn) {
                    text.push_str(", then ");
                    text.push_str(&then);
                }
            }
        }

        debug!("[TurnNotifications] {:?} at {:.0}m: {}", stage, first.distance_m, text);
        vec![text]
    }

    fn recalculating_text(&self) -> String {
        "Recalculating route".to_string()
    }

    fn second_turn(&self) -> Option<CarDirection> {
        self.second_turn
    }

    fn reset(&mut self) {
        self.announced = None;
        self.second_turn = None;
    }
}

fn instruction(turn: &TurnItem, stage: Stage, distance_m: f64) -> String {
    let action = phrase(turn).unwrap_or_default();
    match stage {
        Stage::Final if turn.is_destination() => "You have arrived at your destination".to_string(),
        Stage::Final => capitalize(&action),
        Stage::Notice if turn.is_destination() => {
            format!("In {}, you will arrive at your destination", format_distance(distance_m))
        }
        Stage::Notice => format!("In {}, {}", format_distance(distance_m), action),
    }
}

fn phrase(turn: &TurnItem) -> Option<String> {
    let text = match turn.direction {
        CarDirection::None => {
            return match turn.pedestrian {
                PedestrianDirection::None => None,
                PedestrianDirection::GoStraight => Some("go straight".to_string()),
                PedestrianDirection::TurnLeft => Some("turn left".to_string()),
                PedestrianDirection::TurnRight => Some("turn right".to_string()),
                PedestrianDirection::ReachedYourDestination => Some("arrive at your destination".to_string()),
            };
        }
        CarDirection::GoStraight => "go straight",
        CarDirection::TurnRight => "turn right",
        CarDirection::TurnSharpRight => "turn sharp right",
        CarDirection::TurnSlightRight => "keep right",
        CarDirection::TurnLeft => "turn left",
        CarDirection::TurnSharpLeft => "turn sharp left",
        CarDirection::TurnSlightLeft => "keep left",
        CarDirection::UTurnLeft | CarDirection::UTurnRight => "make a U-turn",
        CarDirection::EnterRoundAbout if turn.exit_num > 0 => {
            return Some(format!("at the roundabout take the {} exit", ordinal(turn.exit_num)));
        }
        CarDirection::EnterRoundAbout => "enter the roundabout",
        CarDirection::LeaveRoundAbout => "leave the roundabout",
        CarDirection::StayOnRoundAbout => "stay on the roundabout",
        CarDirection::ExitHighwayToLeft => "take the exit on the left",
        CarDirection::ExitHighwayToRight => "take the exit on the right",
        CarDirection::ReachedYourDestination => "arrive at your destination",
    };
    Some(text.to_string())
}

fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        return format!("{:.1} kilometers", meters / 1000.0);
    }
    let step = if meters >= 100.0 { 50.0 } else { 10.0 };
    let rounded = ((meters / step).round() * step).max(step);
    format!("{:.0} meters", rounded)
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_at(direction: CarDirection, segment_index: usize, distance_m: f64) -> TurnItemDist {
        TurnItemDist {
            turn: TurnItem::new(direction),
            segment_index,
            distance_m,
        }
    }

    #[test]
    fn test_nothing_said_far_from_turn() {
        let mut mgr = TurnNotificationManager::new();
        mgr.set_speed(10.0); // notice at 200 m
        assert!(mgr.generate(&[turn_at(CarDirection::TurnLeft, 3, 450.0)], None).is_empty());
    }

    #[test]
    fn test_notice_then_final_each_once() {
        let mut mgr = TurnNotificationManager::new();
        mgr.set_speed(10.0);
        let street = RoadNameInfo::named("Baker Street");

        let notice = mgr.generate(&[turn_at(CarDirection::TurnLeft, 3, 180.0)], Some(&street));
        assert_eq!(notice, vec!["In 200 meters, turn left onto Baker Street".to_string()]);
        assert!(mgr.generate(&[turn_at(CarDirection::TurnLeft, 3, 150.0)], None).is_empty());

        let now = mgr.generate(&[turn_at(CarDirection::TurnLeft, 3, 20.0)], None);
        assert_eq!(now, vec!["Turn left".to_string()]);
        assert!(mgr.generate(&[turn_at(CarDirection::TurnLeft, 3, 5.0)], None).is_empty());

        // A new turn gets its own announcements
        let next = mgr.generate(&[turn_at(CarDirection::TurnRight, 5, 90.0)], None);
        assert_eq!(next, vec!["In 90 meters, turn right".to_string()]);
    }

    #[test]
    fn test_close_turns_are_chained() {
        let mut mgr = TurnNotificationManager::new();
        let turns = [
            turn_at(CarDirection::TurnRight, 2, 25.0),
            turn_at(CarDirection::TurnSlightLeft, 3, 80.0),
        ];
        let texts = mgr.generate(&turns, None);
        assert_eq!(texts, vec!["Turn right, then keep left".to_string()]);
        assert_eq!(mgr.second_turn(), Some(CarDirection::TurnSlightLeft));
    }

    #[test]
    fn test_destination_and_roundabout_phrases() {
        let mut mgr = TurnNotificationManager::new();
        let arrive = mgr.generate(&[turn_at(CarDirection::ReachedYourDestination, 9, 10.0)], None);
        assert_eq!(arrive, vec!["You have arrived at your destination".to_string()]);

        let mut roundabout = TurnItem::new(CarDirection::EnterRoundAbout);
        roundabout.exit_num = 2;
        assert_eq!(phrase(&roundabout).unwrap(), "at the roundabout take the 2nd exit");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(23), "23rd");
    }

    #[test]
    fn test_disabled_manager_is_silent() {
        let mut mgr = TurnNotificationManager::new();
        mgr.enable(false);
        assert!(!mgr.is_enabled());
        assert!(mgr.generate(&[turn_at(CarDirection::TurnLeft, 1, 10.0)], None).is_empty());
        mgr.enable(true);
        assert_eq!(mgr.generate(&[turn_at(CarDirection::TurnLeft, 1, 10.0)], None).len(), 1);
    }

    #[test]
    fn test_pedestrian_turns() {
        let mut mgr = TurnNotificationManager::new();
        let turn = TurnItemDist {
            turn: TurnItem::pedestrian(PedestrianDirection::TurnRight),
            segment_index: 0,
            distance_m: 15.0,
        };
        assert_eq!(mgr.generate(&[turn], None), vec!["Turn right".to_string()]);
    }

    #[test]
    fn test_distance_formatting() {
        assert_eq!(format_distance(3.0), "10 meters");
        assert_eq!(format_distance(87.0), "90 meters");
        assert_eq!(format_distance(180.0), "200 meters");
        assert_eq!(format_distance(1450.0), "1.4 kilometers");
    }
}
