//! Per-room alert suppression state machines
//!
//! Emits at most one alert intent per distinct threshold-crossing count.
//! The notified-for set only clears once the count drops back below the
//! threshold, so a plateaued count never re-alerts, and a transient dip
//! that stays at or above the threshold does not re-arm.

use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::types::{AlertIntent, RoomId};

#[derive(Debug)]
struct AlertState {
    threshold: usize,
    notified_for: HashSet<usize>,
}

/// Threshold watcher over room occupancy counts.
#[derive(Debug)]
pub struct AlertStateMachine {
    states: HashMap<RoomId, AlertState>,
}

impl AlertStateMachine {
    pub fn new(config: &EngineConfig) -> Self {
        let states = config
            .rooms
            .iter()
            .map(|room| {
                (
                    room.id.clone(),
                    AlertState {
                        threshold: room.alert_threshold,
                        notified_for: HashSet::new(),
                    },
                )
            })
            .collect();
        Self { states }
    }

    /// Evaluate a freshly recomputed count. Returns an intent on a new
    /// crossing, `None` otherwise. Unknown rooms are ignored.
    pub fn evaluate(
        &mut self,
        room_id: &str,
        unique_count: usize,
        timestamp_ms: u64,
    ) -> Option<AlertIntent> {
        let state = self.states.get_mut(room_id)?;

        if unique_count < state.threshold {
            state.notified_for.clear();
            return None;
        }

        if !state.notified_for.insert(unique_count) {
            return None;
        }

        log::info!(
            "room {} crossed alert threshold: {} >= {}",
            room_id,
            unique_count,
            state.threshold
        );
        Some(AlertIntent {
            room_id: room_id.to_string(),
            count: unique_count,
            threshold: state.threshold,
            timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;

    fn machine(threshold: usize) -> AlertStateMachine {
        let mut config = EngineConfig::default();
        config.rooms.push(RoomConfig {
            id: "r1".to_string(),
            name: "Room 1".to_string(),
            cameras: vec!["cam-a".to_string()],
            alert_threshold: threshold,
        });
        AlertStateMachine::new(&config)
    }

    #[test]
    fn test_suppression_sequence() {
        // Counts [2, 3, 5, 5, 5, 4, 5] at threshold 5: intents only at the
        // two rising crossings, never at the plateau.
        let mut alerts = machine(5);
        let counts = [2usize, 3, 5, 5, 5, 4, 5];
        let fired: Vec<usize> = counts
            .iter()
            .enumerate()
            .filter_map(|(i, &count)| alerts.evaluate("r1", count, i as u64))
            .map(|intent| intent.count)
            .collect();
        assert_eq!(fired, vec![5, 5]);
    }

    #[test]
    fn test_distinct_counts_above_threshold_each_alert_once() {
        let mut alerts = machine(3);
        assert!(alerts.evaluate("r1", 3, 0).is_some());
        assert!(alerts.evaluate("r1", 4, 1).is_some());
        assert!(alerts.evaluate("r1", 4, 2).is_none());
        assert!(alerts.evaluate("r1", 3, 3).is_none()); // already notified for 3
    }

    #[test]
    fn test_rearm_only_after_dropping_below() {
        let mut alerts = machine(3);
        assert!(alerts.evaluate("r1", 3, 0).is_some());
        assert!(alerts.evaluate("r1", 2, 1).is_none());
        assert!(alerts.evaluate("r1", 3, 2).is_some());
    }

    #[test]
    fn test_intent_carries_threshold_and_timestamp() {
        let mut alerts = machine(2);
        let intent = alerts.evaluate("r1", 4, 1234).unwrap();
        assert_eq!(intent.room_id, "r1");
        assert_eq!(intent.count, 4);
        assert_eq!(intent.threshold, 2);
        assert_eq!(intent.timestamp_ms, 1234);
    }

    #[test]
    fn test_unknown_room_ignored() {
        let mut alerts = machine(2);
        assert!(alerts.evaluate("basement", 100, 0).is_none());
    }
}
