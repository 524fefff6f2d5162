// src/composite_detector.rs
//
// Turns one frame's raw detections into zero or more alert events: closeness
// and side classification, per-key cooldown gating, and the derived
// pet-escort event when a person and a dog are both close on the left.

use crate::alert_tracker::AlertKeyTracker;
use crate::proximity;
use crate::types::{AlertEvent, AlertKind, Detection, Side};
use tracing::debug;

pub struct CompositeDetector {
    tracker: AlertKeyTracker,
}

impl CompositeDetector {
    pub fn new() -> Self {
        Self {
            tracker: AlertKeyTracker::new(),
        }
    }

    /// Scan one frame's detections and produce the ordered alert list:
    /// per-detection events in detection order, then the escort event if
    /// this frame qualifies.
    pub fn process(
        &mut self,
        detections: &[Detection],
        lane_midpoint_x: i32,
        now: f64,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let mut qualifying: Vec<(String, Side)> = Vec::new();

        for detection in detections {
            let Some(classified) = proximity::classify(detection, lane_midpoint_x) else {
                continue;
            };

            let key = (classified.class_name.clone(), classified.side);
            if self.tracker.is_eligible(&key, now) {
                let message = alert_message(&classified.class_name, classified.side);
                debug!(
                    "Alert candidate: {} on the {} (area {})",
                    classified.class_name, classified.side, classified.area
                );

                // Stamp the key before the rewrite/dispatch step so a slow
                // or failing rewrite cannot re-fire it within the window.
                self.tracker.record_fired(key, now);

                events.push(AlertEvent {
                    kind: AlertKind::from_class(&classified.class_name),
                    class_name: classified.class_name.clone(),
                    side: classified.side,
                    message,
                    timestamp: now,
                });
            }

            qualifying.push((classified.class_name, classified.side));
        }

        // Pet-escort rule: person and dog both close on the left in the same
        // frame. Left-only, and not subject to the cooldown.
        let person_left = qualifying
            .iter()
            .any(|(c, s)| c == "person" && *s == Side::Left);
        let dog_left = qualifying
            .iter()
            .any(|(c, s)| c == "dog" && *s == Side::Left);

        if person_left && dog_left {
            events.push(AlertEvent {
                kind: AlertKind::PetEscort,
                class_name: "pet_owner".to_string(),
                side: Side::Left,
                message: "Note: A person and a dog are nearby, possibly together as a pet and owner."
                    .to_string(),
                timestamp: now,
            });
        }

        events
    }

    pub fn tracker(&self) -> &AlertKeyTracker {
        &self.tracker
    }
}

impl Default for CompositeDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn alert_message(class_name: &str, side: Side) -> String {
    match class_name {
        "person" => format!("Notice: A pedestrian is noticed on the {}.", side),
        "dog" => format!("Notice: Animal detected on the {}.", side),
        "car" => format!("Please be cautious: A vehicle is spotted on the {}.", side),
        other => format!("Attention: {} spotted on your {}.", other, side),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANE_MID: i32 = 320;

    fn close_left(class_name: &str) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            bbox: [0, 0, 200, 200],
            confidence: 0.9,
        }
    }

    fn close_right(class_name: &str) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            bbox: [400, 0, 600, 200],
            confidence: 0.9,
        }
    }

    fn far(class_name: &str) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            bbox: [0, 0, 10, 10],
            confidence: 0.9,
        }
    }

    #[test]
    fn test_small_boxes_never_alert() {
        let mut detector = CompositeDetector::new();
        let events = detector.process(&[far("car"), far("person")], LANE_MID, 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_message_templates() {
        let mut detector = CompositeDetector::new();
        let events = detector.process(
            &[
                close_left("person"),
                close_left("dog"),
                close_right("car"),
                close_right("bicycle"),
            ],
            LANE_MID,
            0.0,
        );

        // Three class alerts, one fallback alert, one escort event.
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0].message,
            "Notice: A pedestrian is noticed on the left."
        );
        assert_eq!(events[1].message, "Notice: Animal detected on the left.");
        assert_eq!(
            events[2].message,
            "Please be cautious: A vehicle is spotted on the right."
        );
        assert_eq!(
            events[3].message,
            "Attention: bicycle spotted on your right."
        );
        assert_eq!(events[3].kind, AlertKind::Other);
        assert_eq!(events[4].kind, AlertKind::PetEscort);
    }

    #[test]
    fn test_cooldown_suppresses_repeat_frames() {
        let mut detector = CompositeDetector::new();

        let events = detector.process(&[close_left("car")], LANE_MID, 0.0);
        assert_eq!(events.len(), 1);

        // Same key inside the window: nothing
        let events = detector.process(&[close_left("car")], LANE_MID, 10.0);
        assert!(events.is_empty());

        // Exactly at the boundary: still nothing
        let events = detector.process(&[close_left("car")], LANE_MID, 120.0);
        assert!(events.is_empty());

        // Strictly past it: fires again
        let events = detector.process(&[close_left("car")], LANE_MID, 121.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_same_class_opposite_sides_are_distinct_keys() {
        let mut detector = CompositeDetector::new();

        let events = detector.process(&[close_left("car")], LANE_MID, 0.0);
        assert_eq!(events.len(), 1);

        let events = detector.process(&[close_right("car")], LANE_MID, 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].side, Side::Right);
    }

    #[test]
    fn test_escort_requires_both_on_left() {
        let mut detector = CompositeDetector::new();
        let events = detector.process(&[close_left("person"), close_left("dog")], LANE_MID, 0.0);
        let escorts: Vec<_> = events
            .iter()
            .filter(|e| e.kind == AlertKind::PetEscort)
            .collect();
        assert_eq!(escorts.len(), 1);
        assert_eq!(escorts[0].side, Side::Left);

        let mut detector = CompositeDetector::new();
        let events = detector.process(&[close_right("person"), close_left("dog")], LANE_MID, 0.0);
        assert!(events.iter().all(|e| e.kind != AlertKind::PetEscort));

        // Right-side pairs never trigger it
        let mut detector = CompositeDetector::new();
        let events = detector.process(&[close_right("person"), close_right("dog")], LANE_MID, 0.0);
        assert!(events.iter().all(|e| e.kind != AlertKind::PetEscort));
    }

    #[test]
    fn test_escort_bypasses_cooldown() {
        let mut detector = CompositeDetector::new();
        let frame = [close_left("person"), close_left("dog")];

        let events = detector.process(&frame, LANE_MID, 0.0);
        assert_eq!(events.len(), 3); // person, dog, escort

        // Next frame: person/dog keys are cooling down, escort still fires
        let events = detector.process(&frame, LANE_MID, 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::PetEscort);
    }

    #[test]
    fn test_escort_counts_detections_suppressed_by_cooldown() {
        let mut detector = CompositeDetector::new();

        // Burn the person/dog left keys with single detections
        detector.process(&[close_left("person")], LANE_MID, 0.0);
        detector.process(&[close_left("dog")], LANE_MID, 0.0);

        // Both present but suppressed: escort still derived from proximity
        let events = detector.process(&[close_left("person"), close_left("dog")], LANE_MID, 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::PetEscort);
    }

    #[test]
    fn test_end_to_end_car_scenario() {
        let mut detector = CompositeDetector::new();
        // area 8000, midpoint left of lane midpoint
        let car = Detection {
            class_name: "car".to_string(),
            bbox: [0, 0, 100, 80],
            confidence: 0.9,
        };

        let events = detector.process(std::slice::from_ref(&car), LANE_MID, 0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class_name, "car");
        assert_eq!(events[0].side, Side::Left);
        assert_eq!(events[0].timestamp, 0.0);

        assert!(detector
            .process(std::slice::from_ref(&car), LANE_MID, 10.0)
            .is_empty());

        let events = detector.process(std::slice::from_ref(&car), LANE_MID, 121.0);
        assert_eq!(events.len(), 1);
    }
}
