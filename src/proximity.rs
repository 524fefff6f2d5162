// src/proximity.rs
//
// Decides whether a detection is close enough to matter and which side of
// the lane midpoint it sits on.

use crate::types::{ClassifiedDetection, Detection, Side};

/// Minimum bounding-box area (px²) for an object to count as "close".
pub const CLOSE_AREA_THRESHOLD: i32 = 5000;

/// Returns `None` when the box is too small (or degenerate). Objects at or
/// exactly on the lane midpoint classify as Right.
pub fn classify(detection: &Detection, lane_midpoint_x: i32) -> Option<ClassifiedDetection> {
    let [x1, y1, x2, y2] = detection.bbox;
    let area = (x2 - x1) * (y2 - y1);
    if area < CLOSE_AREA_THRESHOLD {
        return None;
    }

    let midpoint_x = (x1 + x2) / 2;
    let side = if midpoint_x < lane_midpoint_x {
        Side::Left
    } else {
        Side::Right
    };

    Some(ClassifiedDetection {
        class_name: detection.class_name.clone(),
        side,
        area,
    })
}
