// src/object_detection.rs
//
// YOLO object detector over ONNX Runtime. The pipeline only sees the
// ObjectDetector trait; the frame loop feeds it raw RGB bytes and gets back
// labeled boxes in original image coordinates.

use crate::types::Detection;
use anyhow::Result;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, info};

const YOLO_INPUT_SIZE: usize = 640;
const YOLO_PREDICTIONS: usize = 8400;
const NMS_IOU_THRESHOLD: f32 = 0.45;

// COCO label vocabulary; any of these can reach the alert pipeline through
// the generic fallback template.
const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

pub trait ObjectDetector: Send {
    /// Detect objects in an RGB frame. Coordinates in the returned boxes are
    /// in original image space.
    fn detect(&mut self, rgb: &[u8], width: usize, height: usize) -> Result<Vec<Detection>>;
}

pub struct YoloDetector {
    session: Session,
    confidence_threshold: f32,
}

impl YoloDetector {
    pub fn new(model_path: &str, confidence_threshold: f32, num_threads: usize) -> Result<Self> {
        info!("Loading YOLO model: {}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(num_threads)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(model_path)?;

        info!("✓ YOLO detector initialized");
        Ok(Self {
            session,
            confidence_threshold,
        })
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let shape = [1, 3, YOLO_INPUT_SIZE, YOLO_INPUT_SIZE];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.to_vec().into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["images" => input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }

    fn postprocess(
        &self,
        output: &[f32],
        scale: f32,
        pad_x: f32,
        pad_y: f32,
        frame_w: usize,
        frame_h: usize,
    ) -> Vec<RawDetection> {
        let mut detections = Vec::new();

        // Output layout: [1, 4 + classes, 8400], center-format boxes first.
        for i in 0..YOLO_PREDICTIONS {
            let cx = output[i];
            let cy = output[YOLO_PREDICTIONS + i];
            let w = output[YOLO_PREDICTIONS * 2 + i];
            let h = output[YOLO_PREDICTIONS * 3 + i];

            let mut max_conf = 0.0f32;
            let mut best_class = 0;
            for c in 0..COCO_NAMES.len() {
                let conf = output[YOLO_PREDICTIONS * (4 + c) + i];
                if conf > max_conf {
                    max_conf = conf;
                    best_class = c;
                }
            }

            if max_conf < self.confidence_threshold {
                continue;
            }

            // Center format -> corners, then reverse the letterbox transform.
            let x1 = (cx - w / 2.0 - pad_x) / scale;
            let y1 = (cy - h / 2.0 - pad_y) / scale;
            let x2 = (cx + w / 2.0 - pad_x) / scale;
            let y2 = (cy + h / 2.0 - pad_y) / scale;

            detections.push(RawDetection {
                bbox: [
                    x1.clamp(0.0, frame_w as f32),
                    y1.clamp(0.0, frame_h as f32),
                    x2.clamp(0.0, frame_w as f32),
                    y2.clamp(0.0, frame_h as f32),
                ],
                confidence: max_conf,
                class_id: best_class,
            });
        }

        nms(detections, NMS_IOU_THRESHOLD)
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&mut self, rgb: &[u8], width: usize, height: usize) -> Result<Vec<Detection>> {
        let (input, scale, pad_x, pad_y) = preprocess(rgb, width, height);
        let output = self.infer(&input)?;
        let raw = self.postprocess(&output, scale, pad_x, pad_y, width, height);

        let detections: Vec<Detection> = raw
            .into_iter()
            .map(|d| Detection {
                class_name: COCO_NAMES[d.class_id].to_string(),
                bbox: [
                    d.bbox[0].round() as i32,
                    d.bbox[1].round() as i32,
                    d.bbox[2].round() as i32,
                    d.bbox[3].round() as i32,
                ],
                confidence: d.confidence,
            })
            .collect();

        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }
}

#[derive(Debug, Clone)]
struct RawDetection {
    bbox: [f32; 4],
    confidence: f32,
    class_id: usize,
}

/// Letterbox into a 640x640 canvas, normalize to [0, 1], HWC -> CHW.
fn preprocess(src: &[u8], src_w: usize, src_h: usize) -> (Vec<f32>, f32, f32, f32) {
    let target = YOLO_INPUT_SIZE;

    let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
    let scaled_w = (src_w as f32 * scale) as usize;
    let scaled_h = (src_h as f32 * scale) as usize;

    let pad_x = (target - scaled_w) as f32 / 2.0;
    let pad_y = (target - scaled_h) as f32 / 2.0;

    let resized = resize_bilinear(src, src_w, src_h, scaled_w, scaled_h);

    // Gray canvas, resized image centered
    let mut canvas = vec![114u8; target * target * 3];
    for y in 0..scaled_h {
        for x in 0..scaled_w {
            let src_idx = (y * scaled_w + x) * 3;
            let dst_x = x + pad_x as usize;
            let dst_y = y + pad_y as usize;
            let dst_idx = (dst_y * target + dst_x) * 3;
            canvas[dst_idx..dst_idx + 3].copy_from_slice(&resized[src_idx..src_idx + 3]);
        }
    }

    let mut input = vec![0.0f32; 3 * target * target];
    for c in 0..3 {
        for h in 0..target {
            for w in 0..target {
                let hwc_idx = (h * target + w) * 3 + c;
                let chw_idx = c * target * target + h * target + w;
                input[chw_idx] = canvas[hwc_idx] as f32 / 255.0;
            }
        }
    }

    (input, scale, pad_x, pad_y)
}

fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }
    dst
}

fn nms(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

    let mut keep = Vec::new();
    while !detections.is_empty() {
        let current = detections.remove(0);
        detections.retain(|det| calculate_iou(&current.bbox, &det.bbox) < iou_threshold);
        keep.push(current);
    }
    keep
}

fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nms_suppresses_overlapping_boxes() {
        let detections = vec![
            RawDetection {
                bbox: [0.0, 0.0, 100.0, 100.0],
                confidence: 0.9,
                class_id: 2,
            },
            RawDetection {
                bbox: [5.0, 5.0, 105.0, 105.0],
                confidence: 0.8,
                class_id: 2,
            },
            RawDetection {
                bbox: [300.0, 300.0, 400.0, 400.0],
                confidence: 0.7,
                class_id: 0,
            },
        ];

        let kept = nms(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(calculate_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_preprocess_letterbox_geometry() {
        // 1280x720 -> scale 0.5, 640x360 centered with 140px vertical pad
        let src = vec![0u8; 1280 * 720 * 3];
        let (input, scale, pad_x, pad_y) = preprocess(&src, 1280, 720);

        assert_eq!(input.len(), 3 * 640 * 640);
        assert!((scale - 0.5).abs() < f32::EPSILON);
        assert_eq!(pad_x, 0.0);
        assert_eq!(pad_y, 140.0);

        // Padded rows carry the gray fill
        assert!((input[0] - 114.0 / 255.0).abs() < 1e-6);
    }
}
