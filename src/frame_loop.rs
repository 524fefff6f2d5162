// src/frame_loop.rs
//
// Drives the per-frame cycle: acquire -> lane highlight -> detect ->
// classify -> dispatch -> display. Dispatch is serialized on this task: the
// loop awaits each rewrite and speech call, so cadence visibly stalls while
// an alert is being delivered. The axum server runs as a sibling task and
// is unaffected.

use crate::composite_detector::CompositeDetector;
use crate::dispatcher::AlertDispatcher;
use crate::error::PipelineError;
use crate::lane_detection;
use crate::object_detection::ObjectDetector;
use crate::types::{epoch_seconds, Config, Detection};
use opencv::{
    core::{Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::time::Duration;
use tracing::{info, warn};

const WINDOW_NAME: &str = "Lane and Object Detection with Alerts";
const QUIT_KEY: i32 = 'q' as i32;

pub struct FrameLoop {
    config: Config,
    detector: Box<dyn ObjectDetector>,
    composite: CompositeDetector,
    dispatcher: AlertDispatcher,
}

impl FrameLoop {
    pub fn new(
        config: Config,
        detector: Box<dyn ObjectDetector>,
        composite: CompositeDetector,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            config,
            detector,
            composite,
            dispatcher,
        }
    }

    /// Runs until the quit key or an acquisition failure. Acquisition
    /// failure is fatal and not retried; everything downstream of a frame
    /// is local to that frame.
    pub async fn run(&mut self) -> Result<(), PipelineError> {
        let mut capture = open_capture(&self.config.video.source)?;
        let mut display = self.config.video.display;
        let frame_period = Duration::from_millis(1000 / self.config.video.target_fps.max(1) as u64);

        info!("🚗 Frame loop started (source: {})", self.config.video.source);

        let mut frame = Mat::default();
        loop {
            let grabbed = capture
                .read(&mut frame)
                .map_err(|e| PipelineError::Acquisition(e.to_string()))?;
            if !grabbed || frame.empty() {
                release(&mut capture);
                return Err(PipelineError::Acquisition(
                    "frame source exhausted".to_string(),
                ));
            }

            let lanes = match lane_detection::highlight_lanes(&frame) {
                Ok(lanes) => lanes,
                Err(e) => {
                    warn!("Lane highlighting failed, skipping frame: {}", e);
                    continue;
                }
            };

            let detections = match self.detect(&lanes.annotated) {
                Ok(detections) => detections,
                Err(e) => {
                    warn!("Object detection failed: {}", e);
                    Vec::new()
                }
            };

            let events = self
                .composite
                .process(&detections, lanes.midpoint_x, epoch_seconds());
            for event in &events {
                self.dispatcher.dispatch(event).await;
            }

            if display {
                match show(&lanes.annotated, &detections) {
                    Ok(key) if key == QUIT_KEY => {
                        info!("Quit requested");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Headless environment: alerting continues without
                        // the local window.
                        warn!("Display unavailable, continuing headless: {}", e);
                        display = false;
                    }
                }
            }

            tokio::time::sleep(frame_period).await;
        }

        release(&mut capture);
        Ok(())
    }

    fn detect(&mut self, annotated: &Mat) -> anyhow::Result<Vec<Detection>> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(annotated, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let width = rgb.cols() as usize;
        let height = rgb.rows() as usize;
        let bytes = rgb.data_bytes()?;
        self.detector.detect(bytes, width, height)
    }
}

fn open_capture(source: &str) -> Result<VideoCapture, PipelineError> {
    let capture = match source.parse::<i32>() {
        Ok(index) => VideoCapture::new(index, videoio::CAP_ANY),
        Err(_) => VideoCapture::from_file(source, videoio::CAP_ANY),
    }
    .map_err(|e| PipelineError::Acquisition(e.to_string()))?;

    let opened = capture
        .is_opened()
        .map_err(|e| PipelineError::Acquisition(e.to_string()))?;
    if !opened {
        return Err(PipelineError::Acquisition(format!(
            "failed to open video source {}",
            source
        )));
    }

    Ok(capture)
}

fn release(capture: &mut VideoCapture) {
    if let Err(e) = capture.release() {
        warn!("Failed to release capture: {}", e);
    }
    let _ = highgui::destroy_all_windows();
}

/// Draw detection boxes over the annotated frame and pump the window. Returns
/// the pressed key, if any.
fn show(annotated: &Mat, detections: &[Detection]) -> opencv::Result<i32> {
    let mut canvas = annotated.clone();
    for detection in detections {
        let [x1, y1, x2, y2] = detection.bbox;
        imgproc::rectangle(
            &mut canvas,
            opencv::core::Rect::new(x1, y1, x2 - x1, y2 - y1),
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            &mut canvas,
            &detection.class_name,
            Point::new(x1, (y1 - 5).max(10)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            1,
            imgproc::LINE_8,
            false,
        )?;
    }

    highgui::imshow(WINDOW_NAME, &canvas)?;
    highgui::wait_key(1)
}
