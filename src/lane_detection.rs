// src/lane_detection.rs
//
// Lane-region highlighting: Canny edges restricted to the lower road
// trapezoid, Hough segments drawn in green over the frame. The midpoint
// returned alongside the annotated frame is the reference for left/right
// classification.

use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vector},
    imgproc,
    prelude::*,
};

pub struct LaneHighlight {
    pub annotated: Mat,
    pub midpoint_x: i32,
}

pub fn highlight_lanes(frame: &Mat) -> Result<LaneHighlight> {
    let width = frame.cols();
    let height = frame.rows();

    let mut gray = Mat::default();
    imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

    let mut blur = Mat::default();
    imgproc::gaussian_blur(
        &gray,
        &mut blur,
        Size::new(5, 5),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
    )?;

    let mut edges = Mat::default();
    imgproc::canny(&blur, &mut edges, 50.0, 150.0, 3, false)?;

    // Keep only the lower 30% road trapezoid
    let mut mask = Mat::zeros(height, width, edges.typ())?.to_mat()?;
    let roof_y = (height as f64 * 0.7) as i32;
    let polygon: Vector<Vector<Point>> = Vector::from_iter([Vector::from_iter([
        Point::new(0, roof_y),
        Point::new(width, roof_y),
        Point::new(width, height),
        Point::new(0, height),
    ])]);
    imgproc::fill_poly(
        &mut mask,
        &polygon,
        Scalar::all(255.0),
        imgproc::LINE_8,
        0,
        Point::new(0, 0),
    )?;

    let mut cropped_edges = Mat::default();
    core::bitwise_and(&edges, &mask, &mut cropped_edges, &core::no_array())?;

    let mut lines: Vector<core::Vec4i> = Vector::new();
    imgproc::hough_lines_p(
        &cropped_edges,
        &mut lines,
        1.0,
        std::f64::consts::PI / 180.0,
        50,
        100.0,
        50.0,
    )?;

    let mut line_image = Mat::zeros(height, width, frame.typ())?.to_mat()?;
    for line in lines.iter() {
        imgproc::line(
            &mut line_image,
            Point::new(line[0], line[1]),
            Point::new(line[2], line[3]),
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            5,
            imgproc::LINE_8,
            0,
        )?;
    }

    let mut annotated = Mat::default();
    core::add_weighted(frame, 0.8, &line_image, 1.0, 1.0, &mut annotated, -1)?;

    Ok(LaneHighlight {
        annotated,
        midpoint_x: width / 2,
    })
}
