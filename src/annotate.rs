//! Frame annotation and encoding.
//!
//! Draws the active inclusion region and the processed detections onto a copy of the
//! frame, then encodes it as JPEG for the transport.
//!
//! Colours follow the field setup: green boxes for detections that passed the
//! threshold, blue for rejected ones, yellow for newly counted, red counting line,
//! yellow area hull.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::count::{FrameOutcome, InclusionRegion};
use crate::frame::Frame;
use crate::{BoundingBox, Point};

const PASSED: Rgb<u8> = Rgb([0, 255, 0]);
const REJECTED: Rgb<u8> = Rgb([0, 0, 255]);
const NEW_COUNT: Rgb<u8> = Rgb([255, 255, 0]);
const REFERENCE: Rgb<u8> = Rgb([255, 0, 0]);
const LINE: Rgb<u8> = Rgb([255, 0, 0]);
const AREA: Rgb<u8> = Rgb([255, 255, 0]);

/// Draw region and detections onto the frame's pixels.
///
/// Every shape is clipped to the canvas first, so regions or boxes far outside the
/// frame cost nothing to draw.
pub fn draw(frame: Frame, outcome: &FrameOutcome, region: &InclusionRegion) -> RgbImage {
    let mut canvas = frame.into_image();
    let (width, height) = canvas.dimensions();

    match region {
        InclusionRegion::WholeFrame => {}
        InclusionRegion::Line { y } => {
            for row in [*y, *y + 1.0] {
                draw_clipped_segment(&mut canvas, (0.0, row), (width as f32, row), LINE);
            }
        }
        InclusionRegion::Area(hull) => {
            let vertices = hull.vertices();
            for (i, a) in vertices.iter().enumerate() {
                let b = vertices[(i + 1) % vertices.len()];
                draw_clipped_segment(&mut canvas, (a.x, a.y), (b.x, b.y), AREA);
            }
        }
    }

    for bbox in &outcome.below_threshold {
        draw_box(&mut canvas, bbox, REJECTED, width, height);
    }
    for det in &outcome.detections {
        let colour = if det.is_new { NEW_COUNT } else { PASSED };
        draw_box(&mut canvas, &det.bbox, colour, width, height);
        let Point { x, y } = det.reference;
        if x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32 {
            draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), 2, REFERENCE);
        }
    }
    canvas
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((image.width() * image.height()) as usize / 4);
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encode")?;
    Ok(buf)
}

/// Draw and encode in one step.
pub fn render(
    frame: Frame,
    outcome: &FrameOutcome,
    region: &InclusionRegion,
    quality: u8,
) -> Result<Vec<u8>> {
    let canvas = draw(frame, outcome, region);
    encode_jpeg(&canvas, quality)
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, colour: Rgb<u8>, width: u32, height: u32) {
    if bbox.x2 <= 0.0 || bbox.y2 <= 0.0 || bbox.x1 >= width as f32 || bbox.y1 >= height as f32 {
        return;
    }
    let x1 = bbox.x1.max(0.0);
    let y1 = bbox.y1.max(0.0);
    let x2 = bbox.x2.min(width as f32);
    let y2 = bbox.y2.min(height as f32);
    let w = (x2 - x1).round() as u32;
    let h = (y2 - y1).round() as u32;
    if w == 0 || h == 0 {
        return;
    }
    draw_hollow_rect_mut(canvas, Rect::at(x1 as i32, y1 as i32).of_size(w, h), colour);
}

fn draw_clipped_segment(canvas: &mut RgbImage, a: (f32, f32), b: (f32, f32), colour: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    if let Some((a, b)) = clip_segment(a, b, width, height) {
        draw_line_segment_mut(canvas, a, b, colour);
    }
}

/// Liang-Barsky clip of segment `a`-`b` to the pixel rectangle of a `width` x `height`
/// canvas. `None` when no part of the segment lies on the canvas.
fn clip_segment(
    a: (f32, f32),
    b: (f32, f32),
    width: u32,
    height: u32,
) -> Option<((f32, f32), (f32, f32))> {
    if width == 0 || height == 0 {
        return None;
    }
    let (ax, ay) = (f64::from(a.0), f64::from(a.1));
    let (dx, dy) = (f64::from(b.0) - ax, f64::from(b.1) - ay);
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);

    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [(-dx, ax), (dx, max_x - ax), (-dy, ay), (dy, max_y - ay)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| ((ax + t * dx) as f32, (ay + t * dy) as f32);
    Some((at(t0), at(t1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count::{AnnotatedDetection, SessionId};

    fn outcome() -> FrameOutcome {
        let bbox = BoundingBox::new(10.0, 10.0, 30.0, 30.0).unwrap();
        FrameOutcome {
            detections: vec![AnnotatedDetection {
                session_id: Some(SessionId(1)),
                bbox,
                reference: bbox.center(),
                class_label: "sheep".into(),
                confidence: 0.9,
                trackable: true,
                included: true,
                is_new: true,
            }],
            below_threshold: vec![BoundingBox::new(-5.0, 40.0, 100.0, 70.0).unwrap()],
            ..FrameOutcome::default()
        }
    }

    #[test]
    fn draws_new_count_in_highlight_colour() {
        let frame = Frame::new(1, RgbImage::new(64, 64));
        let canvas = draw(frame, &outcome(), &InclusionRegion::WholeFrame);
        assert_eq!(canvas.get_pixel(10, 20), &NEW_COUNT);
        assert_eq!(canvas.get_pixel(20, 20), &REFERENCE);
    }

    #[test]
    fn draws_line_and_encodes_jpeg() {
        let frame = Frame::new(1, RgbImage::new(64, 64));
        let region = InclusionRegion::line(50.0).unwrap();
        let canvas = draw(frame, &FrameOutcome::default(), &region);
        assert_eq!(canvas.get_pixel(5, 50), &LINE);

        let jpeg = encode_jpeg(&canvas, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn renders_area_hull() {
        let frame = Frame::new(1, RgbImage::new(64, 64));
        let region = InclusionRegion::area(&[
            Point::new(5.0, 5.0),
            Point::new(50.0, 5.0),
            Point::new(50.0, 50.0),
        ])
        .unwrap();
        let jpeg = render(frame, &outcome(), &region, 60).unwrap();
        assert!(!jpeg.is_empty());
    }

    #[test]
    fn far_away_region_is_clipped_to_canvas() {
        let huge = InclusionRegion::area(&[
            Point::new(-3e9, -3e9),
            Point::new(3e9, -3e9),
            Point::new(0.0, 3e9),
        ])
        .unwrap();
        let canvas = draw(Frame::new(1, RgbImage::new(64, 64)), &FrameOutcome::default(), &huge);
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));

        let crossing = InclusionRegion::area(&[
            Point::new(-1e9, 32.0),
            Point::new(1e9, 32.0),
            Point::new(0.0, 1e9),
        ])
        .unwrap();
        let canvas = draw(Frame::new(1, RgbImage::new(64, 64)), &FrameOutcome::default(), &crossing);
        assert_eq!(canvas.get_pixel(5, 32), &AREA);
        assert_eq!(canvas.get_pixel(60, 32), &AREA);

        let line = InclusionRegion::line(3e9).unwrap();
        let canvas = draw(Frame::new(1, RgbImage::new(64, 64)), &FrameOutcome::default(), &line);
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn detection_off_canvas_is_skipped() {
        let bbox = BoundingBox::new(10.0, 3e9, 20.0, 3.1e9).unwrap();
        let outcome = FrameOutcome {
            detections: vec![AnnotatedDetection {
                session_id: Some(SessionId(1)),
                bbox,
                reference: bbox.center(),
                class_label: "sheep".into(),
                confidence: 0.9,
                trackable: true,
                included: true,
                is_new: false,
            }],
            below_threshold: vec![BoundingBox::new(-4e9, -4e9, -3e9, -3e9).unwrap()],
            ..FrameOutcome::default()
        };
        let frame = Frame::new(1, RgbImage::new(64, 64));
        let jpeg = render(frame, &outcome, &InclusionRegion::WholeFrame, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn clip_keeps_inner_part_of_segment() {
        let ((x0, y0), (x1, y1)) = clip_segment((-10.0, 5.0), (100.0, 5.0), 64, 48).unwrap();
        assert!(x0.abs() < 1e-3 && (x1 - 63.0).abs() < 1e-3);
        assert_eq!((y0, y1), (5.0, 5.0));
        assert!(clip_segment((-10.0, -5.0), (100.0, -5.0), 64, 48).is_none());
        assert!(clip_segment((70.0, 0.0), (90.0, 40.0), 64, 48).is_none());
    }
}
