use crate::{
    error::Error,
    geometry::{PoseAnalysis, Verdict},
    pose::{constants::BODY_JOINTS, Person},
};
use opencv::{
    core::{Mat, Point, Point2f, Scalar},
    imgproc::{self, FILLED, FONT_HERSHEY_SIMPLEX, LINE_8, LINE_AA},
    prelude::*,
};

/// Radius of the marker drawn at every keypoint.
const CIRCLE_RADIUS: i32 = 6;
/// Radius of the correctness marker drawn at a measured joint.
const ANGLE_CIRCLE_RADIUS: i32 = 15;
const LINE_WIDTH: i32 = 4;
const ANGLE_TEXT_SCALE: f64 = 0.8;
const DIAGNOSTIC_TEXT_SCALE: f64 = 0.8;

/// Top-left anchor of the diagnostic text, and the distance between its lines.
const DIAGNOSTIC_ORIGIN: (i32, i32) = (10, 30);
const DIAGNOSTIC_LINE_SPACING: i32 = 30;

// RGB
const YELLOW: (f64, f64, f64) = (255.0, 255.0, 0.0);
const GRAY: (f64, f64, f64) = (136.0, 136.0, 136.0);
const GREEN: (f64, f64, f64) = (0.0, 255.0, 0.0);
const RED: (f64, f64, f64) = (255.0, 0.0, 0.0);
const BLACK: (f64, f64, f64) = (0.0, 0.0, 0.0);

fn color((r, g, b): (f64, f64, f64)) -> Scalar {
    Scalar::new(r, g, b, 255.0)
}

fn pixel(point: Point2f) -> Result<Point, Error> {
    point.to().ok_or(Error::ConvertPoint2fToPoint2i(point))
}

/// Draw skeletons for `persons` and, for the analyzed person, joint markers and the
/// diagnostic text. The input frame is left untouched.
pub fn draw_body_keypoints(
    image: &Mat,
    persons: &[Person],
    analysis: Option<&PoseAnalysis>,
) -> Result<Mat, Error> {
    let mut output = Mat::default();
    image.copy_to(&mut output).map_err(Error::CopyImage)?;

    for person in persons {
        draw_skeleton(&mut output, person)?;
    }

    if let Some(analysis) = analysis {
        draw_joint_markers(&mut output, analysis)?;
        draw_diagnostics(&mut output, &analysis.display_lines())?;
    }

    Ok(output)
}

fn draw_skeleton(output: &mut Mat, person: &Person) -> Result<(), Error> {
    for &(a, b) in BODY_JOINTS.iter() {
        imgproc::line(
            output,
            pixel(person.point(a)?)?,
            pixel(person.point(b)?)?,
            color(GRAY),
            LINE_WIDTH,
            LINE_8,
            0, // shift
        )
        .map_err(Error::DrawLine)?;
    }

    for keypoint in person.keypoints.iter() {
        imgproc::circle(
            output,
            pixel(keypoint.point)?,
            CIRCLE_RADIUS,
            color(YELLOW),
            FILLED,
            LINE_8,
            0, // shift
        )
        .map_err(Error::DrawCircle)?;
    }
    Ok(())
}

fn draw_joint_markers(output: &mut Mat, analysis: &PoseAnalysis) -> Result<(), Error> {
    for measurement in &analysis.measurements {
        let vertex = pixel(measurement.vertex)?;
        let marker = match measurement.verdict {
            Verdict::Correct => Some(GREEN),
            Verdict::Incorrect { .. } => Some(RED),
            Verdict::Unreferenced | Verdict::Unmeasurable => None,
        };

        match (marker, measurement.angle) {
            (Some(marker), _) => imgproc::circle(
                output,
                vertex,
                ANGLE_CIRCLE_RADIUS,
                color(marker),
                FILLED,
                LINE_8,
                0, // shift
            )
            .map_err(Error::DrawCircle)?,
            (None, Some(angle)) => imgproc::put_text(
                output,
                &format!("{:.2}", angle),
                vertex,
                FONT_HERSHEY_SIMPLEX,
                ANGLE_TEXT_SCALE,
                color(YELLOW),
                1,       // thickness
                LINE_AA, // line_type
                false,   // bottom_left_origin
            )
            .map_err(Error::PutText)?,
            (None, None) => {}
        }
    }
    Ok(())
}

fn draw_diagnostics(output: &mut Mat, lines: &[String]) -> Result<(), Error> {
    let (x, mut y) = DIAGNOSTIC_ORIGIN;
    for line in lines {
        imgproc::put_text(
            output,
            line,
            Point::new(x, y),
            FONT_HERSHEY_SIMPLEX,
            DIAGNOSTIC_TEXT_SCALE,
            color(BLACK),
            2,       // thickness
            LINE_AA, // line_type
            false,   // bottom_left_origin
        )
        .map_err(Error::PutText)?;
        y += DIAGNOSTIC_LINE_SPACING;
    }
    Ok(())
}
