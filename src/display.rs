use crate::error::Error;
use opencv::{
    core::{self, Mat, Rect, Scalar, Size},
    imgproc,
    prelude::*,
};

/// Where an `image` sized frame lands inside `surface`: scaled to fit without changing its
/// aspect ratio and centered along the other axis.
pub fn letterbox(image: Size, surface: Size) -> Result<Rect, Error> {
    if image.width <= 0 || image.height <= 0 || surface.width <= 0 || surface.height <= 0 {
        return Err(Error::EmptyImage);
    }

    let scale = (f64::from(surface.width) / f64::from(image.width))
        .min(f64::from(surface.height) / f64::from(image.height));
    let width = ((f64::from(image.width) * scale).round() as i32).clamp(1, surface.width);
    let height = ((f64::from(image.height) * scale).round() as i32).clamp(1, surface.height);

    Ok(Rect::new(
        (surface.width - width) / 2,
        (surface.height - height) / 2,
        width,
        height,
    ))
}

/// Resize `image` into its letterbox rectangle and pad the rest of `surface` with black.
pub fn present(image: &Mat, surface: Size) -> Result<Mat, Error> {
    let rect = letterbox(image.size().map_err(Error::Resize)?, surface)?;

    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        rect.size(),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(Error::Resize)?;

    let mut output = Mat::default();
    core::copy_make_border(
        &resized,
        &mut output,
        rect.y,
        surface.height - rect.y - rect.height,
        rect.x,
        surface.width - rect.x - rect.width,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )
    .map_err(Error::PadImage)?;
    Ok(output)
}
