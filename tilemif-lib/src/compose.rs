use glam::{IVec2, UVec2};
use image::{imageops, imageops::FilterType, Rgba as ImageRgba, RgbaImage};

use crate::{
    error::{Error, Result},
    pixel::Rgba,
};

pub const CLEAR: Rgba = [0, 0, 0, 0];
pub const WHITE: Rgba = [255, 255, 255, 255];

fn mix(over: u8, under: u8, alpha: u8) -> u8 {
    let a = alpha as u16;
    return ((over as u16 * a + under as u16 * (255 - a) + 127) / 255) as u8;
}

/// Pastes `overlay` onto `base` with its top left corner at `at`, using the
/// overlay's alpha as the mask.
///
/// Pixels with alpha 0 leave the base untouched, alpha 255 replaces the base
/// pixel, anything in between mixes the two. Whatever falls outside `base`
/// is clipped.
pub fn overlay(base: &mut RgbaImage, overlay: &RgbaImage, at: IVec2) {
    let base_dims = IVec2::new(base.width() as i32, base.height() as i32);
    for (x, y, pixel) in overlay.enumerate_pixels() {
        let target = at + IVec2::new(x as i32, y as i32);
        if target.x < 0 || target.y < 0 || target.x >= base_dims.x || target.y >= base_dims.y {
            continue;
        }
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        let under = base.get_pixel_mut(target.x as u32, target.y as u32);
        if a == 255 {
            under.0 = pixel.0;
            continue;
        }
        let [ur, ug, ub, ua] = under.0;
        under.0 = [mix(r, ur, a), mix(g, ug, a), mix(b, ub, a), mix(a, ua, a)];
    }
}

/// Position that centers `inner` inside `outer`, negative when `inner` is
/// bigger
pub fn centered(outer: UVec2, inner: UVec2) -> IVec2 {
    return (outer.as_ivec2() - inner.as_ivec2()) / 2;
}

/// [`overlay`] at the center of `base`, returning a new image
pub fn overlay_centered(base: &RgbaImage, top: &RgbaImage) -> RgbaImage {
    let mut result = base.clone();
    let at = centered(base.dimensions().into(), top.dimensions().into());
    overlay(&mut result, top, at);
    return result;
}

/// Scales `image` to fit a `size x size` square keeping its aspect ratio,
/// then centers it on a canvas filled with `background`.
pub fn fit_to_tile(image: &RgbaImage, size: u32, background: Rgba) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(size, size, ImageRgba(background));
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || size == 0 {
        return canvas;
    }
    let ratio = f64::min(size as f64 / w as f64, size as f64 / h as f64);
    let scaled = UVec2::new(
        ((w as f64 * ratio) as u32).clamp(1, size),
        ((h as f64 * ratio) as u32).clamp(1, size),
    );
    let resized = imageops::resize(image, scaled.x, scaled.y, FilterType::Lanczos3);
    let at = centered(UVec2::splat(size), scaled);
    overlay(&mut canvas, &resized, at);
    log::trace!("fit {w}x{h} into {size}x{size} as {}x{}", scaled.x, scaled.y);
    return canvas;
}

/// Places `image` on a `canvas` sized background. An image that already fits
/// goes in the top left corner unscaled, a bigger one is scaled down keeping
/// its aspect ratio and centered. Pixels are copied, not blended.
pub fn fit_to_canvas(image: &RgbaImage, canvas: UVec2, background: Rgba) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(canvas.x, canvas.y, ImageRgba(background));
    let dims = UVec2::from(image.dimensions());
    if dims.x == 0 || dims.y == 0 || canvas.x == 0 || canvas.y == 0 {
        return out;
    }
    if dims.x <= canvas.x && dims.y <= canvas.y {
        imageops::replace(&mut out, image, 0, 0);
        return out;
    }
    let ratio = f64::min(canvas.x as f64 / dims.x as f64, canvas.y as f64 / dims.y as f64);
    let scaled = UVec2::new(
        ((dims.x as f64 * ratio) as u32).clamp(1, canvas.x),
        ((dims.y as f64 * ratio) as u32).clamp(1, canvas.y),
    );
    let resized = imageops::resize(image, scaled.x, scaled.y, FilterType::Lanczos3);
    let at = centered(canvas, scaled);
    imageops::replace(&mut out, &resized, at.x as i64, at.y as i64);
    log::debug!("fit {}x{} onto {}x{} as {}x{}", dims.x, dims.y, canvas.x, canvas.y, scaled.x, scaled.y);
    return out;
}

/// Default canvas for [`shrink_with_margin`], half as big again as the image
pub fn margin_canvas(dims: UVec2) -> UVec2 {
    return dims * 3 / 2;
}

/// Centers `image` on a transparent `expanded` canvas and scales the result
/// back to the size of `image`, leaving a transparent margin around it.
pub fn shrink_with_margin(image: &RgbaImage, expanded: UVec2) -> Result<RgbaImage> {
    let (width, height) = image.dimensions();
    let dims = UVec2::new(width, height);
    if expanded.x < dims.x || expanded.y < dims.y {
        return Err(Error::InputDimensionMismatch {
            width,
            height,
            expected: format!("it must fit the {}x{} canvas", expanded.x, expanded.y),
        });
    }
    let mut canvas = RgbaImage::from_pixel(expanded.x, expanded.y, ImageRgba(CLEAR));
    let at = centered(expanded, dims);
    imageops::replace(&mut canvas, image, at.x as i64, at.y as i64);
    return Ok(imageops::resize(&canvas, width, height, FilterType::Lanczos3));
}

/// Cuts a horizontal strip into square tiles as tall as the strip.
/// Columns left over on the right are ignored.
pub fn slice_strip(image: &RgbaImage) -> Vec<RgbaImage> {
    let (w, h) = image.dimensions();
    if h == 0 {
        return Vec::new();
    }
    return (0..w / h)
        .map(|i| imageops::crop_imm(image, i * h, 0, h, h).to_image())
        .collect();
}
