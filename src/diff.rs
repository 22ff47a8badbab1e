//! Tolerant pixel diff.
//!
//! Per-pixel distance is the YIQ perceptual delta used by pixelmatch, with
//! translucent pixels blended against white. Pixels that look like
//! anti-aliasing on either side are not counted, unless disabled.
//!
//! Images of different sizes are compared over the union canvas; the smaller
//! one is padded with transparent pixels, which read as white.

use image::{Rgba, RgbaImage};

use crate::types::DiffResult;

/// `35215` is the largest possible YIQ delta between two colours.
const MAX_YIQ_DELTA: f64 = 35215.0;

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const AA_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
/// Opacity of unchanged pixels in the diff image.
const FADE_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Per-pixel colour distance in `[0, 1]`; 0 means any change counts.
    pub tolerance: f64,
    pub detect_anti_aliasing: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            tolerance: crate::config::DEFAULT_TOLERANCE,
            detect_anti_aliasing: true,
        }
    }
}

impl DiffOptions {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }
}

/// Compares `candidate` against `fixture`.
///
/// Both images are compared on the union of their sizes, with the missing
/// part of the smaller one read as blank. `differing_fraction` is the count
/// of differing pixels over that union area. It equals the candidate's area
/// whenever the candidate is at least as large as the fixture in both
/// dimensions, and stays within `[0, 1]` when the content shrank. A diff
/// image is rendered only when the count is non-zero.
pub fn diff_images(fixture: &RgbaImage, candidate: &RgbaImage, options: &DiffOptions) -> DiffResult {
    if fixture.dimensions() == candidate.dimensions() && fixture.as_raw() == candidate.as_raw() {
        return DiffResult::identical();
    }

    let width = fixture.width().max(candidate.width());
    let height = fixture.height().max(candidate.height());
    let fixture = extend_canvas(fixture, width, height);
    let candidate = extend_canvas(candidate, width, height);
    let (fixture, candidate) = (fixture.as_ref(), candidate.as_ref());

    let max_delta = MAX_YIQ_DELTA * options.tolerance * options.tolerance;
    let mut output = RgbaImage::new(width, height);
    let mut differing = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = fixture.get_pixel(x, y);
            let b = candidate.get_pixel(x, y);
            let delta = if a == b { 0.0 } else { color_delta(a, b, false) };

            if delta.abs() > max_delta {
                if options.detect_anti_aliasing
                    && (antialiased(fixture, x, y, candidate) || antialiased(candidate, x, y, fixture))
                {
                    output.put_pixel(x, y, AA_COLOR);
                } else {
                    output.put_pixel(x, y, DIFF_COLOR);
                    differing += 1;
                }
            } else {
                output.put_pixel(x, y, faded(a));
            }
        }
    }

    if differing == 0 {
        return DiffResult::identical();
    }

    let area = u64::from(width) * u64::from(height);
    tracing::debug!(differing, area, width, height, "pixel diff");
    DiffResult {
        differing_pixels: differing,
        differing_fraction: differing as f64 / area as f64,
        diff_image: Some(output),
    }
}

enum Canvas<'a> {
    Borrowed(&'a RgbaImage),
    Owned(RgbaImage),
}

impl AsRef<RgbaImage> for Canvas<'_> {
    fn as_ref(&self) -> &RgbaImage {
        match self {
            Canvas::Borrowed(image) => image,
            Canvas::Owned(image) => image,
        }
    }
}

/// Grows `image` to `width x height` with transparent fill; never shrinks.
fn extend_canvas(image: &RgbaImage, width: u32, height: u32) -> Canvas<'_> {
    if image.dimensions() == (width, height) {
        return Canvas::Borrowed(image);
    }
    let mut canvas = RgbaImage::new(width, height);
    image::imageops::replace(&mut canvas, image, 0, 0);
    Canvas::Owned(canvas)
}

fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.2741761 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Opaque RGB of `pixel` as seen over a white background.
fn over_white(pixel: &Rgba<u8>) -> (f64, f64, f64) {
    let [r, g, b, a] = pixel.0;
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a == 255 {
        return (r, g, b);
    }
    let alpha = f64::from(a) / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

/// Signed YIQ distance; negative when `b` is brighter than `a`.
fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>, brightness_only: bool) -> f64 {
    if a == b {
        return 0.0;
    }
    let (r1, g1, b1) = over_white(a);
    let (r2, g2, b2) = over_white(b);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if brightness_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

fn faded(pixel: &Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let luma = rgb2y(f64::from(r), f64::from(g), f64::from(b));
    let value = blend(luma, FADE_ALPHA * f64::from(a) / 255.0).clamp(0.0, 255.0) as u8;
    Rgba([value, value, value, 255])
}

/// 3x3 neighbourhood of `(x, y)` clamped to the image, centre excluded.
fn neighbours(image: &RgbaImage, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> {
    let x0 = x.saturating_sub(1);
    let y0 = y.saturating_sub(1);
    let x2 = (x + 1).min(image.width() - 1);
    let y2 = (y + 1).min(image.height() - 1);
    (x0..=x2)
        .flat_map(move |nx| (y0..=y2).map(move |ny| (nx, ny)))
        .filter(move |&(nx, ny)| nx != x || ny != y)
}

fn on_edge(image: &RgbaImage, x: u32, y: u32) -> bool {
    x == 0 || y == 0 || x + 1 >= image.width() || y + 1 >= image.height()
}

/// Whether the pixel at `(x, y)` of `image` looks like an anti-aliased edge.
///
/// It must sit between a darker and a brighter neighbour, and one of those
/// must belong to a flat area in both images.
fn antialiased(image: &RgbaImage, x: u32, y: u32, other: &RgbaImage) -> bool {
    let centre = image.get_pixel(x, y);
    let mut zeroes = usize::from(on_edge(image, x, y));
    let mut min = 0.0;
    let mut max = 0.0;
    let mut darkest = None;
    let mut brightest = None;

    for (nx, ny) in neighbours(image, x, y) {
        let delta = color_delta(centre, image.get_pixel(nx, ny), true);
        if delta == 0.0 {
            zeroes += 1;
            if zeroes > 2 {
                return false;
            }
        } else if delta < min {
            min = delta;
            darkest = Some((nx, ny));
        } else if delta > max {
            max = delta;
            brightest = Some((nx, ny));
        }
    }

    let (Some(darkest), Some(brightest)) = (darkest, brightest) else {
        return false;
    };

    let flat_in_both = |(px, py): (u32, u32)| {
        has_many_siblings(image, px, py) && has_many_siblings(other, px, py)
    };
    flat_in_both(darkest) || flat_in_both(brightest)
}

/// More than two neighbours share the exact colour of `(x, y)`.
fn has_many_siblings(image: &RgbaImage, x: u32, y: u32) -> bool {
    let centre = image.get_pixel(x, y);
    let mut zeroes = usize::from(on_edge(image, x, y));
    for (nx, ny) in neighbours(image, x, y) {
        if image.get_pixel(nx, ny) == centre {
            zeroes += 1;
        }
        if zeroes > 2 {
            return true;
        }
    }
    false
}
