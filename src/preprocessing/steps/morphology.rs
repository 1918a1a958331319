//! Binary morphology on 0/255 masks
//!
//! Digits are dark, so FOREGROUND is 0 and BACKGROUND is 255. Both passes are
//! built on [`reduce_neighborhood`], which applies an "any neighbor" rule:
//! a single matching pixel inside the structuring element is enough to
//! trigger, there is no counting or majority vote.

use image::GrayImage;

pub const FOREGROUND: u8 = 0;
pub const BACKGROUND: u8 = 255;

/// Square structuring element of side `2 * radius + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    radius: u32,
}

impl StructuringElement {
    /// The 3x3 element used by the CAPTCHA cleaner
    pub const SQUARE_3X3: Self = Self { radius: 1 };

    pub fn square(radius: u32) -> Self {
        Self { radius }
    }
}

/// Any-neighbor reduction over a square neighborhood
///
/// For every pixel at least `radius` away from the image edge: if any pixel in
/// its neighborhood (itself included) satisfies `trigger`, the output pixel is
/// set to `fill`; otherwise it keeps its input value. Reads always come from
/// `image`, never from the partially written output. Pixels in the outer
/// `radius`-wide frame are copied unchanged.
pub fn reduce_neighborhood<F>(
    image: &GrayImage,
    element: StructuringElement,
    trigger: F,
    fill: u8,
) -> GrayImage
where
    F: Fn(u8) -> bool,
{
    let (width, height) = image.dimensions();
    let r = element.radius;
    let mut output = image.clone();

    if width <= 2 * r || height <= 2 * r {
        return output;
    }

    for y in r..height - r {
        for x in r..width - r {
            let hit = (y - r..=y + r)
                .any(|ny| (x - r..=x + r).any(|nx| trigger(image.get_pixel(nx, ny).0[0])));
            if hit {
                output.get_pixel_mut(x, y).0[0] = fill;
            }
        }
    }

    output
}

/// Erosion: shrink foreground wherever it touches background
///
/// One-pixel-wide strokes have background in every neighborhood and vanish.
pub fn erode(image: &GrayImage, element: StructuringElement) -> GrayImage {
    reduce_neighborhood(image, element, |v| v == BACKGROUND, BACKGROUND)
}

/// Dilation: grow foreground into any neighborhood that contains it
pub fn dilate(image: &GrayImage, element: StructuringElement) -> GrayImage {
    reduce_neighborhood(image, element, |v| v == FOREGROUND, FOREGROUND)
}

/// Opening: erosion followed by dilation with the same element
pub fn open(image: &GrayImage, element: StructuringElement) -> GrayImage {
    dilate(&erode(image, element), element)
}
