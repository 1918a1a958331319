//! Synthetic CAPTCHA rendering shared by the integration tests

#![allow(dead_code)]

use captcha_ocr::{Architecture, ClassifierWeights, DigitClassifier};
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Cursor;
use std::path::Path;

pub const WIDTH: u32 = 120;
pub const HEIGHT: u32 = 50;
pub const CELL_WIDTH: u32 = WIDTH / 4;

const SCALE: u32 = 4;
const GLYPH_X: u32 = 5;
const GLYPH_Y: u32 = 6;
const BACKGROUND: Rgb<u8> = Rgb([236, 236, 236]);
const INK: Rgb<u8> = Rgb([30, 30, 30]);
const NOISE: Rgb<u8> = Rgb([90, 90, 90]);

/// 5x7 bitmap digits, '#' is ink
const GLYPHS: [[&str; 7]; 10] = [
    [".###.", "#...#", "#..##", "#.#.#", "##..#", "#...#", ".###."],
    ["..#..", ".##..", "..#..", "..#..", "..#..", "..#..", ".###."],
    [".###.", "#...#", "....#", "...#.", "..#..", ".#...", "#####"],
    ["#####", "...#.", "..#..", "...#.", "....#", "#...#", ".###."],
    ["...#.", "..##.", ".#.#.", "#..#.", "#####", "...#.", "...#."],
    ["#####", "#....", "####.", "....#", "....#", "#...#", ".###."],
    ["..##.", ".#...", "#....", "####.", "#...#", "#...#", ".###."],
    ["#####", "....#", "...#.", "..#..", ".#...", ".#...", ".#..."],
    [".###.", "#...#", "#...#", ".###.", "#...#", "#...#", ".###."],
    [".###.", "#...#", "#...#", ".####", "....#", "...#.", ".##.."],
];

/// Render `digits` (four ASCII digits) as a noise-free CAPTCHA
pub fn render(digits: &str) -> DynamicImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    for (i, ch) in digits.chars().enumerate() {
        let glyph = &GLYPHS[ch.to_digit(10).expect("digit") as usize];
        let origin_x = i as u32 * CELL_WIDTH + GLYPH_X;
        for (row, line) in glyph.iter().enumerate() {
            for (col, cell) in line.chars().enumerate() {
                if cell == '#' {
                    let rect = Rect::at(
                        (origin_x + col as u32 * SCALE) as i32,
                        (GLYPH_Y + row as u32 * SCALE) as i32,
                    )
                    .of_size(SCALE, SCALE);
                    draw_filled_rect_mut(&mut img, rect, INK);
                }
            }
        }
    }

    DynamicImage::ImageRgb8(img)
}

/// Render `digits` with thin dark strokes drawn across the whole image
pub fn render_noisy(digits: &str) -> DynamicImage {
    let mut img = render(digits).to_rgb8();
    draw_line_segment_mut(&mut img, (0.0, 4.0), (119.0, 33.0), NOISE);
    draw_line_segment_mut(&mut img, (0.0, 30.0), (119.0, 8.0), NOISE);
    draw_line_segment_mut(&mut img, (0.0, 20.0), (119.0, 22.0), NOISE);
    DynamicImage::ImageRgb8(img)
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn write_png(dir: &Path, name: &str, image: &DynamicImage) {
    image
        .save_with_format(dir.join(name), ImageFormat::Png)
        .expect("write png");
}

/// Randomly initialised weights, enough to exercise the inference path
pub fn untrained_weights(seed: u64) -> ClassifierWeights {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let model = DigitClassifier::new(Architecture::DIGIT_CNN, vb).expect("build classifier");
    model
        .initialize(&varmap, &mut StdRng::seed_from_u64(seed))
        .expect("initialize");
    ClassifierWeights::from_varmap(&varmap).expect("snapshot weights")
}
