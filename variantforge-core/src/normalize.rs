//! Output Normalization
//!
//! resize (nearest) -> split RGB/alpha -> quantize RGB -> rejoin with the
//! untouched alpha -> force transparent pixels to black.
//!
//! The output alpha plane equals the resized input's alpha plane exactly.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

use crate::palettes::GlobalConfig;
use crate::quantize::OctreePalette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    pub size: [u32; 2],
    pub max_colors: u32,
    pub dither: bool,
}

impl Normalizer {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            size: global.image_size,
            max_colors: global.quantize_colors,
            dither: global.dither,
        }
    }

    pub fn apply(&self, sprite: &RgbaImage) -> RgbaImage {
        normalize(sprite, self.size, self.max_colors, self.dither)
    }
}

pub fn normalize(sprite: &RgbaImage, size: [u32; 2], max_colors: u32, dither: bool) -> RgbaImage {
    let [width, height] = size;
    let resized = if sprite.dimensions() == (width, height) {
        sprite.clone()
    } else {
        imageops::resize(sprite, width, height, FilterType::Nearest)
    };

    let (mut rgb, alpha) = split_planes(&resized);

    let palette = OctreePalette::build(&rgb, max_colors as usize);
    if dither {
        imageops::dither(&mut rgb, &palette);
    } else {
        palette.remap(&mut rgb);
    }

    join_planes(&rgb, &alpha)
}

fn split_planes(image: &RgbaImage) -> (RgbImage, GrayImage) {
    let (w, h) = image.dimensions();
    let rgb = RgbImage::from_fn(w, h, |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Rgb([r, g, b])
    });
    let alpha = GrayImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y).0[3]]));
    (rgb, alpha)
}

fn join_planes(rgb: &RgbImage, alpha: &GrayImage) -> RgbaImage {
    let (w, h) = rgb.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let a = alpha.get_pixel(x, y).0[0];
        if a == 0 {
            return Rgba([0, 0, 0, 0]);
        }
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Rgba([r, g, b, a])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite() -> RgbaImage {
        // 4x4: colorful background leaking RGB under alpha 0
        RgbaImage::from_fn(4, 4, |x, y| match (x + y) % 3 {
            0 => Rgba([250, 10, 10, 0]),
            1 => Rgba([10, 200, 30, 255]),
            _ => Rgba([40, 40, 220, 255]),
        })
    }

    fn alpha_plane(img: &RgbaImage) -> Vec<u8> {
        img.pixels().map(|p| p.0[3]).collect()
    }

    #[test]
    fn test_output_has_requested_size() {
        let out = normalize(&sprite(), [8, 12], 16, false);
        assert_eq!(out.dimensions(), (8, 12));
    }

    #[test]
    fn test_alpha_preserved_and_background_black() {
        for dither in [false, true] {
            let input = sprite();
            let out = normalize(&input, [4, 4], 2, dither);
            assert_eq!(alpha_plane(&out), alpha_plane(&input));
            for px in out.pixels().filter(|p| p.0[3] == 0) {
                assert_eq!(px.0, [0, 0, 0, 0]);
            }
        }
    }

    #[test]
    fn test_nearest_upscale_keeps_hard_edges() {
        let input = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 0]) }
        });
        let out = normalize(&input, [4, 2], 16, false);
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(3, 0), &Rgba([0, 0, 0, 0]));
        assert!(out.pixels().all(|p| p.0[3] == 0 || p.0[3] == 255));
    }

    #[test]
    fn test_colors_bounded_by_max() {
        let input = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 99, 255]));
        let out = normalize(&input, [16, 16], 4, false);
        let distinct: std::collections::HashSet<_> = out.pixels().map(|p| p.0).collect();
        assert!(distinct.len() <= 4);
    }
}
