//! A few single-image pixel transforms built on the processor.

use image::Rgba;

use super::PixelProcessor;
use crate::types::{Image, Pixel, MAX_CHANNEL};

/// Invert the color channels, keeping alpha.
pub fn invert(processor: &PixelProcessor, image: &Image) -> Image {
    processor.process(image, |Rgba([r, g, b, a])| {
        Rgba([MAX_CHANNEL - r, MAX_CHANNEL - g, MAX_CHANNEL - b, a])
    })
}

/// Replace color with its Rec. 601 luma.
pub fn grayscale(processor: &PixelProcessor, image: &Image) -> Image {
    processor.process(image, |p| {
        let y = luma(p);
        Rgba([y, y, y, p[3]])
    })
}

/// Scale color channels by `factor`, clamping to the channel range.
pub fn brightness(processor: &PixelProcessor, image: &Image, factor: f64) -> Image {
    processor.process(image, move |Rgba([r, g, b, a])| {
        Rgba([scale(r, factor), scale(g, factor), scale(b, factor), a])
    })
}

/// Scale the alpha channel by `factor`.
pub fn opacity(processor: &PixelProcessor, image: &Image, factor: f64) -> Image {
    processor.process(image, move |Rgba([r, g, b, a])| Rgba([r, g, b, scale(a, factor)]))
}

/// Per-pixel luma buffer in `[0, 1]`.
pub fn luminance_map(processor: &PixelProcessor, image: &Image) -> Vec<f64> {
    processor.buffer(image, |p| f64::from(luma(p)) / f64::from(MAX_CHANNEL))
}

fn luma(p: Pixel) -> u16 {
    let [r, g, b, _] = p.0.map(u64::from);
    ((r * 299 + g * 587 + b * 114) / 1000) as u16
}

fn scale(channel: u16, factor: f64) -> u16 {
    (f64::from(channel) * factor)
        .round()
        .clamp(0.0, f64::from(MAX_CHANNEL)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::solid;

    fn processor() -> PixelProcessor {
        PixelProcessor::new(2).unwrap()
    }

    #[test]
    fn test_invert_twice_is_identity() {
        let img = solid(4, 3, Rgba([100, 20000, 65535, 1234]));
        let p = processor();
        assert_eq!(invert(&p, &invert(&p, &img)), img);
        assert_eq!(invert(&p, &img).get_pixel(0, 0), &Rgba([65435, 45535, 0, 1234]));
    }

    #[test]
    fn test_grayscale_of_white_is_white() {
        let img = solid(2, 2, Rgba([65535, 65535, 65535, 65535]));
        assert_eq!(grayscale(&processor(), &img), img);
    }

    #[test]
    fn test_brightness_clamps() {
        let img = solid(1, 1, Rgba([40000, 1000, 0, 500]));
        let out = brightness(&processor(), &img, 2.0);
        assert_eq!(out.get_pixel(0, 0), &Rgba([65535, 2000, 0, 500]));
    }

    #[test]
    fn test_opacity_only_touches_alpha() {
        let img = solid(1, 1, Rgba([1, 2, 3, 65535]));
        let out = opacity(&processor(), &img, 0.5);
        assert_eq!(out.get_pixel(0, 0), &Rgba([1, 2, 3, 32768]));
    }

    #[test]
    fn test_luminance_map_range() {
        let img = solid(3, 3, Rgba([65535, 65535, 65535, 65535]));
        let map = luminance_map(&processor(), &img);
        assert_eq!(map.len(), 9);
        assert!(map.iter().all(|v| (*v - 1.0).abs() < 1e-9));
    }
}
