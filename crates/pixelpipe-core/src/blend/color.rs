//! Compositing arithmetic shared by the blend modes.
//!
//! All values are non-premultiplied 16-bit channels widened to `u64` so that
//! products of two channels never overflow.

use image::Rgba;

use crate::types::Pixel;

/// Channel maximum as a wide integer.
pub const MAX: u64 = 0xffff;

/// Channel midpoint used by the threshold modes.
pub const HALF: u64 = 0x8000;

/// Porter-Duff "over" output alpha: `a1 + a2 - a1 * a2 / max`.
#[inline]
pub fn porter_duff_alpha(bottom: u16, top: u16) -> u16 {
    let (a1, a2) = (u64::from(bottom), u64::from(top));
    (a1 + a2 - a1 * a2 / MAX) as u16
}

/// Apply a color formula and composite it over `bottom` by the top alpha.
///
/// A fully transparent top keeps the bottom pixel. A partially transparent
/// top interpolates between the bottom color and the formula result.
/// Output alpha is always Porter-Duff over.
pub fn blend_with_alpha<F>(bottom: Pixel, top: Pixel, formula: F) -> Pixel
where
    F: Fn([u64; 3], [u64; 3]) -> [u64; 3],
{
    let a2 = top[3];
    if a2 == 0 {
        return bottom;
    }
    let b = [bottom[0], bottom[1], bottom[2]].map(u64::from);
    let t = [top[0], top[1], top[2]].map(u64::from);
    let mixed = formula(b, t).map(|c| c.min(MAX));

    let rgb = if u64::from(a2) == MAX {
        mixed
    } else {
        let alpha = f64::from(a2) / MAX as f64;
        let mut out = [0u64; 3];
        for i in 0..3 {
            out[i] = (mixed[i] as f64 * alpha + b[i] as f64 * (1.0 - alpha)) as u64;
        }
        out
    };

    Rgba([
        rgb[0] as u16,
        rgb[1] as u16,
        rgb[2] as u16,
        porter_duff_alpha(bottom[3], a2),
    ])
}

/// Like [`blend_with_alpha`] with the same formula applied to each channel.
#[inline]
pub fn channelwise<F>(bottom: Pixel, top: Pixel, formula: F) -> Pixel
where
    F: Fn(u64, u64) -> u64,
{
    blend_with_alpha(bottom, top, |b, t| {
        [formula(b[0], t[0]), formula(b[1], t[1]), formula(b[2], t[2])]
    })
}

/// Clamp a signed intermediate into the channel range.
#[inline]
pub fn clamp_channel(v: i64) -> u64 {
    v.clamp(0, MAX as i64) as u64
}

/// Rec. 601 weighted luminosity of an RGB triple.
#[inline]
pub fn luminosity(c: [u64; 3]) -> u64 {
    (c[0] * 299 + c[1] * 587 + c[2] * 114) / 1000
}

/// Convert 16-bit RGB to hue, saturation and lightness in `[0, 1]`.
pub fn rgb_to_hsl(c: [u64; 3]) -> (f64, f64, f64) {
    let [r, g, b] = c.map(|v| v as f64 / MAX as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

/// Convert hue, saturation and lightness in `[0, 1]` back to 16-bit RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [u64; 3] {
    let rgb = if s == 0.0 {
        [l, l, l]
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        [
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        ]
    };
    rgb.map(|v| (v.clamp(0.0, 1.0) * MAX as f64) as u64)
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_porter_duff_boundaries() {
        for a1 in [0u16, 1, 0x7fff, 0x8000, 0xfffe, 0xffff] {
            assert_eq!(porter_duff_alpha(a1, 0), a1);
            assert_eq!(porter_duff_alpha(a1, 0xffff), 0xffff);
        }
        assert_eq!(porter_duff_alpha(0, 0x1234), 0x1234);
    }

    #[test]
    fn test_porter_duff_symmetric() {
        for (a1, a2) in [(100u16, 60000u16), (0x8000, 0x4000), (1, 65534)] {
            assert_eq!(porter_duff_alpha(a1, a2), porter_duff_alpha(a2, a1));
        }
    }

    #[test]
    fn test_transparent_top_keeps_bottom() {
        let bottom = Rgba([10, 20, 30, 40]);
        let out = blend_with_alpha(bottom, Rgba([65535, 65535, 65535, 0]), |_, t| t);
        assert_eq!(out, bottom);
    }

    #[test]
    fn test_half_alpha_interpolates() {
        let bottom = Rgba([0, 0, 0, 65535]);
        let top = Rgba([65535, 65535, 65535, 32768]);
        let out = blend_with_alpha(bottom, top, |_, t| t);
        assert!(out[0].abs_diff(32768) <= 1, "got {}", out[0]);
        assert_eq!(out[3], 65535);
    }

    #[test]
    fn test_formula_results_are_clamped() {
        let out = channelwise(
            Rgba([65535, 0, 0, 65535]),
            Rgba([65535, 0, 0, 65535]),
            |b, t| b + t,
        );
        assert_eq!(out[0], 65535);
    }

    #[test]
    fn test_hsl_round_trip() {
        for c in [
            [65535u64, 0, 0],
            [0, 65535, 0],
            [0, 0, 65535],
            [12000, 40000, 22000],
            [30000, 30000, 30000],
        ] {
            let (h, s, l) = rgb_to_hsl(c);
            let back = hsl_to_rgb(h, s, l);
            for i in 0..3 {
                assert!(back[i].abs_diff(c[i]) <= 1, "{c:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let (_, s, l) = rgb_to_hsl([32768, 32768, 32768]);
        assert_eq!(s, 0.0);
        assert!((l - 32768.0 / 65535.0).abs() < 1e-12);
    }
}
