//! Built-in blend mode formulas.
//!
//! Every mode except `normal` and `erase` is a color formula fed through
//! [`blend_with_alpha`], which handles top-alpha interpolation and the
//! Porter-Duff output alpha.

use image::Rgba;

use super::color::{
    blend_with_alpha, channelwise, clamp_channel, hsl_to_rgb, luminosity, porter_duff_alpha,
    rgb_to_hsl, HALF, MAX,
};
use crate::types::Pixel;

/// Signature of a built-in blend formula.
pub type ModeFn = fn(Pixel, Pixel) -> Pixel;

/// Every built-in mode, keyed by its registry name.
pub const BUILTIN: &[(&str, ModeFn)] = &[
    ("normal", normal),
    ("erase", erase),
    ("multiply", multiply),
    ("screen", screen),
    ("exclusion", exclusion),
    ("overlay", overlay),
    ("color-burn", color_burn),
    ("color-dodge", color_dodge),
    ("soft-light", soft_light),
    ("hard-light", hard_light),
    ("difference", difference),
    ("subtract", subtract),
    ("divide", divide),
    ("hue", hue),
    ("saturation", saturation),
    ("color", color),
    ("luminosity", luminosity_mode),
    ("average", average),
    ("negation", negation),
    ("reflect", reflect),
    ("glow", glow),
    ("contrast-negate", contrast_negate),
    ("vivid-light", vivid_light),
    ("linear-light", linear_light),
    ("pin-light", pin_light),
    ("darken", darken),
    ("darker-color", darker_color),
    ("lighten", lighten),
    ("lighter-color", lighter_color),
    ("hard-mix", hard_mix),
];

/// Plain Porter-Duff over.
pub fn normal(bottom: Pixel, top: Pixel) -> Pixel {
    let a2 = u64::from(top[3]);
    let inv = MAX - a2;
    let mix = |b: u16, t: u16| ((u64::from(t) * a2 + u64::from(b) * inv) / MAX) as u16;
    Rgba([
        mix(bottom[0], top[0]),
        mix(bottom[1], top[1]),
        mix(bottom[2], top[2]),
        porter_duff_alpha(bottom[3], top[3]),
    ])
}

/// Destination-out: the top alpha punches a hole into the bottom.
pub fn erase(bottom: Pixel, top: Pixel) -> Pixel {
    let inv = MAX - u64::from(top[3]);
    let Rgba(channels) = bottom;
    Rgba(channels.map(|c| (u64::from(c) * inv / MAX) as u16))
}

pub fn multiply(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| b * t / MAX)
}

pub fn screen(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| MAX - (MAX - b) * (MAX - t) / MAX)
}

pub fn exclusion(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| (b + t).saturating_sub((b * t) >> 15))
}

pub fn overlay(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| hard_light_channel(t, b))
}

pub fn color_burn(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| match t {
        MAX => b,
        0 => 0,
        _ => clamp_channel(MAX as i64 - ((MAX - b) * MAX / t) as i64),
    })
}

pub fn color_dodge(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| match t {
        0 => b,
        MAX => MAX,
        _ => (b * MAX / (MAX - t)).min(MAX),
    })
}

pub fn soft_light(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        let (b, t) = (b as f64 / MAX as f64, t as f64 / MAX as f64);
        let v = if t < 0.5 {
            b - (1.0 - 2.0 * t) * b * (1.0 - b)
        } else {
            b + (2.0 * t - 1.0) * (b.sqrt() - b)
        };
        (v * MAX as f64).clamp(0.0, MAX as f64) as u64
    })
}

pub fn hard_light(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, hard_light_channel)
}

pub fn difference(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| b.abs_diff(t))
}

pub fn subtract(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| b.saturating_sub(t))
}

pub fn divide(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        if t == 0 {
            0
        } else {
            (b * MAX / t).min(MAX)
        }
    })
}

/// Hue from the top, saturation and lightness from the bottom.
pub fn hue(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        let (_, s1, l1) = rgb_to_hsl(b);
        let (h2, _, _) = rgb_to_hsl(t);
        hsl_to_rgb(h2, s1, l1)
    })
}

/// Saturation from the top, hue and lightness from the bottom.
pub fn saturation(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        let (h1, _, l1) = rgb_to_hsl(b);
        let (_, s2, _) = rgb_to_hsl(t);
        hsl_to_rgb(h1, s2, l1)
    })
}

/// Hue and saturation from the top, lightness from the bottom.
pub fn color(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        let (_, _, l1) = rgb_to_hsl(b);
        let (h2, s2, _) = rgb_to_hsl(t);
        hsl_to_rgb(h2, s2, l1)
    })
}

/// Lightness from the top, hue and saturation from the bottom.
pub fn luminosity_mode(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        let (h1, s1, _) = rgb_to_hsl(b);
        let (_, _, l2) = rgb_to_hsl(t);
        hsl_to_rgb(h1, s1, l2)
    })
}

pub fn average(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| (b + t) / 2)
}

pub fn negation(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| MAX - (MAX - b).abs_diff(t))
}

pub fn reflect(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        if t == MAX {
            MAX
        } else {
            (b * b / (MAX - t)).min(MAX)
        }
    })
}

pub fn glow(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        if b == MAX {
            MAX
        } else {
            (t * t / (MAX - b)).min(MAX)
        }
    })
}

/// Keeps or inverts the top color depending on which side of mid-gray the
/// two layers sit.
pub fn contrast_negate(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        let top_lum = (t[0] + t[1] + t[2]) / 3;
        let bottom_lum = (b[0] + b[1] + b[2]) / 3;
        let keep = if top_lum > HALF {
            bottom_lum < HALF
        } else {
            bottom_lum > HALF
        };
        if keep {
            t
        } else {
            t.map(|c| MAX - c)
        }
    })
}

pub fn vivid_light(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, vivid_light_channel)
}

pub fn linear_light(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        clamp_channel(b as i64 + 2 * t as i64 - MAX as i64)
    })
}

pub fn pin_light(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        if t < HALF {
            b.min(2 * t)
        } else {
            b.max(2 * (t - HALF))
        }
    })
}

pub fn darken(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, u64::min)
}

pub fn darker_color(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        if luminosity(b) < luminosity(t) {
            b
        } else {
            t
        }
    })
}

pub fn lighten(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, u64::max)
}

pub fn lighter_color(bottom: Pixel, top: Pixel) -> Pixel {
    blend_with_alpha(bottom, top, |b, t| {
        if luminosity(b) > luminosity(t) {
            b
        } else {
            t
        }
    })
}

/// Vivid light thresholded to pure black or white per channel.
pub fn hard_mix(bottom: Pixel, top: Pixel) -> Pixel {
    channelwise(bottom, top, |b, t| {
        if vivid_light_channel(b, t) >= HALF {
            MAX
        } else {
            0
        }
    })
}

fn hard_light_channel(b: u64, t: u64) -> u64 {
    if t < HALF {
        2 * b * t / MAX
    } else {
        MAX - (2 * (MAX - b) * (MAX - t) / MAX).min(MAX)
    }
}

fn vivid_light_channel(b: u64, t: u64) -> u64 {
    if t < HALF {
        if t == 0 {
            0
        } else {
            clamp_channel(MAX as i64 - ((MAX - b) * HALF / t) as i64)
        }
    } else if t == MAX {
        MAX
    } else {
        (b * HALF / (MAX - t)).min(MAX)
    }
}
