//! Raster effect passes over premultiplied RGBA8 buffers.
//!
//! All passes run on full surfaces in layer-local device pixels; the renderer
//! maps animated parameters (blur radius, radial center) into pixel space
//! before calling in here.

use crate::{
    foundation::error::{KinemaError, KinemaResult},
    scene::effect::{AntialiasQuality, BlurDimensions, RadialBlurMode},
};

/// How taps past the surface edge read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeMode {
    /// Repeat the boundary pixel (`repeat_edge_pixels` on).
    Clamp,
    /// Treat the outside as transparent black; edges fade out.
    Transparent,
}

pub(crate) fn default_blur_sigma(radius: u32) -> f32 {
    // Gaussian radius/sigma heuristic that keeps blur visually stable for small radii.
    let r = radius as f32;
    (r / 3.0).max(0.1)
}

/// Normalized gaussian weights in Q16 fixed point. The weights sum to exactly
/// 65536 so a constant region stays byte-identical under the blur.
pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f32) -> KinemaResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(KinemaError::validation("blur sigma must be finite and > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = sigma as f64;
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = i as f64;
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(KinemaError::render("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let target: i64 = 65536;
    let delta = target - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        let new_mid = (mid_val + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

/// Separable gaussian blur. `tmp` is scratch for the two-pass case and is
/// resized as needed; callers keep it across frames to stay allocation-free
/// after warmup.
pub(crate) fn blur_rgba8_premul_q16(
    src: &[u8],
    dst: &mut [u8],
    tmp: &mut Vec<u8>,
    width: u32,
    height: u32,
    kernel_q16: &[u32],
    dimensions: BlurDimensions,
    edge: EdgeMode,
) {
    if kernel_q16.len() == 1 {
        dst.copy_from_slice(src);
        return;
    }

    match dimensions {
        BlurDimensions::All => {
            tmp.resize(src.len(), 0);
            horizontal_blur_q16(src, tmp, width, height, kernel_q16, edge);
            vertical_blur_q16(tmp, dst, width, height, kernel_q16, edge);
        }
        BlurDimensions::Horizontal => {
            horizontal_blur_q16(src, dst, width, height, kernel_q16, edge)
        }
        BlurDimensions::Vertical => vertical_blur_q16(src, dst, width, height, kernel_q16, edge),
    }
}

fn horizontal_blur_q16(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    k: &[u32],
    edge: EdgeMode,
) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dx = ki as i32 - radius;
                let sx = match edge {
                    EdgeMode::Clamp => (x + dx).clamp(0, w - 1),
                    EdgeMode::Transparent => {
                        let sx = x + dx;
                        if sx < 0 || sx >= w {
                            continue;
                        }
                        sx
                    }
                };
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_blur_q16(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    k: &[u32],
    edge: EdgeMode,
) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dy = ki as i32 - radius;
                let sy = match edge {
                    EdgeMode::Clamp => (y + dy).clamp(0, h - 1),
                    EdgeMode::Transparent => {
                        let sy = y + dy;
                        if sy < 0 || sy >= h {
                            continue;
                        }
                        sy
                    }
                };
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}

/// N-tap directional blur around `center` (surface pixels). Spin rotates
/// sample positions through an arc scaled by `amount` (degrees, capped at
/// 180); zoom pulls samples toward the center by up to `amount` percent.
pub(crate) fn radial_blur_rgba8_premul(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    amount: f32,
    center: (f32, f32),
    mode: RadialBlurMode,
    quality: AntialiasQuality,
) {
    let taps = match quality {
        AntialiasQuality::Low => 8,
        AntialiasQuality::High => 16,
    };
    let w = width as i32;
    let h = height as i32;
    let (cx, cy) = center;

    for y in 0..h {
        for x in 0..w {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let mut acc = [0.0f32; 4];

            for i in 0..taps {
                let u = (i as f32 + 0.5) / taps as f32;
                let (sx, sy) = match mode {
                    RadialBlurMode::Spin => {
                        let arc = amount.abs().min(180.0).to_radians();
                        let angle = (u - 0.5) * arc;
                        let (sin, cos) = angle.sin_cos();
                        let dx = px - cx;
                        let dy = py - cy;
                        (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
                    }
                    RadialBlurMode::Zoom => {
                        let spread = amount.abs().min(100.0) / 100.0;
                        let s = 1.0 - spread * u;
                        (cx + (px - cx) * s, cy + (py - cy) * s)
                    }
                };
                let mut tap = [0.0f32; 4];
                sample_bilinear_clamped(src, w, h, sx, sy, &mut tap);
                for c in 0..4 {
                    acc[c] += tap[c];
                }
            }

            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = (acc[c] / taps as f32).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn sample_bilinear_clamped(src: &[u8], w: i32, h: i32, x: f32, y: f32, out: &mut [f32; 4]) {
    // Texel centers sit at integer + 0.5.
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let x0 = x0 as i32;
    let y0 = y0 as i32;
    let xa = x0.clamp(0, w - 1);
    let xb = (x0 + 1).clamp(0, w - 1);
    let ya = y0.clamp(0, h - 1);
    let yb = (y0 + 1).clamp(0, h - 1);

    let at = |xx: i32, yy: i32, c: usize| src[((yy * w + xx) as usize) * 4 + c] as f32;
    for c in 0..4 {
        let top = at(xa, ya, c) * (1.0 - tx) + at(xb, ya, c) * tx;
        let bot = at(xa, yb, c) * (1.0 - tx) + at(xb, yb, c) * tx;
        out[c] = top * (1.0 - ty) + bot * ty;
    }
}

/// In-place brightness/contrast on straight color, round-tripped through
/// unpremultiply. Both parameters are neutral at 0 and clamp to [-1, 1].
pub(crate) fn brightness_contrast_rgba8_premul(bytes: &mut [u8], brightness: f32, contrast: f32) {
    let brightness = brightness.clamp(-1.0, 1.0);
    let contrast = contrast.clamp(-1.0, 1.0);
    let gain = 1.0 + contrast;

    for px in bytes.chunks_exact_mut(4) {
        let a = px[3] as f32 / 255.0;
        if a <= 0.0 {
            continue;
        }
        for c in 0..3 {
            let straight = (px[c] as f32 / 255.0) / a;
            let adjusted = ((straight - 0.5) * gain + 0.5 + brightness).clamp(0.0, 1.0);
            px[c] = (adjusted * a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}
