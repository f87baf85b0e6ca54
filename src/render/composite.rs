//! Premultiplied-alpha compositing over raw RGBA8 buffers.

use crate::foundation::error::{KinemaError, KinemaResult};

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

pub(crate) fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

pub(crate) fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> KinemaResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(KinemaError::render(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = s[3] as u16;
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = add_sat_u8(sa as u8, mul_div255_u8(d[3] as u16, inv));
        for c in 0..3 {
            let dc = mul_div255_u8(d[c] as u16, inv);
            d[c] = add_sat_u8(s[c], dc);
        }
    }
    Ok(())
}

/// Src-over with the source scaled by `opacity` first.
pub(crate) fn premul_over_in_place_opacity(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
) -> KinemaResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(KinemaError::render(
            "premul_over_in_place_opacity expects equal-length rgba8 buffers",
        ));
    }
    let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    if op == 0 {
        return Ok(());
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255_u8(u16::from(s[3]), op);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - u16::from(sa);

        d[3] = add_sat_u8(sa, mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let sc = mul_div255_u8(u16::from(s[c]), op);
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = add_sat_u8(sc, dc);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_source_replaces_destination() {
        let mut dst = vec![10, 20, 30, 255];
        let src = vec![200, 100, 50, 255];
        premul_over_in_place(&mut dst, &src).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn transparent_source_leaves_destination_untouched() {
        let mut dst = vec![10, 20, 30, 255];
        premul_over_in_place(&mut dst, &[0, 0, 0, 0]).unwrap();
        assert_eq!(dst, [10, 20, 30, 255]);
    }

    #[test]
    fn half_opacity_halves_the_contribution() {
        let mut dst = vec![0, 0, 0, 0];
        premul_over_in_place_opacity(&mut dst, &[200, 100, 50, 255], 0.5).unwrap();
        // round(c * 128 / 255) per channel.
        assert_eq!(dst, [100, 50, 25, 128]);
    }

    #[test]
    fn zero_opacity_is_a_no_op() {
        let mut dst = vec![10, 20, 30, 40];
        premul_over_in_place_opacity(&mut dst, &[255, 255, 255, 255], 0.0).unwrap();
        assert_eq!(dst, [10, 20, 30, 40]);
    }

    #[test]
    fn mismatched_buffers_error() {
        let mut dst = vec![0; 8];
        assert!(premul_over_in_place(&mut dst, &[0; 4]).is_err());
        assert!(premul_over_in_place_opacity(&mut dst, &[0; 4], 1.0).is_err());
    }
}
