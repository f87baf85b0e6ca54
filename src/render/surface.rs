use crate::foundation::error::{KinemaError, KinemaResult};

/// Pixel layout of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGBA, premultiplied alpha.
    Rgba8Premul,
}

/// Size and format of one render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl SurfaceDesc {
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8Premul,
        }
    }

    pub fn byte_len(self) -> usize {
        let px = (self.width as usize).saturating_mul(self.height as usize);
        match self.format {
            PixelFormat::Rgba8Premul => px.saturating_mul(4),
        }
    }
}

/// One CPU render target. Bytes are premultiplied RGBA8, row-major.
pub struct Surface {
    desc: SurfaceDesc,
    pixmap: vello_cpu::Pixmap,
}

impl Surface {
    pub(crate) fn from_pixmap(desc: SurfaceDesc, pixmap: vello_cpu::Pixmap) -> Self {
        Self { desc, pixmap }
    }

    pub(crate) fn into_parts(self) -> (SurfaceDesc, vello_cpu::Pixmap) {
        (self.desc, self.pixmap)
    }

    pub fn desc(&self) -> SurfaceDesc {
        self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut vello_cpu::Pixmap {
        &mut self.pixmap
    }

    /// Fills with one premultiplied RGBA8 color.
    pub fn clear(&mut self, rgba_premul: [u8; 4]) {
        for px in self.data_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba_premul);
        }
    }

    pub fn clear_transparent(&mut self) {
        self.data_mut().fill(0);
    }

    pub fn to_frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.desc.width,
            height: self.desc.height,
            data: self.data().to_vec(),
            premultiplied: true,
        }
    }
}

/// A rendered frame as RGBA8 pixels.
///
/// Frames are premultiplied alpha by default; the flag makes this explicit
/// at API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha copy of the pixel data, e.g. for PNG export.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        if !self.premultiplied {
            return self.data.clone();
        }
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = u32::from(px[3]);
            if a == 0 {
                px[0] = 0;
                px[1] = 0;
                px[2] = 0;
                continue;
            }
            for c in 0..3 {
                let v = (u32::from(px[c]) * 255 + a / 2) / a;
                px[c] = v.min(255) as u8;
            }
        }
        out
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> KinemaResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| KinemaError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| KinemaError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(KinemaError::render("pixmap byte len mismatch"));
    }
    // Pixmap stores PremulRgba8; our bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}
