//! Texture loader: converts tightly packed pixel data of any supported layout to RGBA8, optionally
//! builds a box-filtered mip chain, and registers the GPU texture under a 1-based handle.

use render_api::{TextureDesc, TextureFormat, TextureId};

use crate::device::Device;
use crate::error::{EmberError, EmberResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Components {
    R,
    Rg,
    Rgb,
    Rgba,
}

impl Components {
    pub fn count(self) -> usize {
        match self {
            Components::R => 1,
            Components::Rg => 2,
            Components::Rgb => 3,
            Components::Rgba => 4,
        }
    }
}

/// Element type of the source pixels, read native-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 | ElementType::S8 => 1,
            ElementType::U16 | ElementType::S16 => 2,
            ElementType::U32 | ElementType::S32 | ElementType::F32 => 4,
            ElementType::U64 | ElementType::S64 | ElementType::F64 => 8,
        }
    }

    /// Converts one element (exactly `size()` bytes) to an 8-bit channel.
    fn to_u8(self, b: &[u8]) -> u8 {
        match self {
            ElementType::U8 => b[0],
            ElementType::U16 => (u16::from_ne_bytes([b[0], b[1]]) >> 8) as u8,
            ElementType::U32 => (u32::from_ne_bytes([b[0], b[1], b[2], b[3]]) >> 24) as u8,
            ElementType::U64 => (u64::from_ne_bytes(array8(b)) >> 56) as u8,
            ElementType::S8 => ((b[0] as i8 as i16) + 0x80) as u8,
            ElementType::S16 => (((i16::from_ne_bytes([b[0], b[1]]) as i32) + 0x8000) >> 8) as u8,
            ElementType::S32 => {
                (((i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as i64) + 0x8000_0000) >> 24) as u8
            }
            ElementType::S64 => (((i64::from_ne_bytes(array8(b)) as i128) + (1i128 << 63)) >> 56) as u8,
            ElementType::F32 => unit_to_u8(f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64),
            ElementType::F64 => unit_to_u8(f64::from_ne_bytes(array8(b))),
        }
    }
}

fn array8(b: &[u8]) -> [u8; 8] {
    [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]
}

fn unit_to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Layout of caller-supplied pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    pub components: Components,
    pub element: ElementType,
}

impl PixelFormat {
    pub const RGBA8: PixelFormat = PixelFormat { components: Components::Rgba, element: ElementType::U8 };

    pub fn new(components: Components, element: ElementType) -> Self {
        Self { components, element }
    }

    pub fn bytes_per_pixel(self) -> usize {
        self.components.count() * self.element.size()
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const GENERATE_MIPS = 1 << 0;
    }
}

/// Converts `width * height` pixels to RGBA8. Missing green/blue become 0, missing alpha 255.
pub fn convert_to_rgba8(width: u32, height: u32, data: &[u8], format: PixelFormat) -> EmberResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(EmberError::EmptyTexture { width, height });
    }
    let bpp = format.bytes_per_pixel();
    let too_large = EmberError::TextureTooLarge { width, height };
    let pixels = (width as usize).checked_mul(height as usize).ok_or(too_large.clone())?;
    let expected = pixels.checked_mul(bpp).ok_or(too_large.clone())?;
    let out_len = pixels.checked_mul(4).ok_or(too_large)?;
    if data.len() < expected {
        return Err(EmberError::ShortPixelData { expected, got: data.len() });
    }
    let size = format.element.size();
    let channels = format.components.count();
    let mut out = Vec::with_capacity(out_len);
    for px in data[..expected].chunks_exact(bpp) {
        let mut rgba = [0, 0, 0, 255];
        for (c, elem) in px.chunks_exact(size).take(channels).enumerate() {
            rgba[c] = format.element.to_u8(elem);
        }
        out.extend_from_slice(&rgba);
    }
    Ok(out)
}

/// Mip levels below `base` (RGBA8), each a 2x2 box filter of the previous, down to 1x1.
/// Odd edges clamp to the last row/column. Returns every level including `base`.
pub fn build_mip_chain(width: u32, height: u32, base: Vec<u8>) -> Vec<Vec<u8>> {
    let mut levels = vec![base];
    let (mut w, mut h) = (width as usize, height as usize);
    while w > 1 || h > 1 {
        let (nw, nh) = ((w / 2).max(1), (h / 2).max(1));
        let src = &levels[levels.len() - 1];
        let mut dst = vec![0u8; nw * nh * 4];
        for y in 0..nh {
            let (y0, y1) = ((2 * y).min(h - 1), (2 * y + 1).min(h - 1));
            for x in 0..nw {
                let (x0, x1) = ((2 * x).min(w - 1), (2 * x + 1).min(w - 1));
                for c in 0..4 {
                    let sum = src[(y0 * w + x0) * 4 + c] as u32
                        + src[(y0 * w + x1) * 4 + c] as u32
                        + src[(y1 * w + x0) * 4 + c] as u32
                        + src[(y1 * w + x1) * 4 + c] as u32;
                    dst[(y * nw + x) * 4 + c] = ((sum + 2) / 4) as u8;
                }
            }
        }
        levels.push(dst);
        w = nw;
        h = nh;
    }
    levels
}

/// Texture table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureEntry {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

/// Texture handles bound for the next geometry draw (0 = default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialBindings {
    pub diffuse: u32,
    pub normal: u32,
    pub material: u32,
}

impl Device {
    pub(crate) fn create_texture_2d(
        &mut self,
        width: u32,
        height: u32,
        data: &[u8],
        format: PixelFormat,
        flags: TextureFlags,
    ) -> EmberResult<u32> {
        let rgba = convert_to_rgba8(width, height, data, format)?;
        let levels = if flags.contains(TextureFlags::GENERATE_MIPS) {
            build_mip_chain(width, height, rgba)
        } else {
            vec![rgba]
        };
        let desc = TextureDesc { label: "user_texture", width, height, format: TextureFormat::Rgba8Unorm };
        let id = self.gpu.create_texture(&desc, &levels)?;
        self.textures.push(TextureEntry { id, width, height });
        log::debug!("texture {} created ({width}x{height}, {} levels)", self.textures.len(), levels.len());
        Ok(self.textures.len() as u32)
    }

    /// Validates a handle for binding: 0 or an existing entry.
    pub(crate) fn check_texture(&self, handle: u32) -> EmberResult<u32> {
        if handle == 0 || (handle as usize) <= self.textures.len() {
            Ok(handle)
        } else {
            Err(EmberError::InvalidTexture(handle))
        }
    }

    /// GPU texture for `handle`, or `default` for 0 / unknown handles.
    pub(crate) fn texture_or(&self, handle: u32, default: TextureId) -> TextureId {
        handle
            .checked_sub(1)
            .and_then(|i| self.textures.get(i as usize))
            .map_or(default, |t| t.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(format: PixelFormat, data: &[u8]) -> Vec<u8> {
        convert_to_rgba8(1, 1, data, format).unwrap()
    }

    #[test]
    fn unsigned_takes_most_significant_byte() {
        let f = |e| PixelFormat::new(Components::R, e);
        assert_eq!(convert(f(ElementType::U8), &[200]), vec![200, 0, 0, 255]);
        assert_eq!(convert(f(ElementType::U16), &0xABCDu16.to_ne_bytes()), vec![0xAB, 0, 0, 255]);
        assert_eq!(convert(f(ElementType::U32), &0x12345678u32.to_ne_bytes()), vec![0x12, 0, 0, 255]);
        assert_eq!(convert(f(ElementType::U64), &u64::MAX.to_ne_bytes()), vec![255, 0, 0, 255]);
    }

    #[test]
    fn signed_is_offset_by_midpoint() {
        let f = |e| PixelFormat::new(Components::R, e);
        assert_eq!(convert(f(ElementType::S8), &(-128i8).to_ne_bytes())[0], 0);
        assert_eq!(convert(f(ElementType::S8), &0i8.to_ne_bytes())[0], 128);
        assert_eq!(convert(f(ElementType::S8), &127i8.to_ne_bytes())[0], 255);
        assert_eq!(convert(f(ElementType::S16), &i16::MIN.to_ne_bytes())[0], 0);
        assert_eq!(convert(f(ElementType::S16), &0i16.to_ne_bytes())[0], 128);
        assert_eq!(convert(f(ElementType::S32), &i32::MAX.to_ne_bytes())[0], 255);
        assert_eq!(convert(f(ElementType::S64), &0i64.to_ne_bytes())[0], 128);
        assert_eq!(convert(f(ElementType::S64), &i64::MIN.to_ne_bytes())[0], 0);
    }

    #[test]
    fn floats_clamp_and_scale() {
        let f = PixelFormat::new(Components::Rgb, ElementType::F32);
        let data: Vec<u8> = [-1.0f32, 0.5, 2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(convert(f, &data), vec![0, 127, 255, 255]);
        let f = PixelFormat::new(Components::Rg, ElementType::F64);
        let data: Vec<u8> = [1.0f64, 0.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(convert(f, &data), vec![255, 0, 0, 255]);
    }

    #[test]
    fn rgba_passes_through() {
        assert_eq!(convert(PixelFormat::RGBA8, &[1, 2, 3, 4]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn zero_extent_and_short_data_are_rejected() {
        assert_eq!(
            convert_to_rgba8(0, 10, &[0; 40], PixelFormat::RGBA8),
            Err(EmberError::EmptyTexture { width: 0, height: 10 })
        );
        assert_eq!(
            convert_to_rgba8(2, 2, &[0; 15], PixelFormat::RGBA8),
            Err(EmberError::ShortPixelData { expected: 16, got: 15 })
        );
    }

    #[test]
    fn oversized_extent_is_rejected_without_overflow() {
        assert_eq!(
            convert_to_rgba8(u32::MAX, u32::MAX, &[0; 16], PixelFormat::RGBA8),
            Err(EmberError::TextureTooLarge { width: u32::MAX, height: u32::MAX })
        );
    }

    #[test]
    fn mip_chain_halves_to_one_pixel() {
        let base = vec![0u8; 5 * 3 * 4];
        let levels = build_mip_chain(5, 3, base);
        let sizes: Vec<usize> = levels.iter().map(|l| l.len() / 4).collect();
        // 5x3 -> 2x1 -> 1x1
        assert_eq!(sizes, vec![15, 2, 1]);
    }

    #[test]
    fn mip_is_box_average() {
        let base: Vec<u8> = [0u8, 100, 200, 40].iter().flat_map(|&v| [v, v, v, 255]).collect();
        let levels = build_mip_chain(2, 2, base);
        assert_eq!(levels[1], vec![85, 85, 85, 255]);
    }
}
