//! Framebuffer memory layout: pixel format, video memory fit and line pitch computation.

use serde::{Deserialize, Serialize};

/// Unit (in bits) used for the video memory comparison. Must be a power of two.
const BITMAP_SCANLINE_PAD: u64 = 32;

/// Pixel format of the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FbFormat {
    pub depth: u32,
    pub bits_per_pixel: u32,
    /// Scanlines are padded to a multiple of this many bits.
    pub scanline_pad: u32,
}

impl Default for FbFormat {
    fn default() -> Self {
        Self {
            depth: 24,
            bits_per_pixel: 32,
            scanline_pad: 32,
        }
    }
}

impl FbFormat {
    /// Effective scanline padding; 4-bit planar formats pad each of the four planes.
    fn effective_pad(&self) -> u64 {
        let pad = u64::from(self.scanline_pad.max(1));
        if self.depth == 4 {
            pad * 4
        } else {
            pad
        }
    }
}

/// Whether a framebuffer with line width `w` holding `y` lines, of which the last is `x`
/// pixels wide, fits in `video_ram_kb` kilobytes.
pub fn check_mode_size(format: &FbFormat, video_ram_kb: u64, w: i32, x: i32, y: i32) -> bool {
    if w < 0 || x < 0 || y <= 0 {
        return false;
    }
    let (w, x, y) = (w as u64, x as u64, y as u64);
    let bpp = u64::from(format.bits_per_pixel);
    let pad = format.effective_pad();

    let line_bits = (w * bpp).div_ceil(pad) * pad;
    let last_bits = x * bpp;

    let line_units = line_bits.div_ceil(BITMAP_SCANLINE_PAD);
    let last_units = last_bits.div_ceil(BITMAP_SCANLINE_PAD);
    line_units * (y - 1) + last_units <= video_ram_kb * (1024 * 8 / BITMAP_SCANLINE_PAD)
}

/// Inputs of a line pitch computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchRequest {
    /// Virtual width in pixels.
    pub x: i32,
    /// Virtual height in lines.
    pub y: i32,
    /// Smallest acceptable pitch, in pixels.
    pub min_width: i32,
    /// Size of the CPU-visible aperture in bytes.
    pub aperture: u64,
    /// Pitch granularity in pixels.
    pub pitch_inc: i32,
}

/// Computes the line pitch (in pixels) a controller uses for a given virtual size.
///
/// Returns `None` if no pitch works for the request.
pub trait ScanlineWidth {
    fn scanline_width(&self, format: &FbFormat, req: PitchRequest) -> Option<i32>;
}

impl<F> ScanlineWidth for F
where
    F: Fn(&FbFormat, PitchRequest) -> Option<i32>,
{
    fn scanline_width(&self, format: &FbFormat, req: PitchRequest) -> Option<i32> {
        self(format, req)
    }
}

/// Pitch computation for linear framebuffers, optionally accessed through a banked aperture.
///
/// The pitch is the requested width rounded up to the pitch granularity. When the aperture is
/// not a multiple of the scanline padding unit, the pitch is widened until whole scanlines tile
/// the aperture, falling back to the padding unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackedScanlineWidth;

impl ScanlineWidth for PackedScanlineWidth {
    fn scanline_width(&self, format: &FbFormat, req: PitchRequest) -> Option<i32> {
        if req.pitch_inc <= 0 || format.bits_per_pixel == 0 {
            return None;
        }
        let bpp = u64::from(format.bits_per_pixel);
        let bank_bits = req.aperture.checked_mul(8)?;
        let unit = u64::from(req.pitch_inc.unsigned_abs()) * bpp;
        if unit > bank_bits {
            return None;
        }
        let pad_unit = lcm(unit, u64::from(format.scanline_pad.max(1)));
        if pad_unit > bank_bits {
            return None;
        }

        let width = u64::from(req.x.max(req.min_width).max(0).unsigned_abs());
        let mut line_bits = (width * bpp).div_ceil(unit) * unit;
        if req.x == 0 || bank_bits % pad_unit == 0 {
            return i32::try_from(line_bits / bpp).ok();
        }

        while line_bits <= bank_bits {
            if bank_bits % line_bits == 0 {
                return i32::try_from(line_bits / bpp).ok();
            }
            line_bits += unit;
        }
        line_bits = (width * bpp).div_ceil(pad_unit) * pad_unit;
        i32::try_from(line_bits / bpp).ok()
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}
