use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of validating a single mode.
///
/// `Ok` is the only accepting value. Everything else is a per-mode rejection reason, except
/// [`ModeStatus::Error`], which signals caller misuse and aborts a validation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeStatus {
    #[default]
    Ok,
    HSync,
    VSync,
    HIllegal,
    VIllegal,
    BadWidth,
    NoMode,
    NoInterlace,
    NoDblescan,
    NoVscan,
    Mem,
    VirtualX,
    VirtualY,
    MemVirt,
    NoClock,
    ClockHigh,
    ClockLow,
    ClockRange,
    BadHValue,
    BadVValue,
    BadVScan,
    HSyncNarrow,
    HSyncWide,
    HBlankNarrow,
    HBlankWide,
    VSyncNarrow,
    VSyncWide,
    VBlankNarrow,
    VBlankWide,
    Panel,
    InterlaceWidth,
    OneWidth,
    OneHeight,
    OneSize,
    NoReduced,
    Bad,
    Error,
}

impl ModeStatus {
    pub fn is_ok(self) -> bool {
        self == ModeStatus::Ok
    }

    /// Human-readable reason, as printed in rejection messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ModeStatus::Ok => "Mode OK",
            ModeStatus::HSync => "hsync out of range",
            ModeStatus::VSync => "vrefresh out of range",
            ModeStatus::HIllegal => "illegal horizontal timings",
            ModeStatus::VIllegal => "illegal vertical timings",
            ModeStatus::BadWidth => "width requires unsupported line pitch",
            ModeStatus::NoMode => "no mode of this name",
            ModeStatus::NoInterlace => "interlace mode not supported",
            ModeStatus::NoDblescan => "doublescan mode not supported",
            ModeStatus::NoVscan => "multiscan mode not supported",
            ModeStatus::Mem => "insufficient memory for mode",
            ModeStatus::VirtualX => "width too large for virtual size",
            ModeStatus::VirtualY => "height too large for virtual size",
            ModeStatus::MemVirt => "insufficient memory given virtual size",
            ModeStatus::NoClock => "no clock available for mode",
            ModeStatus::ClockHigh => "mode clock too high",
            ModeStatus::ClockLow => "mode clock too low",
            ModeStatus::ClockRange => "bad mode clock/interlace/doublescan",
            ModeStatus::BadHValue => "horizontal timing out of range",
            ModeStatus::BadVValue => "vertical timing out of range",
            ModeStatus::BadVScan => "VScan value out of range",
            ModeStatus::HSyncNarrow => "horizontal sync too narrow",
            ModeStatus::HSyncWide => "horizontal sync too wide",
            ModeStatus::HBlankNarrow => "horizontal blanking too narrow",
            ModeStatus::HBlankWide => "horizontal blanking too wide",
            ModeStatus::VSyncNarrow => "vertical sync too narrow",
            ModeStatus::VSyncWide => "vertical sync too wide",
            ModeStatus::VBlankNarrow => "vertical blanking too narrow",
            ModeStatus::VBlankWide => "vertical blanking too wide",
            ModeStatus::Panel => "exceeds panel dimensions",
            ModeStatus::InterlaceWidth => "width too large for interlaced mode",
            ModeStatus::OneWidth => "all modes must have the same width",
            ModeStatus::OneHeight => "all modes must have the same height",
            ModeStatus::OneSize => "all modes must have the same resolution",
            ModeStatus::NoReduced => "monitor doesn't support reduced blanking",
            ModeStatus::Bad => "unknown reason",
            ModeStatus::Error => "internal error",
        }
    }
}

impl fmt::Display for ModeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
