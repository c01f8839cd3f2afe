//! Timing descriptors ("modes").
//!
//! A [`DisplayMode`] carries the logical, monitor-facing timings of one resolution/refresh
//! combination plus the fields filled in while it is validated: the resolved clock, the
//! controller-facing [`CrtcTiming`] and the last [`ModeStatus`].

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::status::ModeStatus;

bitflags! {
    /// Where a mode came from. Several bits may be set at once.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModeType: u32 {
        /// Built into the hardware; timings are trusted verbatim.
        const BUILTIN = 1 << 0;
        /// Built-in mode whose clock must still be resolved.
        const CLOCK_C = (1 << 1) | Self::BUILTIN.bits();
        /// Built-in mode whose CRTC timings must still be derived.
        const CRTC_C = (1 << 2) | Self::BUILTIN.bits();
        const PREFERRED = 1 << 3;
        /// One of the stock default modes.
        const DEFAULT = 1 << 4;
        /// Named by the user.
        const USERDEF = 1 << 5;
        /// Supplied by the driver (e.g. probed from the monitor).
        const DRIVER = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModeFlags: u32 {
        const PHSYNC = 1 << 0;
        const NHSYNC = 1 << 1;
        const PVSYNC = 1 << 2;
        const NVSYNC = 1 << 3;
        const INTERLACE = 1 << 4;
        const DBLSCAN = 1 << 5;
        const CSYNC = 1 << 6;
        const PCSYNC = 1 << 7;
        const NCSYNC = 1 << 8;
        const HSKEW = 1 << 9;
        const BCAST = 1 << 10;
        const PIXMUX = 1 << 12;
        const DBLCLK = 1 << 13;
        /// The resolved clock is an oscillator post-divided by two.
        const CLKDIV2 = 1 << 14;
    }
}

/// Controller-facing timings derived from the logical ones.
///
/// Vertical values include the interlace/doublescan/multiscan expansion; the blanking windows
/// are clamped to what the CRTC registers can express. See [`crate::crtc::set_mode_crtc`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrtcTiming {
    pub h_display: i32,
    pub h_blank_start: i32,
    pub h_sync_start: i32,
    pub h_sync_end: i32,
    pub h_blank_end: i32,
    pub h_total: i32,
    pub h_skew: i32,
    pub v_display: i32,
    pub v_blank_start: i32,
    pub v_sync_start: i32,
    pub v_sync_end: i32,
    pub v_blank_end: i32,
    pub v_total: i32,
    pub h_adjusted: bool,
    pub v_adjusted: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMode {
    pub name: String,
    #[serde(default)]
    pub status: ModeStatus,
    #[serde(default)]
    pub mode_type: ModeType,
    /// Pixel clock in kHz.
    pub clock: i32,
    pub h_display: i32,
    pub h_sync_start: i32,
    pub h_sync_end: i32,
    pub h_total: i32,
    #[serde(default)]
    pub h_skew: i32,
    pub v_display: i32,
    pub v_sync_start: i32,
    pub v_sync_end: i32,
    pub v_total: i32,
    /// Vertical scan repeat count; `0` and `1` both mean "no multiscan".
    #[serde(default)]
    pub v_scan: i32,
    #[serde(default)]
    pub flags: ModeFlags,
    /// Index into the discrete clock table, `None` for programmable clocks.
    #[serde(default)]
    pub clock_index: Option<usize>,
    /// Clock actually produced by the clock generator (kHz).
    #[serde(default)]
    pub synth_clock: i32,
    #[serde(default)]
    pub crtc: CrtcTiming,
    /// Driver-private flags copied from the matching clock range.
    #[serde(default)]
    pub priv_flags: i32,
    /// Explicit horizontal sync rate (kHz). Derived from the timings when unset.
    #[serde(default)]
    pub hsync: Option<f64>,
    /// Explicit vertical refresh rate (Hz). Derived from the timings when unset.
    #[serde(default)]
    pub vrefresh: Option<f64>,
}

impl DisplayMode {
    /// Builds a mode from its clock (kHz) and the `(display, sync_start, sync_end, total)`
    /// quadruples of each axis.
    pub fn new(
        name: impl Into<String>,
        clock: i32,
        horizontal: (i32, i32, i32, i32),
        vertical: (i32, i32, i32, i32),
    ) -> Self {
        Self {
            name: name.into(),
            clock,
            h_display: horizontal.0,
            h_sync_start: horizontal.1,
            h_sync_end: horizontal.2,
            h_total: horizontal.3,
            v_display: vertical.0,
            v_sync_start: vertical.1,
            v_sync_end: vertical.2,
            v_total: vertical.3,
            ..Default::default()
        }
    }

    /// A placeholder carrying only a name, as used for entries of the request list.
    pub fn named(name: impl Into<String>, mode_type: ModeType) -> Self {
        Self {
            name: name.into(),
            mode_type,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, mode_type: ModeType) -> Self {
        self.mode_type = mode_type;
        self
    }

    pub fn with_flags(mut self, flags: ModeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_v_scan(mut self, v_scan: i32) -> Self {
        self.v_scan = v_scan;
        self
    }

    pub fn is_interlaced(&self) -> bool {
        self.flags.contains(ModeFlags::INTERLACE)
    }

    pub fn is_doublescan(&self) -> bool {
        self.flags.contains(ModeFlags::DBLSCAN)
    }

    /// Pixel area of the visible region.
    pub fn area(&self) -> i64 {
        i64::from(self.h_display) * i64::from(self.v_display)
    }

    /// Effective horizontal sync rate in kHz.
    pub fn hsync(&self) -> f64 {
        match self.hsync {
            Some(hsync) if hsync > 0.0 => hsync,
            _ if self.h_total > 0 => f64::from(self.clock) / f64::from(self.h_total),
            _ => 0.0,
        }
    }

    /// Effective vertical refresh rate in Hz.
    pub fn vrefresh(&self) -> f64 {
        if let Some(refresh) = self.vrefresh.filter(|&r| r > 0.0) {
            return refresh;
        }
        if self.h_total <= 0 || self.v_total <= 0 {
            return 0.0;
        }
        let mut refresh =
            f64::from(self.clock) * 1000.0 / f64::from(self.h_total) / f64::from(self.v_total);
        if self.is_interlaced() {
            refresh *= 2.0;
        }
        if self.is_doublescan() {
            refresh /= 2.0;
        }
        if self.v_scan > 1 {
            refresh /= f64::from(self.v_scan);
        }
        refresh
    }

    /// Copies type and timings from `src`. Clock fields are resolved separately.
    pub(crate) fn copy_timings_from(&mut self, src: &DisplayMode) {
        self.mode_type = src.mode_type;
        self.h_display = src.h_display;
        self.h_sync_start = src.h_sync_start;
        self.h_sync_end = src.h_sync_end;
        self.h_total = src.h_total;
        self.h_skew = src.h_skew;
        self.v_display = src.v_display;
        self.v_sync_start = src.v_sync_start;
        self.v_sync_end = src.v_sync_end;
        self.v_total = src.v_total;
        self.v_scan = src.v_scan;
        self.flags = src.flags;
        self.crtc = src.crtc;
        self.hsync = src.hsync;
        self.vrefresh = src.vrefresh;
    }

    /// Label used in log messages ("built-in ", "default ", "driver " or nothing).
    pub(crate) fn type_label(&self) -> &'static str {
        if self.mode_type.contains(ModeType::BUILTIN) {
            "built-in "
        } else if self.mode_type.contains(ModeType::DEFAULT) {
            "default "
        } else if self.mode_type.contains(ModeType::DRIVER) {
            "driver "
        } else {
            ""
        }
    }

    pub fn modeline(&self) -> Modeline<'_> {
        Modeline(self)
    }
}

/// `Display` adapter rendering a mode in modeline syntax.
pub struct Modeline<'a>(&'a DisplayMode);

impl fmt::Display for Modeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "\"{}\"  {:6.2}  {} {} {} {}  {} {} {} {}",
            m.name,
            f64::from(m.clock) / 1000.0,
            m.h_display,
            m.h_sync_start,
            m.h_sync_end,
            m.h_total,
            m.v_display,
            m.v_sync_start,
            m.v_sync_end,
            m.v_total
        )?;
        if m.h_skew != 0 {
            write!(f, " hskew {}", m.h_skew)?;
        }
        if m.v_scan != 0 {
            write!(f, " vscan {}", m.v_scan)?;
        }
        const WORDS: [(ModeFlags, &str); 10] = [
            (ModeFlags::INTERLACE, "interlace"),
            (ModeFlags::CSYNC, "composite"),
            (ModeFlags::DBLSCAN, "doublescan"),
            (ModeFlags::BCAST, "bcast"),
            (ModeFlags::PHSYNC, "+hsync"),
            (ModeFlags::NHSYNC, "-hsync"),
            (ModeFlags::PVSYNC, "+vsync"),
            (ModeFlags::NVSYNC, "-vsync"),
            (ModeFlags::PCSYNC, "+csync"),
            (ModeFlags::NCSYNC, "-csync"),
        ];
        for (flag, word) in WORDS {
            if m.flags.contains(flag) {
                write!(f, " {word}")?;
            }
        }
        Ok(())
    }
}
