//! Monitor compliance profiles and the per-mode legality/compliance check.

use serde::{Deserialize, Serialize};

use crate::mode::{DisplayMode, ModeType};
use crate::status::ModeStatus;

/// Relative slack applied to both ends of every sync range.
pub const SYNC_TOLERANCE: f64 = 0.01;

/// Default horizontal sync range (kHz) installed when a monitor declares none.
pub const DEFAULT_HSYNC: SyncRange = SyncRange { lo: 31.5, hi: 37.9 };
/// Default vertical refresh range (Hz) installed when a monitor declares none.
pub const DEFAULT_VREFRESH: SyncRange = SyncRange { lo: 50.0, hi: 70.0 };

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncRange {
    pub lo: f64,
    pub hi: f64,
}

impl SyncRange {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Whether `value` lies inside the range widened by [`SYNC_TOLERANCE`].
    pub fn contains_with_tolerance(&self, value: f64) -> bool {
        value > self.lo * (1.0 - SYNC_TOLERANCE) && value < self.hi * (1.0 + SYNC_TOLERANCE)
    }
}

/// Who may use reduced-blanking timings on a monitor that does not advertise support.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReducedBlankingPolicy {
    /// Driver-supplied modes bypass the reduced-blanking rejection, and the autofill blanking
    /// ratio filter only applies to default modes.
    #[default]
    ExemptDriverModes,
    /// No exemptions.
    Strict,
}

/// A monitor's declared sync/refresh windows.
///
/// Empty range lists mean "no constraint on that axis".
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    /// Horizontal sync ranges (kHz).
    #[serde(default)]
    pub hsync: Vec<SyncRange>,
    /// Vertical refresh ranges (Hz).
    #[serde(default)]
    pub vrefresh: Vec<SyncRange>,
    /// Maximum pixel clock (kHz), if any.
    #[serde(default)]
    pub max_pix_clock: Option<i32>,
    /// Physical size in millimetres, used to infer the virtual size.
    #[serde(default)]
    pub width_mm: i32,
    #[serde(default)]
    pub height_mm: i32,
    #[serde(default)]
    pub reduced_blanking: bool,
    #[serde(default)]
    pub reduced_blanking_policy: ReducedBlankingPolicy,
}

impl Monitor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Installs [`DEFAULT_HSYNC`] / [`DEFAULT_VREFRESH`] on axes without ranges and logs the
    /// ranges in effect.
    pub fn install_default_ranges(&mut self) {
        let hsync_default = self.hsync.is_empty();
        if hsync_default {
            self.hsync.push(DEFAULT_HSYNC);
        }
        let vrefresh_default = self.vrefresh.is_empty();
        if vrefresh_default {
            self.vrefresh.push(DEFAULT_VREFRESH);
        }
        self.log_ranges(hsync_default, vrefresh_default);
    }

    fn log_ranges(&self, hsync_default: bool, vrefresh_default: bool) {
        let kind = |default: bool| if default { "default " } else { "" };
        for range in &self.hsync {
            if range.lo == range.hi {
                tracing::info!(
                    "{}: Using {}hsync value of {:.2} kHz",
                    self.id,
                    kind(hsync_default),
                    range.lo
                );
            } else {
                tracing::info!(
                    "{}: Using {}hsync range of {:.2}-{:.2} kHz",
                    self.id,
                    kind(hsync_default),
                    range.lo,
                    range.hi
                );
            }
        }
        for range in &self.vrefresh {
            if range.lo == range.hi {
                tracing::info!(
                    "{}: Using {}vrefresh value of {:.2} Hz",
                    self.id,
                    kind(vrefresh_default),
                    range.lo
                );
            } else {
                tracing::info!(
                    "{}: Using {}vrefresh range of {:.2}-{:.2} Hz",
                    self.id,
                    kind(vrefresh_default),
                    range.lo,
                    range.hi
                );
            }
        }
    }
}

/// Display <= sync start < sync end < total on both axes, with a positive display size.
///
/// A sync pulse may start right at the end of the active region.
pub fn check_mode_geometry(mode: &DisplayMode) -> ModeStatus {
    if mode.h_display <= 0
        || mode.h_display > mode.h_sync_start
        || mode.h_sync_start >= mode.h_sync_end
        || mode.h_sync_end >= mode.h_total
    {
        return ModeStatus::HIllegal;
    }
    if mode.v_display <= 0
        || mode.v_display > mode.v_sync_start
        || mode.v_sync_start >= mode.v_sync_end
        || mode.v_sync_end >= mode.v_total
    {
        return ModeStatus::VIllegal;
    }
    ModeStatus::Ok
}

/// The timing signature produced by CVT reduced-blanking formulas.
fn is_cvt_reduced_blanking(mode: &DisplayMode) -> bool {
    // Blanking narrower than a quarter of the active width, rounded to a character cell.
    let lowish = ((i64::from(mode.h_display) * 5 / 4) & !0x07) > i64::from(mode.h_total);
    lowish
        && mode.h_total - mode.h_display == 160
        && mode.h_sync_end - mode.h_display == 80
        && mode.h_sync_end - mode.h_sync_start == 32
        && mode.v_sync_start - mode.v_display == 3
}

/// Checks `mode` against its own legality rules and `monitor`'s declared limits.
///
/// Interlaced modes get an odd vertical total as a side effect.
pub fn check_mode_for_monitor(mode: &mut DisplayMode, monitor: &Monitor) -> ModeStatus {
    let status = check_mode_geometry(mode);
    if !status.is_ok() {
        return status;
    }

    if !monitor.hsync.is_empty() {
        let hsync = mode.hsync();
        if !monitor.hsync.iter().any(|r| r.contains_with_tolerance(hsync)) {
            return ModeStatus::HSync;
        }
    }

    if !monitor.vrefresh.is_empty() {
        let vrefresh = mode.vrefresh();
        if !monitor
            .vrefresh
            .iter()
            .any(|r| r.contains_with_tolerance(vrefresh))
        {
            return ModeStatus::VSync;
        }
    }

    if mode.is_interlaced() {
        mode.v_total |= 1;
        mode.crtc.v_total = mode.v_total;
    }

    if is_cvt_reduced_blanking(mode) && !monitor.reduced_blanking {
        let exempt = monitor.reduced_blanking_policy == ReducedBlankingPolicy::ExemptDriverModes
            && mode.mode_type.contains(ModeType::DRIVER);
        if !exempt {
            return ModeStatus::NoReduced;
        }
    }

    if let Some(max) = monitor.max_pix_clock.filter(|&max| max > 0) {
        if mode.clock > max {
            return ModeStatus::ClockHigh;
        }
    }

    ModeStatus::Ok
}
