//! Long-lived controller configuration and the state a validation run leaves behind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::{ClockRange, ClockSource};
use crate::crtc::{set_mode_crtc, AdjustFlags};
use crate::framebuffer::{FbFormat, PackedScanlineWidth, PitchRequest, ScanlineWidth};
use crate::lookup::Lookup;
use crate::mode::ModeType;
use crate::modelist::ModeList;
use crate::monitor::Monitor;
use crate::pool::ModePool;

/// Default horizontal increment (pixels) virtual widths are rounded up to.
pub const DEFAULT_X_INC: i32 = 8;

/// Negotiated framebuffer geometry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub virtual_x: i32,
    pub virtual_y: i32,
    /// Line pitch in pixels.
    pub display_width: i32,
}

/// Where the virtual size came from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualFrom {
    /// Derived from the accepted modes (or estimated from the monitor).
    #[default]
    Negotiated,
    /// Given explicitly by the caller.
    Config,
}

/// A clock range kept for runtime checks, together with the lookup modifiers of the run that
/// stored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredClockRange {
    pub range: ClockRange,
    pub lookup: Lookup,
}

/// One video controller output.
///
/// The configuration fields are set up once. A validation run then:
/// - builds the mode pool on first use and keeps it (per-run markers and statuses are reset),
/// - rebuilds [`Screen::modes`] from scratch,
/// - overwrites [`Screen::geometry`],
/// - replaces the stored clock ranges used by [`Screen::check_mode_for_driver`],
/// - installs default monitor ranges in place when the monitor has none.
pub struct Screen {
    pub name: String,
    pub clock_source: ClockSource,
    pub monitor: Monitor,
    pub fb_format: FbFormat,
    /// Video memory in kB.
    pub video_ram_kb: u64,
    /// Largest horizontal total the CRTC can program; 0 for no limit.
    pub max_h_value: i32,
    /// Largest vertical total the CRTC can program; 0 for no limit.
    pub max_v_value: i32,
    /// Virtual widths are rounded up to a multiple of this; non-positive means
    /// [`DEFAULT_X_INC`].
    pub x_inc: i32,
    pub scanline: Box<dyn ScanlineWidth>,

    pub modes: ModeList,
    pub geometry: Geometry,
    pub virtual_from: VirtualFrom,
    pub adjust_flags: AdjustFlags,
    pub(crate) pool: Option<ModePool>,
    pub(crate) clock_ranges: Vec<StoredClockRange>,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            name: "screen0".to_string(),
            clock_source: ClockSource::default(),
            monitor: Monitor::default(),
            fb_format: FbFormat::default(),
            video_ram_kb: 16 * 1024,
            max_h_value: 0,
            max_v_value: 0,
            x_inc: DEFAULT_X_INC,
            scanline: Box::new(PackedScanlineWidth),
            modes: ModeList::new(),
            geometry: Geometry::default(),
            virtual_from: VirtualFrom::default(),
            adjust_flags: AdjustFlags::empty(),
            pool: None,
            clock_ranges: Vec::new(),
        }
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("name", &self.name)
            .field("clock_source", &self.clock_source)
            .field("monitor", &self.monitor)
            .field("fb_format", &self.fb_format)
            .field("video_ram_kb", &self.video_ram_kb)
            .field("max_h_value", &self.max_h_value)
            .field("max_v_value", &self.max_v_value)
            .field("x_inc", &self.x_inc)
            .field("modes", &self.modes)
            .field("geometry", &self.geometry)
            .field("virtual_from", &self.virtual_from)
            .field("adjust_flags", &self.adjust_flags)
            .field("pool", &self.pool.as_ref().map(ModePool::len))
            .finish_non_exhaustive()
    }
}

impl Screen {
    pub fn new(name: impl Into<String>, clock_source: ClockSource, monitor: Monitor) -> Self {
        Self {
            name: name.into(),
            clock_source,
            monitor,
            ..Default::default()
        }
    }

    pub fn with_video_ram_kb(mut self, video_ram_kb: u64) -> Self {
        self.video_ram_kb = video_ram_kb;
        self
    }

    pub fn with_fb_format(mut self, fb_format: FbFormat) -> Self {
        self.fb_format = fb_format;
        self
    }

    pub fn with_scanline(mut self, scanline: impl ScanlineWidth + 'static) -> Self {
        self.scanline = Box::new(scanline);
        self
    }

    /// The mode pool, once a run has built it.
    pub fn pool(&self) -> Option<&ModePool> {
        self.pool.as_ref()
    }

    /// Forgets the pool so the next run rebuilds it from its available modes.
    pub fn drop_pool(&mut self) {
        self.pool = None;
    }

    pub fn clock_ranges(&self) -> &[StoredClockRange] {
        &self.clock_ranges
    }

    pub(crate) fn x_inc(&self) -> i32 {
        if self.x_inc > 0 {
            self.x_inc
        } else {
            DEFAULT_X_INC
        }
    }

    /// Rounds a width up to the horizontal increment, `None` if the result does not fit.
    pub(crate) fn round_virtual_x(&self, x: i32) -> Option<i32> {
        let inc = self.x_inc();
        Some(x.checked_add(inc - 1)? / inc * inc)
    }

    pub(crate) fn scanline_width(&self, req: PitchRequest) -> Option<i32> {
        self.scanline.scanline_width(&self.fb_format, req)
    }

    /// Removes rejected modes from the accepted list and discards the pool.
    pub fn prune_driver_modes(&mut self) {
        let removed = self.modes.retain_ok();
        if removed > 0 {
            tracing::debug!(screen = %self.name, removed, "pruned rejected modes");
        }
        self.pool = None;
    }

    /// Derives CRTC timings for every accepted mode and remembers `adjust` for later runtime
    /// checks.
    pub fn set_crtc_for_modes(&mut self, adjust: AdjustFlags) {
        self.adjust_flags = adjust;
        for mode in self.modes.iter_mut() {
            set_mode_crtc(mode, adjust);
        }
    }

    /// Logs the virtual size and every mode of the accepted list.
    pub fn print_modes(&self) {
        let g = self.geometry;
        tracing::info!(
            screen = %self.name,
            from = ?self.virtual_from,
            "Virtual size is {}x{} (pitch {})",
            g.virtual_x,
            g.virtual_y,
            g.display_width
        );

        for mode in &self.modes {
            let hsync = mode.hsync();
            let refresh = mode.vrefresh();
            let scan = if mode.is_doublescan() {
                " (D)"
            } else if mode.is_interlaced() {
                " (I)"
            } else {
                ""
            };
            let vscan = if mode.v_scan > 1 { " (VScan)" } else { "" };
            let prefix = if mode.mode_type.contains(ModeType::BUILTIN) {
                "Built-in mode"
            } else if mode.mode_type.contains(ModeType::DEFAULT) {
                "Default mode"
            } else if mode.mode_type.contains(ModeType::DRIVER) {
                "Driver mode"
            } else {
                "Mode"
            };
            let user = if mode.mode_type.contains(ModeType::USERDEF) {
                "*"
            } else {
                " "
            };

            if hsync == 0.0 || refresh == 0.0 {
                tracing::info!("{user}{prefix} \"{}\"", mode.name);
                continue;
            }
            let mhz = f64::from(mode.clock) / 1000.0;
            if mode.clock == mode.synth_clock {
                tracing::info!(
                    "{user}{prefix} \"{}\": {mhz:.1} MHz, {hsync:.1} kHz, \
                     {refresh:.1} Hz{scan}{vscan}",
                    mode.name
                );
            } else {
                let synth = f64::from(mode.synth_clock) / 1000.0;
                tracing::info!(
                    "{user}{prefix} \"{}\": {mhz:.1} MHz (scaled from {synth:.1} MHz), \
                     {hsync:.1} kHz, {refresh:.1} Hz{scan}{vscan}",
                    mode.name
                );
            }
            tracing::info!("Modeline {}", mode.modeline());
        }
    }
}
