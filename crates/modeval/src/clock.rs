//! Clock generation capabilities and clock matching.

use serde::{Deserialize, Serialize};

use crate::mode::{DisplayMode, ModeFlags};

/// Largest distance (kHz) between a requested clock and the best discrete clock that is still
/// considered a match.
pub const CLOCK_TOLERANCE: i32 = 2000;

/// A window of pixel clocks one clock-generation path can serve.
///
/// Raw oscillator frequencies are scaled by `clock_div_factor / clock_mul_factor` before they
/// are compared against a mode's clock. Factors below 1 are treated as 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockRange {
    /// Inclusive lower bound (kHz).
    pub min_clock: i32,
    /// Inclusive upper bound (kHz).
    pub max_clock: i32,
    #[serde(default)]
    pub interlace_allowed: bool,
    #[serde(default)]
    pub double_scan_allowed: bool,
    #[serde(default = "one")]
    pub clock_mul_factor: i32,
    #[serde(default = "one")]
    pub clock_div_factor: i32,
    /// Carried through to every mode resolved through this range.
    #[serde(default)]
    pub priv_flags: i32,
}

fn one() -> i32 {
    1
}

impl ClockRange {
    pub fn new(min_clock: i32, max_clock: i32) -> Self {
        Self {
            min_clock,
            max_clock,
            interlace_allowed: false,
            double_scan_allowed: false,
            clock_mul_factor: 1,
            clock_div_factor: 1,
            priv_flags: 0,
        }
    }

    pub fn div_factor(&self) -> i32 {
        self.clock_div_factor.max(1)
    }

    pub fn mul_factor(&self) -> i32 {
        self.clock_mul_factor.max(1)
    }

    /// Raw oscillator frequency as seen through this range's scale factor.
    pub fn scale(&self, oscillator: i32) -> i32 {
        scale_clock(oscillator, self.div_factor(), self.mul_factor())
    }

    /// Whether `mode`'s clock and scan flags fit this range.
    pub fn accepts(&self, mode: &DisplayMode) -> bool {
        mode.clock >= self.min_clock
            && mode.clock <= self.max_clock
            && (self.interlace_allowed || !mode.is_interlaced())
            && (self.double_scan_allowed || (mode.v_scan <= 1 && !mode.is_doublescan()))
    }
}

/// First range accepting `mode`, in list order.
pub fn find_clock_range_for_mode<'a>(
    ranges: &'a [ClockRange],
    mode: &DisplayMode,
) -> Option<&'a ClockRange> {
    ranges.iter().find(|range| range.accepts(mode))
}

fn scale_clock(oscillator: i32, div: i32, mul: i32) -> i32 {
    (i64::from(oscillator) * i64::from(div) / i64::from(mul)) as i32
}

/// Result of [`nearest_clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockMatch {
    /// Index into the oscillator table.
    pub index: usize,
    /// The target is reached by post-dividing the oscillator by two.
    pub halved: bool,
    /// `|target * divider - scaled oscillator|` in kHz.
    pub gap: i32,
}

/// Finds the oscillator whose scaled frequency is nearest `freq` (kHz).
///
/// With `allow_div2`, `freq * 2` is tried against every oscillator as well. Among equal gaps the
/// undivided match wins, then the lower index. `clocks` must not be empty.
pub fn nearest_clock(
    clocks: &[i32],
    freq: i32,
    allow_div2: bool,
    div: i32,
    mul: i32,
) -> ClockMatch {
    debug_assert!(!clocks.is_empty(), "nearest_clock needs at least one oscillator");
    let (div, mul) = (div.max(1), mul.max(1));
    let max_divider: i64 = if allow_div2 { 2 } else { 1 };

    let mut best = ClockMatch {
        index: 0,
        halved: false,
        gap: i32::MAX,
    };
    let mut best_divider = i64::MAX;
    for (index, &oscillator) in clocks.iter().enumerate() {
        let scaled = i64::from(scale_clock(oscillator, div, mul));
        for divider in 1..=max_divider {
            let gap = (i64::from(freq) * divider - scaled).abs();
            let gap = gap.min(i64::from(i32::MAX)) as i32;
            if gap < best.gap || (gap == best.gap && divider < best_divider) {
                best = ClockMatch {
                    index,
                    halved: divider == 2,
                    gap,
                };
                best_divider = divider;
            }
        }
    }
    best
}

/// How the controller generates pixel clocks.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockSource {
    /// A fixed table of oscillator frequencies (kHz).
    Discrete(Vec<i32>),
    /// Any frequency inside a [`ClockRange`] can be programmed.
    #[default]
    Programmable,
}

/// Clock fields of a mode after resolution through a clock range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedClock {
    pub clock: i32,
    pub clock_index: Option<usize>,
    pub synth_clock: i32,
    pub halved: bool,
    /// Distance to the requested clock (always 0 for programmable clocks).
    pub gap: i32,
}

impl ResolvedClock {
    /// Writes the resolved clock into `mode`.
    pub fn apply(&self, mode: &mut DisplayMode, priv_flags: i32) {
        mode.clock = self.clock;
        mode.clock_index = self.clock_index;
        mode.synth_clock = self.synth_clock;
        mode.priv_flags = priv_flags;
        if self.halved {
            mode.flags |= ModeFlags::CLKDIV2;
        }
    }
}

impl ClockSource {
    pub fn is_programmable(&self) -> bool {
        matches!(self, ClockSource::Programmable)
    }

    pub fn clocks(&self) -> &[i32] {
        match self {
            ClockSource::Discrete(clocks) => clocks,
            ClockSource::Programmable => &[],
        }
    }

    /// Resolves `target` (kHz) through `range`.
    ///
    /// Programmable sources reproduce the target exactly; discrete sources pick the nearest
    /// oscillator and report the residual gap.
    pub(crate) fn resolve(
        &self,
        range: &ClockRange,
        target: i32,
        allow_div2: bool,
    ) -> ResolvedClock {
        match self {
            ClockSource::Programmable => ResolvedClock {
                clock: target,
                clock_index: None,
                synth_clock: scale_clock(target, range.mul_factor(), range.div_factor()),
                halved: false,
                gap: 0,
            },
            ClockSource::Discrete(clocks) => {
                let m = nearest_clock(
                    clocks,
                    target,
                    allow_div2,
                    range.div_factor(),
                    range.mul_factor(),
                );
                let oscillator = clocks[m.index];
                let mut clock = range.scale(oscillator);
                let mut synth_clock = oscillator;
                if m.halved {
                    clock /= 2;
                    synth_clock /= 2;
                }
                ResolvedClock {
                    clock,
                    clock_index: Some(m.index),
                    synth_clock,
                    halved: m.halved,
                    gap: m.gap,
                }
            }
        }
    }
}

/// Logs the accepted clock ranges and, for scaled discrete clocks, the clocks each range yields.
pub fn show_clock_ranges(source: &ClockSource, ranges: &[ClockRange]) {
    for range in ranges {
        let (div, mul) = (range.div_factor(), range.mul_factor());
        match source {
            ClockSource::Programmable => {
                let min = f64::from(range.min_clock) / 1000.0;
                let max = f64::from(range.max_clock) / 1000.0;
                match (range.min_clock != 0, range.max_clock != 0) {
                    (true, true) => tracing::info!("Clock range: {min:6.2} to {max:6.2} MHz"),
                    (true, false) => tracing::info!("Minimum clock: {min:6.2} MHz"),
                    (false, true) => tracing::info!("Maximum clock: {max:6.2} MHz"),
                    (false, false) => {}
                }
            }
            ClockSource::Discrete(clocks) if div > 1 || mul > 1 => {
                let scaled: Vec<String> = clocks
                    .iter()
                    .map(|&c| range.scale(c))
                    .filter(|&c| c >= range.min_clock && c <= range.max_clock)
                    .map(|c| format!("{:6.2}", f64::from(c) / 1000.0))
                    .collect();
                for row in scaled.chunks(8) {
                    tracing::info!("scaled clocks: {}", row.join(" "));
                }
            }
            ClockSource::Discrete(_) => {}
        }
    }
}
