//! Resolution of a named request against the mode pool.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::clock::{
    find_clock_range_for_mode, ClockRange, ClockSource, ResolvedClock, CLOCK_TOLERANCE,
};
use crate::mode::{DisplayMode, ModeType};
use crate::pool::ModePool;
use crate::status::ModeStatus;

/// Interlaced refresh rates are divided by this before being compared under
/// [`LookupStrategy::BestRefresh`].
pub const INTERLACE_REFRESH_WEIGHT: f64 = 1.5;

/// How to choose among several pool entries sharing a name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupStrategy {
    /// Take the first eligible entry in search order.
    #[default]
    FirstMatch,
    /// Take the entry whose achievable clock is nearest its requested clock.
    ClosestClock,
    /// Take the entry with the highest refresh rate.
    BestRefresh,
}

bitflags! {
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LookupFlags: u32 {
        /// Discrete clocks may be post-divided by two.
        const CLKDIV2 = 1 << 0;
        /// Do not install default monitor ranges for axes the monitor leaves empty.
        const OPTIONAL_TOLERANCES = 1 << 1;
    }
}

/// A strategy together with its modifier flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub strategy: LookupStrategy,
    #[serde(default)]
    pub flags: LookupFlags,
}

impl Lookup {
    pub fn new(strategy: LookupStrategy) -> Self {
        Self {
            strategy,
            flags: LookupFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: LookupFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn allow_div2(&self) -> bool {
        self.flags.contains(LookupFlags::CLKDIV2)
    }
}

/// Pool entries are searched by type in this order. A tier matches entries carrying all of its
/// bits; the final empty tier matches everything.
const SEARCH_ORDER: [ModeType; 7] = [
    ModeType::BUILTIN.union(ModeType::PREFERRED),
    ModeType::BUILTIN,
    ModeType::USERDEF.union(ModeType::PREFERRED),
    ModeType::USERDEF,
    ModeType::DRIVER.union(ModeType::PREFERRED),
    ModeType::DRIVER,
    ModeType::empty(),
];

struct Candidate<'a> {
    index: usize,
    range: &'a ClockRange,
    resolved: ResolvedClock,
}

/// Finds a pool entry named like `request` and fills `request` from it.
///
/// On success the entry is marked as considered by `request_index` and [`ModeStatus::Ok`] is
/// returned. Otherwise `request` is left untouched (apart from its type, for built-in modes
/// whose clock is out of range) and the status explains why nothing was found: the status of
/// the first rejected entry, [`ModeStatus::NoMode`] if no entry carries the name, or
/// [`ModeStatus::Error`] if the inputs are unusable.
///
/// Entries failing the clock range or clock tolerance checks have their status updated, so
/// later requests for the same name skip them.
///
/// The strategy applies within one type tier: once any entry of a tier is eligible, lower
/// tiers are not searched.
pub fn lookup_mode(
    request: &mut DisplayMode,
    request_index: usize,
    pool: &mut ModePool,
    source: &ClockSource,
    ranges: &[ClockRange],
    lookup: Lookup,
) -> ModeStatus {
    if pool.is_empty() || (!source.is_programmable() && source.clocks().is_empty()) {
        tracing::error!(name = %request.name, "lookup called without a pool or clocks");
        return ModeStatus::Error;
    }
    let allow_div2 = lookup.allow_div2();

    let mut status = ModeStatus::NoMode;
    let mut found = false;
    let mut best: Option<Candidate<'_>> = None;
    let mut best_refresh = 0.0;

    for tier in SEARCH_ORDER {
        for index in 0..pool.len() {
            let entry = &mut pool.entries_mut()[index];
            if !entry.mode.mode_type.contains(tier) || entry.mode.name != request.name {
                continue;
            }
            if !entry.mode.status.is_ok() {
                if !found {
                    status = entry.mode.status;
                }
                continue;
            }
            if entry.marker.is_considered() {
                continue;
            }

            if entry.mode.mode_type.contains(ModeType::BUILTIN) {
                return take_builtin(
                    request,
                    request_index,
                    index,
                    pool,
                    source,
                    ranges,
                    allow_div2,
                );
            }

            let Some(range) = find_clock_range_for_mode(ranges, &entry.mode) else {
                entry.mode.status = ModeStatus::ClockRange;
                if !found {
                    status = ModeStatus::ClockRange;
                }
                continue;
            };

            let resolved = source.resolve(range, entry.mode.clock, allow_div2);
            if resolved.gap > CLOCK_TOLERANCE {
                entry.mode.status = ModeStatus::NoClock;
                if !found {
                    status = ModeStatus::NoClock;
                }
                continue;
            }
            found = true;

            let candidate = Candidate {
                index,
                range,
                resolved,
            };
            match lookup.strategy {
                LookupStrategy::FirstMatch => {
                    best = Some(candidate);
                    break;
                }
                LookupStrategy::ClosestClock => {
                    if best.as_ref().map_or(true, |b| resolved.gap < b.resolved.gap) {
                        best = Some(candidate);
                    }
                }
                LookupStrategy::BestRefresh => {
                    let refresh = weighted_refresh(&entry.mode);
                    if refresh > best_refresh {
                        best = Some(candidate);
                        best_refresh = refresh;
                    }
                }
            }
        }
        if found {
            break;
        }
    }

    let Some(best) = best else {
        return status;
    };
    request.copy_timings_from(&pool.entries()[best.index].mode);
    best.resolved.apply(request, best.range.priv_flags);
    pool.mark(best.index, request_index);
    ModeStatus::Ok
}

fn weighted_refresh(mode: &DisplayMode) -> f64 {
    let refresh = mode.vrefresh();
    if mode.is_interlaced() {
        refresh / INTERLACE_REFRESH_WEIGHT
    } else {
        refresh
    }
}

/// Built-in modes are trusted verbatim; only a [`ModeType::CLOCK_C`] clock gets resolved.
fn take_builtin(
    request: &mut DisplayMode,
    request_index: usize,
    index: usize,
    pool: &mut ModePool,
    source: &ClockSource,
    ranges: &[ClockRange],
    allow_div2: bool,
) -> ModeStatus {
    let entry = &mut pool.entries_mut()[index];
    if entry.mode.mode_type.contains(ModeType::CLOCK_C) {
        let Some(range) = find_clock_range_for_mode(ranges, &entry.mode) else {
            request.mode_type = entry.mode.mode_type;
            entry.mode.status = ModeStatus::ClockRange;
            return ModeStatus::ClockRange;
        };
        let resolved = source.resolve(range, entry.mode.clock, allow_div2);
        request.copy_timings_from(&entry.mode);
        resolved.apply(request, range.priv_flags);
    } else {
        request.copy_timings_from(&entry.mode);
        request.clock = entry.mode.clock;
        request.clock_index = if source.is_programmable() {
            None
        } else {
            entry.mode.clock_index
        };
        request.synth_clock = entry.mode.synth_clock;
        request.priv_flags = entry.mode.priv_flags;
    }
    pool.mark(index, request_index);
    ModeStatus::Ok
}
