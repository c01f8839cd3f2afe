//! Derivation of controller-facing (CRTC) timings.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::mode::{DisplayMode, ModeFlags, ModeType};

/// Blanking spans must stay strictly below these limits (VGA CRTC field widths).
pub const MAX_V_BLANK: i32 = 127;
pub const MAX_H_BLANK: i32 = 63 * 8;

bitflags! {
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AdjustFlags: u32 {
        /// Program interlaced modes with per-field vertical timings.
        const INTERLACE_HALVE_V = 1 << 0;
    }
}

/// Fills `mode.crtc` from the logical timings.
///
/// Built-in modes without [`ModeType::CRTC_C`] already carry their CRTC timings and are left
/// alone.
pub fn set_mode_crtc(mode: &mut DisplayMode, adjust: AdjustFlags) {
    if mode.mode_type.intersection(ModeType::CRTC_C) == ModeType::BUILTIN {
        return;
    }

    let c = &mut mode.crtc;
    c.h_display = mode.h_display;
    c.h_sync_start = mode.h_sync_start;
    c.h_sync_end = mode.h_sync_end;
    c.h_total = mode.h_total;
    c.h_skew = mode.h_skew;
    c.v_display = mode.v_display;
    c.v_sync_start = mode.v_sync_start;
    c.v_sync_end = mode.v_sync_end;
    c.v_total = mode.v_total;

    let mut vertical = [
        &mut c.v_display,
        &mut c.v_sync_start,
        &mut c.v_sync_end,
        &mut c.v_total,
    ];
    if mode.flags.contains(ModeFlags::INTERLACE) {
        if adjust.contains(AdjustFlags::INTERLACE_HALVE_V) {
            for v in vertical.iter_mut() {
                **v /= 2;
            }
        }
        *vertical[3] |= 1;
    }
    if mode.flags.contains(ModeFlags::DBLSCAN) {
        for v in vertical.iter_mut() {
            **v *= 2;
        }
    }
    if mode.v_scan > 1 {
        for v in vertical.iter_mut() {
            **v *= mode.v_scan;
        }
    }
    c.h_adjusted = false;
    c.v_adjusted = false;

    (c.v_blank_start, c.v_blank_end) =
        clamp_blanking(c.v_display, c.v_sync_start, c.v_sync_end, c.v_total, MAX_V_BLANK);
    (c.h_blank_start, c.h_blank_end) =
        clamp_blanking(c.h_display, c.h_sync_start, c.h_sync_end, c.h_total, MAX_H_BLANK);
}

/// Computes the blanking window of one axis, keeping its span below `limit`.
///
/// Moving the start forward is preferred: monitors clamp just after the sync pulse, never
/// before it. If that would start blanking after the sync pulse, blanking starts at the pulse
/// and the end is pulled in instead.
fn clamp_blanking(
    display: i32,
    sync_start: i32,
    sync_end: i32,
    total: i32,
    limit: i32,
) -> (i32, i32) {
    let widest = limit - 1;
    let mut start = sync_start.min(display);
    let mut end = sync_end.max(total);
    if end - start > widest {
        start = end - widest;
        if start > sync_start {
            start = sync_start;
            end = (start + widest).min(total);
        }
    }
    (start, end)
}
