//! Runtime checks of single modes against a finished configuration, e.g. for modes a client
//! asks to switch to after startup.

use crate::clock::{ClockSource, CLOCK_TOLERANCE};
use crate::mode::DisplayMode;
use crate::screen::Screen;
use crate::status::ModeStatus;

impl Screen {
    /// Checks `mode` against the negotiated virtual size, the hardware maxima and the clock
    /// ranges stored by the last [`Screen::validate_modes`] run, filling in its clock fields.
    pub fn check_mode_for_driver(&self, mode: &mut DisplayMode) -> ModeStatus {
        if let ClockSource::Discrete(clocks) = &self.clock_source {
            if clocks.is_empty() {
                tracing::error!(screen = %self.name, "check_mode_for_driver: no clocks");
                return ModeStatus::Error;
            }
        }

        if mode.h_display > self.geometry.virtual_x {
            return ModeStatus::VirtualX;
        }
        if mode.v_display > self.geometry.virtual_y {
            return ModeStatus::VirtualY;
        }
        if self.max_h_value > 0 && mode.h_total > self.max_h_value {
            return ModeStatus::BadHValue;
        }
        if self.max_v_value > 0 && mode.v_total > self.max_v_value {
            return ModeStatus::BadVValue;
        }

        let mut status = ModeStatus::ClockRange;
        for stored in &self.clock_ranges {
            if !stored.range.accepts(mode) {
                continue;
            }
            let allow_div2 = stored.lookup.allow_div2();
            let resolved = self
                .clock_source
                .resolve(&stored.range, mode.clock, allow_div2);
            if resolved.gap > CLOCK_TOLERANCE {
                status = ModeStatus::NoClock;
                continue;
            }
            resolved.apply(mode, stored.range.priv_flags);
            return ModeStatus::Ok;
        }
        status
    }
}
