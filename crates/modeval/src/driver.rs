//! The driver collaborator consulted while modes are validated.

use crate::mode::DisplayMode;
use crate::screen::Geometry;
use crate::status::ModeStatus;

/// Hardware-specific mode checks.
///
/// Both callbacks return [`ModeStatus::Ok`] to keep the mode; any other status rejects it with
/// that reason.
pub trait ModeDriver {
    /// Called once per available mode while the pool is built.
    ///
    /// `mode.crtc` and `mode.synth_clock` hold provisional values. The driver may fill in
    /// `mode.hsync`/`mode.vrefresh`; anything left unset is derived from the CRTC timings.
    fn validate_provisional(&mut self, mode: &mut DisplayMode) -> ModeStatus {
        let _ = mode;
        ModeStatus::Ok
    }

    /// Called for a resolved mode with the geometry it would be accepted with.
    fn validate_final(&mut self, mode: &DisplayMode, geometry: &Geometry) -> ModeStatus {
        let _ = (mode, geometry);
        ModeStatus::Ok
    }
}

/// A driver that accepts every mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ModeDriver for AcceptAll {}
