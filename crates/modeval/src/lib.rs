//! Display mode validation and selection for video controllers.
//!
//! Given the modes a screen could show (stock, user supplied and probed), a monitor profile and
//! the controller's clock and memory capabilities, [`Screen::validate_modes`] works out which
//! requested modes can actually be driven, how each maps onto the hardware clocks, and the
//! virtual framebuffer size and line pitch that hold them all.
//!
//! The crate is split along the checks a mode goes through:
//! - [`monitor`]: timing legality and monitor compliance,
//! - [`clock`]: clock ranges and discrete oscillator matching,
//! - [`crtc`]: controller-facing timings,
//! - [`framebuffer`]: video memory fit and line pitch,
//! - [`lookup`]: resolving a requested name against the mode pool,
//! - [`validate`]: the pipeline tying it all together.
//!
//! Per-mode outcomes are [`ModeStatus`] values; only caller misuse surfaces as
//! [`ValidateError`].

pub mod clock;
pub mod crtc;
pub mod driver;
mod error;
pub mod framebuffer;
pub mod lookup;
pub mod mode;
pub mod modelist;
pub mod monitor;
pub mod params;
pub mod pool;
pub mod screen;
mod status;
pub mod validate;
mod vidmode;

pub use clock::{nearest_clock, ClockMatch, ClockRange, ClockSource, CLOCK_TOLERANCE};
pub use crtc::{set_mode_crtc, AdjustFlags};
pub use driver::{AcceptAll, ModeDriver};
pub use error::{Result, ValidateError};
pub use framebuffer::{check_mode_size, FbFormat, PackedScanlineWidth, PitchRequest, ScanlineWidth};
pub use lookup::{lookup_mode, Lookup, LookupFlags, LookupStrategy};
pub use mode::{CrtcTiming, DisplayMode, ModeFlags, ModeType};
pub use modelist::ModeList;
pub use monitor::{check_mode_for_monitor, Monitor, ReducedBlankingPolicy, SyncRange};
pub use params::{PitchConstraint, ValidateParams};
pub use pool::{Marker, ModePool, PoolEntry};
pub use screen::{Geometry, Screen, VirtualFrom};
pub use status::ModeStatus;
pub use validate::infer_virtual_size;
