use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidateError>;

/// Caller misuse that aborts a whole validation run.
///
/// Per-mode rejections are never errors; they are recorded as [`crate::ModeStatus`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("invalid pitch list (first entry {0})")]
    InvalidPitchList(i32),

    #[error("invalid pitch increment {0}")]
    InvalidPitchIncrement(i32),

    #[error("virtual {given} set without virtual {missing}")]
    IncompleteVirtualSize {
        given: &'static str,
        missing: &'static str,
    },

    #[error("virtual height ({height}) is too large for the hardware (max {max})")]
    VirtualHeightTooLarge { height: i32, max: i32 },

    #[error("virtual height ({height}) is too small for the hardware (min {min})")]
    VirtualHeightTooSmall { height: i32, min: i32 },

    #[error(
        "virtual width ({width}) is too large for the hardware (pitch {pitch}, allowed {min}-{max})"
    )]
    VirtualWidthUnsupported {
        width: i32,
        pitch: i32,
        min: i32,
        max: i32,
    },

    #[error("too little video memory ({video_ram_kb} kB) for virtual size {width}x{height}")]
    InsufficientMemory {
        width: i32,
        height: i32,
        video_ram_kb: u64,
    },

    #[error("virtual height ({height}) is too small for the hardware (min {min}) after validation")]
    FinalVirtualHeightTooSmall { height: i32, min: i32 },

    #[error("no clocks available for a non-programmable clock source")]
    NoClocks,

    #[error("internal error while looking up mode \"{0}\"")]
    Lookup(String),
}
