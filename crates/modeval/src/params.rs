//! Per-run validation inputs.

use serde::{Deserialize, Serialize};

use crate::clock::ClockRange;
use crate::error::{Result, ValidateError};
use crate::lookup::Lookup;

/// Which line pitches (in pixels) the controller supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchConstraint {
    /// Only these pitches. The list ends at its first non-positive entry.
    List(Vec<i32>),
    /// Any pitch the scanline function produces inside `min..=max`.
    Range { min: i32, max: i32 },
}

impl Default for PitchConstraint {
    fn default() -> Self {
        PitchConstraint::Range {
            min: 0,
            max: i32::MAX,
        }
    }
}

impl PitchConstraint {
    /// The usable prefix of a pitch list; empty for ranges.
    pub fn list(&self) -> &[i32] {
        match self {
            PitchConstraint::List(pitches) => {
                let end = pitches
                    .iter()
                    .position(|&p| p <= 0)
                    .unwrap_or(pitches.len());
                &pitches[..end]
            }
            PitchConstraint::Range { .. } => &[],
        }
    }

    /// Smallest and largest acceptable pitch.
    pub fn bounds(&self) -> Result<(i32, i32)> {
        match self {
            PitchConstraint::List(pitches) => {
                let list = self.list();
                match (list.iter().min(), list.iter().max()) {
                    (Some(&min), Some(&max)) => Ok((min, max)),
                    _ => Err(ValidateError::InvalidPitchList(
                        pitches.first().copied().unwrap_or(0),
                    )),
                }
            }
            PitchConstraint::Range { min, max } => Ok((*min, *max)),
        }
    }
}

/// Inputs of one [`crate::Screen::validate_modes`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateParams {
    /// Requested mode names, in order. Empty means "pick from the pool".
    #[serde(default)]
    pub mode_names: Vec<String>,
    /// Clock generation paths, first accepting range wins.
    pub clock_ranges: Vec<ClockRange>,
    #[serde(default)]
    pub pitch: PitchConstraint,
    /// Pitch granularity passed to the scanline function. Must be positive.
    pub pitch_inc: i32,
    /// Minimum virtual height; 0 for none.
    #[serde(default)]
    pub min_height: i32,
    /// Maximum virtual height; 0 for none.
    #[serde(default)]
    pub max_height: i32,
    /// Explicit virtual width; 0 to negotiate. Must be set together with `virtual_y`.
    #[serde(default)]
    pub virtual_x: i32,
    /// Explicit virtual height; 0 to negotiate.
    #[serde(default)]
    pub virtual_y: i32,
    /// Size of the CPU-visible framebuffer aperture in bytes.
    pub aperture_size: u64,
    #[serde(default)]
    pub lookup: Lookup,
    /// Preferred refresh rate (Hz) for modes picked from the pool.
    #[serde(default)]
    pub target_refresh: Option<f64>,
    /// Keep adding pool modes after the requested names even if some were accepted.
    #[serde(default)]
    pub validate_all_pool_modes: bool,
}

impl Default for ValidateParams {
    fn default() -> Self {
        Self {
            mode_names: Vec::new(),
            clock_ranges: Vec::new(),
            pitch: PitchConstraint::default(),
            pitch_inc: 8,
            min_height: 0,
            max_height: 0,
            virtual_x: 0,
            virtual_y: 0,
            aperture_size: 16 * 1024 * 1024,
            lookup: Lookup::default(),
            target_refresh: None,
            validate_all_pool_modes: false,
        }
    }
}

impl ValidateParams {
    pub fn with_mode_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mode_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the caller fixed the virtual size.
    pub fn has_virtual_size(&self) -> bool {
        self.virtual_x > 0 && self.virtual_y > 0
    }

    /// Checks the argument combinations that make a run impossible.
    pub fn check(&self) -> Result<()> {
        if let PitchConstraint::List(pitches) = &self.pitch {
            let first = pitches.first().copied().unwrap_or(0);
            if first <= 0 {
                return Err(ValidateError::InvalidPitchList(first));
            }
        }
        if self.pitch_inc <= 0 {
            return Err(ValidateError::InvalidPitchIncrement(self.pitch_inc));
        }
        match (self.virtual_x > 0, self.virtual_y > 0) {
            (true, false) => Err(ValidateError::IncompleteVirtualSize {
                given: "width",
                missing: "height",
            }),
            (false, true) => Err(ValidateError::IncompleteVirtualSize {
                given: "height",
                missing: "width",
            }),
            _ => Ok(()),
        }
    }
}
