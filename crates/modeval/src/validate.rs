//! The mode validation and selection pipeline.
//!
//! A run goes through these stages:
//! 1. sanity checks on the inputs and, unless disabled, default monitor ranges;
//! 2. the initial virtual size: explicit, estimated from the monitor, or none;
//! 3. the mode pool, built once from the available modes and reused by later runs;
//! 4. one request per requested name, topped up from the pool when the names run out;
//! 5. per request, lookup in the pool followed by virtual size negotiation;
//! 6. finalization of the geometry.

use crate::clock::{find_clock_range_for_mode, nearest_clock, show_clock_ranges, ClockSource};
use crate::crtc::{set_mode_crtc, AdjustFlags};
use crate::driver::ModeDriver;
use crate::error::{Result, ValidateError};
use crate::framebuffer::{check_mode_size, PitchRequest};
use crate::lookup::{lookup_mode, LookupFlags};
use crate::mode::{DisplayMode, ModeType};
use crate::monitor::{
    check_mode_for_monitor, check_mode_geometry, Monitor, ReducedBlankingPolicy, SYNC_TOLERANCE,
};
use crate::params::ValidateParams;
use crate::pool::ModePool;
use crate::screen::{Geometry, Screen, StoredClockRange, VirtualFrom};
use crate::status::ModeStatus;

/// Modes whose horizontal total is less than this multiple of their width are not picked from
/// the pool automatically unless the monitor handles reduced blanking.
const MIN_AUTOFILL_BLANKING_RATIO: f64 = 1.15;

/// Relative tolerance when matching a mode's aspect ratio to the monitor's.
const ASPECT_TOLERANCE: f64 = 0.05;

/// State of the virtual size negotiation within one run.
struct Negotiation<'a> {
    params: &'a ValidateParams,
    min_pitch: i32,
    max_pitch: i32,
    /// The caller fixed the virtual size.
    fixed: bool,
    geometry: Geometry,
    accepted: usize,
}

impl Screen {
    /// Selects and parameterizes the modes this screen can use.
    ///
    /// `available` is every mode that could be shown (stock, user supplied, probed). The pool
    /// built from it on the first run is reused by later runs, so `available` only matters
    /// until then (see [`Screen::drop_pool`]).
    ///
    /// On return [`Screen::modes`] holds one entry per request with its final status, and
    /// [`Screen::geometry`] the negotiated virtual size and pitch. Returns the number of
    /// accepted modes; `Ok(0)` if no mode is usable. Errors are reserved for inputs that make
    /// the run impossible.
    pub fn validate_modes(
        &mut self,
        available: &[DisplayMode],
        params: &ValidateParams,
        mut driver: Option<&mut dyn ModeDriver>,
    ) -> Result<usize> {
        if let Err(err) = self.check_inputs(params) {
            tracing::error!(screen = %self.name, "validate_modes: {err}");
            return Err(err);
        }

        if !params.lookup.flags.contains(LookupFlags::OPTIONAL_TOLERANCES) {
            self.monitor.install_default_ranges();
        }

        self.clock_ranges = params
            .clock_ranges
            .iter()
            .map(|range| StoredClockRange {
                range: range.clone(),
                lookup: params.lookup,
            })
            .collect();

        let (min_pitch, max_pitch) = params.pitch.bounds()?;
        let mut negotiation = Negotiation {
            params,
            min_pitch,
            max_pitch,
            fixed: params.has_virtual_size(),
            geometry: Geometry {
                virtual_x: 0,
                virtual_y: 0,
                display_width: -1,
            },
            accepted: 0,
        };

        self.virtual_from = VirtualFrom::Negotiated;
        let mut inferred = false;
        if negotiation.fixed {
            negotiation.geometry = match self.explicit_geometry(&negotiation) {
                Ok(geometry) => geometry,
                Err(err) => {
                    tracing::error!(screen = %self.name, "{err}");
                    return Err(err);
                }
            };
            self.virtual_from = VirtualFrom::Config;
        } else if params.mode_names.is_empty() {
            if let Some((x, y)) = infer_virtual_size(&self.monitor, available) {
                inferred = true;
                negotiation.geometry = Geometry {
                    virtual_x: x,
                    virtual_y: y,
                    display_width: self.pitch_for(params, x, y, min_pitch),
                };
            }
        }

        show_clock_ranges(&self.clock_source, &params.clock_ranges);

        let mut pool = match self.pool.take() {
            Some(mut pool) => {
                pool.reset();
                pool
            }
            None => {
                let pool = self.build_pool(available, &negotiation, &mut driver);
                if pool.is_empty() {
                    tracing::warn!(screen = %self.name, "Mode pool is empty");
                    self.modes.clear();
                    self.geometry = negotiation.geometry;
                    return Ok(0);
                }
                pool
            }
        };

        let result = self.select_modes(&mut pool, &mut negotiation, &mut driver);
        self.pool = Some(pool);
        result?;

        let mut geometry = negotiation.geometry;
        if inferred && negotiation.accepted > 0 {
            self.shrink_inferred(params, &mut geometry);
        }
        self.geometry = geometry;

        if negotiation.accepted == 0 {
            return Ok(0);
        }
        if params.min_height > 0 && geometry.virtual_y < params.min_height {
            let err = ValidateError::FinalVirtualHeightTooSmall {
                height: geometry.virtual_y,
                min: params.min_height,
            };
            tracing::error!(screen = %self.name, "{err}");
            return Err(err);
        }
        Ok(negotiation.accepted)
    }

    fn check_inputs(&self, params: &ValidateParams) -> Result<()> {
        if let ClockSource::Discrete(clocks) = &self.clock_source {
            if clocks.is_empty() {
                return Err(ValidateError::NoClocks);
            }
        }
        params.check()
    }

    /// Pitch for a virtual size from the scanline function, `-1` if it has none.
    fn pitch_for(&self, params: &ValidateParams, x: i32, y: i32, min_width: i32) -> i32 {
        self.scanline_width(PitchRequest {
            x,
            y,
            min_width,
            aperture: params.aperture_size,
            pitch_inc: params.pitch_inc,
        })
        .unwrap_or(-1)
    }

    /// First listed pitch of at least `floor` that the scanline function reproduces for `x`
    /// by `y`, `-1` if none does.
    fn listed_pitch(&self, params: &ValidateParams, x: i32, y: i32, floor: i32) -> i32 {
        params
            .pitch
            .list()
            .iter()
            .copied()
            .find(|&p| p >= x && p >= floor && self.pitch_for(params, x, y, p) == p)
            .unwrap_or(-1)
    }

    fn explicit_geometry(&self, negotiation: &Negotiation<'_>) -> Result<Geometry> {
        let params = negotiation.params;
        let y = params.virtual_y;
        if params.max_height > 0 && y > params.max_height {
            return Err(ValidateError::VirtualHeightTooLarge {
                height: y,
                max: params.max_height,
            });
        }
        if params.min_height > 0 && y < params.min_height {
            return Err(ValidateError::VirtualHeightTooSmall {
                height: y,
                min: params.min_height,
            });
        }

        let Some(x) = self.round_virtual_x(params.virtual_x) else {
            return Err(ValidateError::VirtualWidthUnsupported {
                width: params.virtual_x,
                pitch: -1,
                min: negotiation.min_pitch,
                max: negotiation.max_pitch,
            });
        };
        let pitch = if params.pitch.list().is_empty() {
            self.pitch_for(params, x, y, negotiation.min_pitch)
        } else {
            self.listed_pitch(params, x, y, i32::MIN)
        };
        if pitch < negotiation.min_pitch || pitch > negotiation.max_pitch {
            return Err(ValidateError::VirtualWidthUnsupported {
                width: x,
                pitch,
                min: negotiation.min_pitch,
                max: negotiation.max_pitch,
            });
        }
        if !check_mode_size(&self.fb_format, self.video_ram_kb, pitch, x, y) {
            return Err(ValidateError::InsufficientMemory {
                width: x,
                height: y,
                video_ram_kb: self.video_ram_kb,
            });
        }
        Ok(Geometry {
            virtual_x: x,
            virtual_y: y,
            display_width: pitch,
        })
    }

    fn build_pool(
        &self,
        available: &[DisplayMode],
        negotiation: &Negotiation<'_>,
        driver: &mut Option<&mut dyn ModeDriver>,
    ) -> ModePool {
        let mut pool = ModePool::new();
        for mode in available {
            let mut candidate = mode.clone();
            let mut status = self.initial_check_mode_for_driver(
                &mut candidate,
                negotiation.params,
                negotiation.max_pitch,
                negotiation.geometry,
                driver,
            );
            if status.is_ok() {
                status = check_mode_for_monitor(&mut candidate, &self.monitor);
            }
            if status.is_ok() {
                pool.push(candidate);
            } else {
                log_rejection(mode, status);
            }
        }
        tracing::debug!(screen = %self.name, size = pool.len(), "built mode pool");
        pool
    }

    /// Checks a mode against the controller before it is admitted to the pool.
    ///
    /// With a driver present, the mode's CRTC timings and synthesized clock are filled in
    /// provisionally for the driver to inspect. In every case the mode leaves with explicit
    /// hsync and vrefresh values.
    pub fn initial_check_mode_for_driver(
        &self,
        mode: &mut DisplayMode,
        params: &ValidateParams,
        max_pitch: i32,
        geometry: Geometry,
        driver: &mut Option<&mut dyn ModeDriver>,
    ) -> ModeStatus {
        let status = check_mode_geometry(mode);
        if !status.is_ok() {
            return status;
        }
        if !check_mode_size(
            &self.fb_format,
            self.video_ram_kb,
            mode.h_display,
            mode.h_display,
            mode.v_display,
        ) {
            return ModeStatus::Mem;
        }
        if max_pitch > 0 && mode.h_display > max_pitch {
            return ModeStatus::BadWidth;
        }
        if geometry.virtual_x > 0 && mode.h_display > geometry.virtual_x {
            return ModeStatus::VirtualX;
        }
        if geometry.virtual_y > 0 && mode.v_display > geometry.virtual_y {
            return ModeStatus::VirtualY;
        }
        if self.max_h_value > 0 && mode.h_total > self.max_h_value {
            return ModeStatus::BadHValue;
        }
        if self.max_v_value > 0 && mode.v_total > self.max_v_value {
            return ModeStatus::BadVValue;
        }

        if let Some(driver) = driver {
            set_mode_crtc(mode, AdjustFlags::INTERLACE_HALVE_V);
            let Some(range) = find_clock_range_for_mode(&params.clock_ranges, mode) else {
                return ModeStatus::ClockRange;
            };
            mode.synth_clock = match &self.clock_source {
                ClockSource::Programmable => mode.clock,
                ClockSource::Discrete(clocks) => {
                    let m = nearest_clock(
                        clocks,
                        mode.clock,
                        params.lookup.allow_div2(),
                        range.div_factor(),
                        range.mul_factor(),
                    );
                    let clock = range.scale(clocks[m.index]);
                    if m.halved {
                        clock / 2
                    } else {
                        clock
                    }
                }
            };

            let status = driver.validate_provisional(mode);
            if !status.is_ok() {
                return status;
            }

            let synth = f64::from(mode.synth_clock);
            let crtc = mode.crtc;
            if mode.hsync.map_or(true, |h| h <= 0.0) && crtc.h_total > 0 {
                mode.hsync = Some(synth / f64::from(crtc.h_total));
            }
            if mode.vrefresh.map_or(true, |r| r <= 0.0) && crtc.h_total > 0 && crtc.v_total > 0 {
                mode.vrefresh =
                    Some(synth * 1000.0 / (f64::from(crtc.h_total) * f64::from(crtc.v_total)));
            }
        }

        mode.hsync = Some(mode.hsync());
        mode.vrefresh = Some(mode.vrefresh());
        ModeStatus::Ok
    }

    fn select_modes(
        &mut self,
        pool: &mut ModePool,
        negotiation: &mut Negotiation<'_>,
        driver: &mut Option<&mut dyn ModeDriver>,
    ) -> Result<()> {
        let params = negotiation.params;
        let target_refresh = target_refresh(pool, params.target_refresh);

        self.modes.clear();
        for name in &params.mode_names {
            self.modes
                .push(DisplayMode::named(name.as_str(), ModeType::USERDEF));
        }
        let user_modes = !params.mode_names.is_empty();
        let mut validate_all = params.validate_all_pool_modes;

        let mut index = 0;
        loop {
            if index == self.modes.len() {
                if negotiation.accepted > 0 && !validate_all {
                    break;
                }
                validate_all = true;
                match self.next_pool_request(pool, user_modes, target_refresh) {
                    Some(request) => self.modes.push(request),
                    None => break,
                }
            }

            let Some(slot) = self.modes.get_mut(index) else {
                break;
            };
            let mut request = std::mem::take(slot);
            let outcome = self.resolve_request(&mut request, index, pool, negotiation, driver);
            if let Some(slot) = self.modes.get_mut(index) {
                *slot = request;
            }
            outcome?;
            index += 1;
        }
        Ok(())
    }

    /// Looks up one request and fits it into the virtual size.
    ///
    /// A request that resolves but does not fit is looked up again, so a second pool entry of
    /// the same name gets its chance. When no further entry turns up, the request keeps the
    /// reason its last candidate was rejected for.
    fn resolve_request(
        &self,
        request: &mut DisplayMode,
        index: usize,
        pool: &mut ModePool,
        negotiation: &mut Negotiation<'_>,
        driver: &mut Option<&mut dyn ModeDriver>,
    ) -> Result<()> {
        let params = negotiation.params;
        let mut repeat = false;
        loop {
            if repeat && !request.status.is_ok() {
                log_rejection(request, request.status);
            }
            let save_type = request.mode_type;
            let status = lookup_mode(
                request,
                index,
                pool,
                &self.clock_source,
                &params.clock_ranges,
                params.lookup,
            );
            if repeat && status == ModeStatus::NoMode {
                return Ok(());
            }
            if !status.is_ok() {
                log_rejection(request, status);
            }
            if status == ModeStatus::Error {
                return Err(ValidateError::Lookup(request.name.clone()));
            }
            if !status.is_ok() {
                if request.status.is_ok() {
                    request.status = status;
                }
                return Ok(());
            }
            request.mode_type |= save_type;
            repeat = true;

            match self.place(request, negotiation, driver) {
                Ok(geometry) => {
                    negotiation.geometry = geometry;
                    negotiation.accepted += 1;
                    request.status = ModeStatus::Ok;
                    return Ok(());
                }
                Err(status) => request.status = status,
            }
        }
    }

    /// Computes the geometry `mode` would be accepted with, growing the virtual size if
    /// allowed.
    fn place(
        &self,
        mode: &DisplayMode,
        negotiation: &Negotiation<'_>,
        driver: &mut Option<&mut dyn ModeDriver>,
    ) -> std::result::Result<Geometry, ModeStatus> {
        let params = negotiation.params;
        let current = negotiation.geometry;
        let mut next = current;

        // Only user requests may grow an established virtual size.
        if !mode.mode_type.contains(ModeType::USERDEF) && negotiation.accepted > 0 {
            if mode.h_display > current.virtual_x {
                return Err(ModeStatus::VirtualX);
            }
            if mode.v_display > current.virtual_y {
                return Err(ModeStatus::VirtualY);
            }
        }

        if !negotiation.fixed {
            if mode.h_display > next.virtual_x {
                next.virtual_x = self
                    .round_virtual_x(mode.h_display)
                    .ok_or(ModeStatus::VirtualX)?;
            }
            if mode.v_display > next.virtual_y {
                if params.max_height > 0 && mode.v_display > params.max_height {
                    return Err(ModeStatus::VirtualY);
                }
                next.virtual_y = mode.v_display;
            }
        }

        if next.virtual_x != current.virtual_x || next.virtual_y != current.virtual_y {
            next.display_width = if params.pitch.list().is_empty() {
                let floor = current.display_width.max(negotiation.min_pitch);
                self.pitch_for(params, next.virtual_x, next.virtual_y, floor)
            } else {
                self.listed_pitch(
                    params,
                    next.virtual_x,
                    next.virtual_y,
                    current.display_width,
                )
            };
            if next.display_width < negotiation.min_pitch
                || next.display_width > negotiation.max_pitch
            {
                return Err(ModeStatus::BadWidth);
            }
            if !check_mode_size(
                &self.fb_format,
                self.video_ram_kb,
                next.display_width,
                next.virtual_x,
                next.virtual_y,
            ) {
                return Err(ModeStatus::MemVirt);
            }
        }

        if let Some(driver) = driver {
            let status = driver.validate_final(mode, &next);
            if !status.is_ok() {
                return Err(status);
            }
        }
        Ok(next)
    }

    /// Picks the largest unconsidered pool mode as an extra request.
    ///
    /// Pool entries sharing a name with a failed request are marked as considered by it
    /// instead: they lost to an entry of the same name already.
    fn next_pool_request(
        &self,
        pool: &mut ModePool,
        user_modes: bool,
        target_refresh: f64,
    ) -> Option<DisplayMode> {
        let strict = self.monitor.reduced_blanking_policy == ReducedBlankingPolicy::Strict;
        let mut best: Option<usize> = None;
        let mut best_area = 0;

        for index in 0..pool.len() {
            let entry = &pool.entries()[index];
            if !entry.is_available() {
                continue;
            }
            let failed = self
                .modes
                .iter()
                .position(|r| !r.status.is_ok() && r.name == entry.mode.name);
            if let Some(request) = failed {
                pool.mark(index, request);
                continue;
            }

            let mode = &entry.mode;
            let blanking_ratio = f64::from(mode.h_total) / f64::from(mode.h_display);
            if !self.monitor.reduced_blanking
                && (strict || mode.mode_type.contains(ModeType::DEFAULT))
                && blanking_ratio < MIN_AUTOFILL_BLANKING_RATIO
            {
                continue;
            }
            if mode.vrefresh() < (1.0 - SYNC_TOLERANCE) * target_refresh {
                continue;
            }
            if mode.area() > best_area {
                best = Some(index);
                best_area = mode.area();
            }
        }

        let chosen = &pool.entries()[best?].mode;
        let mode_type = if user_modes {
            ModeType::empty()
        } else {
            ModeType::USERDEF
        };
        tracing::debug!(name = %chosen.name, "adding mode from pool");
        Some(DisplayMode::named(chosen.name.as_str(), mode_type))
    }

    /// Shrinks an estimated virtual size that no accepted mode fills.
    fn shrink_inferred(&self, params: &ValidateParams, geometry: &mut Geometry) {
        let (mut x, mut y) = (0, 0);
        for mode in self.modes.iter().filter(|m| m.status.is_ok()) {
            if mode.h_display > x && mode.v_display > y {
                x = mode.h_display;
                y = mode.v_display;
            }
        }
        if x < geometry.virtual_x || y < geometry.virtual_y {
            tracing::warn!(
                screen = %self.name,
                "Shrinking virtual size estimate from {}x{} to {}x{}",
                geometry.virtual_x,
                geometry.virtual_y,
                x,
                y
            );
            geometry.display_width = self.pitch_for(params, x, y, geometry.display_width);
            geometry.virtual_x = x;
            geometry.virtual_y = y;
        }
    }
}

/// The target refresh rate in effect: `0.0` if unset or if no pool mode reaches it.
fn target_refresh(pool: &ModePool, target: Option<f64>) -> f64 {
    let Some(target) = target.filter(|&t| t > 0.0) else {
        return 0.0;
    };
    if pool
        .iter()
        .any(|mode| mode.vrefresh() > target * (1.0 - SYNC_TOLERANCE))
    {
        tracing::info!("Target refresh rate is {target:.1} Hz");
        target
    } else {
        0.0
    }
}

/// Estimates a virtual size from the monitor's aspect ratio: the largest driver or user mode
/// whose aspect ratio is within 5% of the monitor's. Monitors without a physical size are
/// assumed to be 4:3.
pub fn infer_virtual_size(monitor: &Monitor, modes: &[DisplayMode]) -> Option<(i32, i32)> {
    let aspect = if monitor.width_mm == 0 || monitor.height_mm == 0 {
        4.0 / 3.0
    } else {
        f64::from(monitor.width_mm) / f64::from(monitor.height_mm)
    };

    let (mut x, mut y) = (0, 0);
    for mode in modes {
        if !mode
            .mode_type
            .intersects(ModeType::DRIVER | ModeType::USERDEF)
            || mode.v_display == 0
        {
            continue;
        }
        let mode_aspect = f64::from(mode.h_display) / f64::from(mode.v_display);
        if (1.0 - aspect / mode_aspect).abs() < ASPECT_TOLERANCE
            && mode.h_display > x
            && mode.v_display > y
        {
            x = mode.h_display;
            y = mode.v_display;
        }
    }

    if x == 0 || y == 0 {
        tracing::warn!(monitor = %monitor.id, "Unable to estimate virtual size");
        return None;
    }
    tracing::info!("Estimated virtual size for aspect ratio {aspect:.4} is {x}x{y}");
    Some((x, y))
}

fn log_rejection(mode: &DisplayMode, status: ModeStatus) {
    tracing::info!(
        "Not using {}mode \"{}\" ({})",
        mode.type_label(),
        mode.name,
        status
    );
}
