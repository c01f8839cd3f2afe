use modeval::{
    AcceptAll, ClockRange, ClockSource, DisplayMode, FbFormat, Geometry, Lookup, LookupStrategy,
    ModeDriver, ModeFlags, ModeStatus, ModeType, Monitor, PitchConstraint, PitchRequest,
    ReducedBlankingPolicy, Screen, SyncRange, ValidateError, ValidateParams, VirtualFrom,
};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn driver_mode(
    name: &str,
    clock: i32,
    h: (i32, i32, i32, i32),
    v: (i32, i32, i32, i32),
) -> DisplayMode {
    DisplayMode::new(name, clock, h, v).with_type(ModeType::DRIVER)
}

fn vga() -> DisplayMode {
    driver_mode("640x480", 25175, (640, 656, 752, 800), (480, 490, 492, 525))
}

fn svga() -> DisplayMode {
    driver_mode("800x600", 40000, (800, 840, 968, 1056), (600, 601, 605, 628))
}

fn xga() -> DisplayMode {
    driver_mode("1024x768", 65000, (1024, 1048, 1184, 1344), (768, 771, 777, 806))
}

/// 640x480 and 1024x768 at 60 Hz. The second needs 48.4 kHz, so the low-frequency range alone
/// would not admit it.
fn classic_monitor() -> Monitor {
    Monitor {
        hsync: vec![SyncRange::new(31.5, 37.9), SyncRange::new(47.0, 49.0)],
        vrefresh: vec![SyncRange::new(50.0, 70.0)],
        ..Monitor::new("classic")
    }
}

fn wide_monitor() -> Monitor {
    Monitor {
        hsync: vec![SyncRange::new(30.0, 50.0)],
        vrefresh: vec![SyncRange::new(50.0, 75.0)],
        ..Monitor::new("wide")
    }
}

fn params(names: &[&str]) -> ValidateParams {
    ValidateParams {
        clock_ranges: vec![ClockRange::new(12_000, 110_000)],
        lookup: Lookup::new(LookupStrategy::FirstMatch),
        ..Default::default()
    }
    .with_mode_names(names.iter().copied())
}

fn statuses(screen: &Screen) -> Vec<(&str, ModeStatus)> {
    screen
        .modes
        .iter()
        .map(|mode| (mode.name.as_str(), mode.status))
        .collect()
}

#[test]
fn discrete_clocks_match_exactly() {
    init_tracing();
    let mut screen = Screen::new(
        "classic",
        ClockSource::Discrete(vec![25175, 28322, 65000]),
        classic_monitor(),
    );
    let accepted = screen
        .validate_modes(&[vga(), xga()], &params(&["640x480", "1024x768"]), None)
        .unwrap();

    assert_eq!(accepted, 2);
    assert_eq!(
        statuses(&screen),
        [("640x480", ModeStatus::Ok), ("1024x768", ModeStatus::Ok)]
    );
    assert_eq!(
        screen.geometry,
        Geometry {
            virtual_x: 1024,
            virtual_y: 768,
            display_width: 1024,
        }
    );
    assert_eq!(screen.virtual_from, VirtualFrom::Negotiated);

    let clocks: Vec<_> = screen
        .modes
        .iter()
        .map(|m| (m.clock, m.clock_index, m.synth_clock))
        .collect();
    assert_eq!(clocks, [(25175, Some(0), 25175), (65000, Some(2), 65000)]);
    assert!(screen
        .modes
        .iter()
        .all(|m| m.mode_type.contains(ModeType::USERDEF | ModeType::DRIVER)));
    screen.print_modes();
}

#[test]
fn unreachable_clock_is_rejected() {
    init_tracing();
    let mut screen = Screen::new("classic", ClockSource::Discrete(vec![25000]), classic_monitor());
    let accepted = screen
        .validate_modes(&[vga(), xga()], &params(&["640x480", "1024x768"]), None)
        .unwrap();

    assert_eq!(accepted, 1);
    assert_eq!(
        statuses(&screen),
        [("640x480", ModeStatus::Ok), ("1024x768", ModeStatus::NoClock)]
    );
    assert_eq!((screen.geometry.virtual_x, screen.geometry.virtual_y), (640, 480));
    assert_eq!(screen.modes.first().map(|m| m.clock), Some(25000));
}

#[test]
fn repeated_runs_are_idempotent() {
    let available = [vga(), svga(), xga()];
    let p = params(&["1024x768", "640x480", "1280x1024"]);

    let mut reused = Screen::new("s", ClockSource::Discrete(vec![25000]), wide_monitor());
    reused.validate_modes(&available, &p, None).unwrap();
    let first_modes = reused.modes.clone();
    let first_geometry = reused.geometry;

    reused.validate_modes(&available, &p, None).unwrap();
    assert_eq!(reused.modes, first_modes);
    assert_eq!(reused.geometry, first_geometry);

    let mut fresh = Screen::new("s", ClockSource::Discrete(vec![25000]), wide_monitor());
    fresh.validate_modes(&available, &p, None).unwrap();
    assert_eq!(fresh.modes, first_modes);
    assert_eq!(fresh.geometry, first_geometry);
}

#[test]
fn illegal_modes_never_get_accepted() {
    let mut bad = driver_mode("bad", 25175, (640, 620, 752, 800), (480, 490, 492, 525));
    bad.mode_type |= ModeType::USERDEF;
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let mut p = params(&["bad", "800x600"]);
    p.validate_all_pool_modes = true;

    let accepted = screen.validate_modes(&[bad, vga(), svga()], &p, None).unwrap();
    assert_eq!(accepted, 2);
    assert_eq!(
        screen.modes.iter().find(|m| m.name == "bad").map(|m| m.status),
        Some(ModeStatus::NoMode)
    );

    screen.prune_driver_modes();
    assert!(screen.modes.iter().all(|m| m.name != "bad" && m.status.is_ok()));
    assert!(screen.pool().is_none());
}

#[test]
fn geometry_only_grows() {
    struct Geometries(Vec<Geometry>);
    impl ModeDriver for Geometries {
        fn validate_final(&mut self, _mode: &DisplayMode, geometry: &Geometry) -> ModeStatus {
            self.0.push(*geometry);
            ModeStatus::Ok
        }
    }

    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let mut seen = Geometries(Vec::new());
    let accepted = screen
        .validate_modes(
            &[xga(), vga(), svga()],
            &params(&["640x480", "800x600", "1024x768"]),
            Some(&mut seen),
        )
        .unwrap();

    assert_eq!(accepted, 3);
    assert_eq!(seen.0.len(), 3);
    for pair in seen.0.windows(2) {
        assert!(pair[1].virtual_x >= pair[0].virtual_x);
        assert!(pair[1].virtual_y >= pair[0].virtual_y);
        assert!(pair[1].display_width >= pair[0].display_width);
    }
    assert_eq!(seen.0.last(), Some(&screen.geometry));
}

#[test]
fn pool_modes_cannot_grow_the_virtual_size() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let mut p = params(&["640x480"]);
    p.validate_all_pool_modes = true;

    let accepted = screen.validate_modes(&[vga(), xga()], &p, None).unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(
        statuses(&screen),
        [("640x480", ModeStatus::Ok), ("1024x768", ModeStatus::VirtualX)]
    );
    assert_eq!((screen.geometry.virtual_x, screen.geometry.virtual_y), (640, 480));
}

#[test]
fn driver_can_veto_modes() {
    #[derive(Default)]
    struct NoXga {
        provisional: Vec<String>,
    }
    impl ModeDriver for NoXga {
        fn validate_provisional(&mut self, mode: &mut DisplayMode) -> ModeStatus {
            self.provisional.push(mode.name.clone());
            // A rate reported here still has to pass the monitor check.
            if mode.name == "800x600" {
                mode.hsync = Some(80.0);
            }
            ModeStatus::Ok
        }

        fn validate_final(&mut self, mode: &DisplayMode, _geometry: &Geometry) -> ModeStatus {
            if mode.h_display > 800 {
                ModeStatus::Bad
            } else {
                ModeStatus::Ok
            }
        }
    }

    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let mut driver = NoXga::default();
    let accepted = screen
        .validate_modes(
            &[vga(), svga(), xga()],
            &params(&["640x480", "800x600", "1024x768"]),
            Some(&mut driver),
        )
        .unwrap();

    assert_eq!(driver.provisional, ["640x480", "800x600", "1024x768"]);
    assert_eq!(accepted, 1);
    assert_eq!(
        statuses(&screen),
        [
            ("640x480", ModeStatus::Ok),
            ("800x600", ModeStatus::NoMode),
            ("1024x768", ModeStatus::Bad),
        ]
    );
    assert_eq!(screen.geometry.virtual_x, 640);
}

#[test]
fn autofill_estimates_and_picks_largest() {
    init_tracing();
    let huge = driver_mode("1280x1024", 108000, (1280, 1328, 1440, 1688), (1024, 1025, 1028, 1066));
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());

    let accepted = screen.validate_modes(&[vga(), svga(), huge], &params(&[]), None).unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(statuses(&screen), [("800x600", ModeStatus::Ok)]);
    assert!(screen
        .modes
        .first()
        .is_some_and(|m| m.mode_type.contains(ModeType::USERDEF)));
    assert_eq!(
        screen.geometry,
        Geometry {
            virtual_x: 800,
            virtual_y: 600,
            display_width: 800,
        }
    );
}

#[test]
fn inferred_virtual_size_shrinks_to_accepted_modes() {
    init_tracing();
    // 1024x768 sets the estimate but needs 48.4 kHz, which this monitor cannot do.
    let monitor = Monitor {
        hsync: vec![SyncRange::new(30.0, 40.0)],
        ..wide_monitor()
    };
    let mut screen = Screen::new("s", ClockSource::Programmable, monitor);

    let accepted = screen.validate_modes(&[vga(), svga(), xga()], &params(&[]), None).unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(statuses(&screen), [("800x600", ModeStatus::Ok)]);
    assert_eq!(
        screen.geometry,
        Geometry {
            virtual_x: 800,
            virtual_y: 600,
            display_width: 1024,
        }
    );
}

#[test]
fn target_refresh_prefers_faster_modes() {
    let fast = driver_mode("640x480@72", 31500, (640, 664, 704, 832), (480, 489, 492, 520));
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        target_refresh: Some(70.0),
        validate_all_pool_modes: true,
        ..params(&[])
    };

    let accepted = screen.validate_modes(&[vga(), fast], &p, None).unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(statuses(&screen), [("640x480@72", ModeStatus::Ok)]);
}

#[test]
fn strategies_choose_between_same_named_modes() {
    let slow = driver_mode("800x600", 36000, (800, 824, 896, 1024), (600, 601, 603, 625));
    let available = [svga(), slow];
    let clocks = ClockSource::Discrete(vec![36000, 39000]);

    let mut first = Screen::new("s", clocks.clone(), wide_monitor());
    first.validate_modes(&available, &params(&["800x600"]), None).unwrap();
    assert_eq!(first.modes.first().map(|m| m.clock), Some(39000));

    let mut closest = Screen::new("s", clocks.clone(), wide_monitor());
    let p = ValidateParams {
        lookup: Lookup::new(LookupStrategy::ClosestClock),
        ..params(&["800x600"])
    };
    closest.validate_modes(&available, &p, None).unwrap();
    assert_eq!(closest.modes.first().map(|m| m.clock), Some(36000));

    let mut refresh = Screen::new("s", clocks, wide_monitor());
    let p = ValidateParams {
        lookup: Lookup::new(LookupStrategy::BestRefresh),
        ..params(&["800x600"])
    };
    refresh.validate_modes(&available, &p, None).unwrap();
    assert_eq!(refresh.modes.first().map(|m| m.h_total), Some(1056));
}

#[test]
fn builtin_modes_are_trusted() {
    let mut builtin = vga().with_type(ModeType::BUILTIN);
    builtin.name = "text".to_string();
    builtin.clock_index = Some(3);
    builtin.synth_clock = 28322;
    let clocks = ClockSource::Discrete(vec![25175, 28322, 31500, 36000]);
    let mut screen = Screen::new("s", clocks, wide_monitor());

    let accepted = screen.validate_modes(&[builtin], &params(&["text"]), None).unwrap();
    assert_eq!(accepted, 1);
    let mode = screen.modes.first().cloned().unwrap_or_default();
    assert_eq!((mode.clock_index, mode.synth_clock), (Some(3), 28322));
    assert!(mode.mode_type.contains(ModeType::BUILTIN | ModeType::USERDEF));
}

#[test]
fn explicit_virtual_size_is_kept() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        virtual_x: 1200,
        virtual_y: 900,
        ..params(&["640x480", "1024x768"])
    };

    let accepted = screen
        .validate_modes(&[vga(), xga()], &p, Some(&mut AcceptAll))
        .unwrap();
    assert_eq!(accepted, 2);
    assert_eq!(screen.virtual_from, VirtualFrom::Config);
    assert_eq!(
        screen.geometry,
        Geometry {
            virtual_x: 1200,
            virtual_y: 900,
            display_width: 1200,
        }
    );
}

#[test]
fn explicit_virtual_size_needs_a_listed_pitch() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        virtual_x: 1024,
        virtual_y: 768,
        pitch: PitchConstraint::List(vec![640, 800, 0]),
        ..params(&["640x480"])
    };

    let err = screen.validate_modes(&[vga()], &p, None).unwrap_err();
    assert_eq!(
        err,
        ValidateError::VirtualWidthUnsupported {
            width: 1024,
            pitch: -1,
            min: 640,
            max: 800,
        }
    );
}

#[test]
fn pitch_list_drives_negotiated_pitch() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        pitch: PitchConstraint::List(vec![640, 1024, 2048]),
        ..params(&["640x480", "800x600"])
    };

    let accepted = screen.validate_modes(&[vga(), svga()], &p, None).unwrap();
    assert_eq!(accepted, 2);
    assert_eq!(screen.geometry.display_width, 1024);
}

#[test]
fn virtual_size_must_fit_video_memory() {
    let fixed_pitch = |_: &FbFormat, r: PitchRequest| (r.x <= 2048).then_some(2048);
    let format = FbFormat {
        depth: 16,
        bits_per_pixel: 16,
        scanline_pad: 32,
    };
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor())
        .with_video_ram_kb(3000)
        .with_fb_format(format)
        .with_scanline(fixed_pitch);

    let accepted = screen
        .validate_modes(
            &[vga(), svga(), xga()],
            &params(&["640x480", "800x600", "1024x768"]),
            None,
        )
        .unwrap();
    assert_eq!(accepted, 2);
    assert_eq!(
        statuses(&screen),
        [
            ("640x480", ModeStatus::Ok),
            ("800x600", ModeStatus::Ok),
            ("1024x768", ModeStatus::MemVirt),
        ]
    );
    assert_eq!(
        screen.geometry,
        Geometry {
            virtual_x: 800,
            virtual_y: 600,
            display_width: 2048,
        }
    );
}

#[test]
fn final_height_below_minimum_fails() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        min_height: 1000,
        ..params(&["640x480"])
    };

    let err = screen.validate_modes(&[vga()], &p, None).unwrap_err();
    assert_eq!(
        err,
        ValidateError::FinalVirtualHeightTooSmall {
            height: 480,
            min: 1000,
        }
    );
}

#[test]
fn missing_discrete_clocks_fail_the_run() {
    let mut screen = Screen::new("s", ClockSource::Discrete(Vec::new()), wide_monitor());
    let err = screen.validate_modes(&[vga()], &params(&["640x480"]), None).unwrap_err();
    assert_eq!(err, ValidateError::NoClocks);
}

#[test]
fn empty_pool_accepts_nothing() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let accepted = screen.validate_modes(&[], &params(&["640x480"]), None).unwrap();
    assert_eq!(accepted, 0);
    assert!(screen.pool().is_none());
}

#[test]
fn empty_pool_clears_previous_results() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = params(&["640x480"]);
    assert_eq!(screen.validate_modes(&[vga()], &p, None).unwrap(), 1);
    assert_eq!(screen.modes.len(), 1);

    screen.drop_pool();
    assert_eq!(screen.validate_modes(&[], &p, None).unwrap(), 0);
    assert!(screen.modes.is_empty());
    assert_eq!(
        screen.geometry,
        Geometry {
            virtual_x: 0,
            virtual_y: 0,
            display_width: -1,
        }
    );
}

#[test]
fn default_monitor_ranges_are_installed() {
    let mut screen = Screen::new("s", ClockSource::Programmable, Monitor::new("unknown"));
    let accepted = screen
        .validate_modes(&[vga(), xga()], &params(&["640x480", "1024x768"]), None)
        .unwrap();

    assert_eq!(accepted, 1);
    assert_eq!(screen.monitor.hsync, [SyncRange::new(31.5, 37.9)]);
    assert_eq!(screen.monitor.vrefresh, [SyncRange::new(50.0, 70.0)]);
    assert_eq!(
        statuses(&screen),
        [("640x480", ModeStatus::Ok), ("1024x768", ModeStatus::NoMode)]
    );
}

#[test]
fn runtime_check_uses_stored_ranges() {
    let mut screen = Screen::new(
        "s",
        ClockSource::Discrete(vec![25175, 28322, 65000]),
        classic_monitor(),
    );
    screen
        .validate_modes(&[vga(), xga()], &params(&["640x480", "1024x768"]), None)
        .unwrap();
    assert_eq!(screen.clock_ranges().len(), 1);

    let mut candidate = svga().with_flags(ModeFlags::PHSYNC);
    candidate.clock = 28000;
    assert_eq!(screen.check_mode_for_driver(&mut candidate), ModeStatus::Ok);
    assert_eq!(candidate.clock_index, Some(1));
    assert_eq!(candidate.clock, 28322);

    let mut too_wide =
        driver_mode("1280x1024", 108000, (1280, 1328, 1440, 1688), (1024, 1025, 1028, 1066));
    assert_eq!(screen.check_mode_for_driver(&mut too_wide), ModeStatus::VirtualX);
}

#[test]
fn crtc_setup_after_validation() {
    let interlaced = driver_mode("1024x768i", 44900, (1024, 1032, 1208, 1264), (768, 768, 776, 817))
        .with_flags(ModeFlags::INTERLACE);
    let monitor = Monitor {
        vrefresh: vec![SyncRange::new(50.0, 90.0)],
        ..wide_monitor()
    };
    let mut screen = Screen::new("s", ClockSource::Programmable, monitor);
    let mut p = params(&["1024x768i"]);
    p.clock_ranges[0].interlace_allowed = true;

    let accepted = screen.validate_modes(&[interlaced], &p, None).unwrap();
    assert_eq!(accepted, 1);

    screen.set_crtc_for_modes(modeval::AdjustFlags::INTERLACE_HALVE_V);
    let crtc = screen.modes.first().map(|m| m.crtc).unwrap_or_default();
    assert_eq!(crtc.v_display, 384);
    assert_eq!(crtc.v_total % 2, 1);
}

#[test]
fn huge_virtual_width_is_rejected() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        virtual_x: i32::MAX,
        virtual_y: 768,
        ..params(&["640x480"])
    };

    let err = screen.validate_modes(&[vga()], &p, None).unwrap_err();
    assert_eq!(
        err,
        ValidateError::VirtualWidthUnsupported {
            width: i32::MAX,
            pitch: -1,
            min: 0,
            max: i32::MAX,
        }
    );
}

#[test]
fn autofill_skips_narrow_blanking() {
    // 1056 / 960 is below the blanking ratio autofill expects from ordinary timings.
    let narrow = || {
        DisplayMode::new("960x600", 39000, (960, 968, 1000, 1056), (600, 603, 609, 620))
    };
    let default_vga = vga().with_type(ModeType::DEFAULT);
    let run = |monitor: Monitor, narrow: DisplayMode| {
        let mut screen = Screen::new("s", ClockSource::Programmable, monitor);
        let accepted = screen
            .validate_modes(&[default_vga.clone(), narrow], &params(&[]), None)
            .unwrap();
        assert_eq!(accepted, 1);
        screen.modes.first().map(|m| m.name.clone()).unwrap_or_default()
    };

    let default_narrow = narrow().with_type(ModeType::DEFAULT);
    assert_eq!(run(wide_monitor(), default_narrow.clone()), "640x480");

    let reduced = Monitor {
        reduced_blanking: true,
        ..wide_monitor()
    };
    assert_eq!(run(reduced, default_narrow), "960x600");

    let driver_narrow = narrow().with_type(ModeType::DRIVER);
    assert_eq!(run(wide_monitor(), driver_narrow.clone()), "960x600");

    let strict = Monitor {
        reduced_blanking_policy: ReducedBlankingPolicy::Strict,
        ..wide_monitor()
    };
    assert_eq!(run(strict, driver_narrow), "640x480");
}

/// Vetoes every mode running at one of the listed clocks, with the paired status.
struct ClockVeto(Vec<(i32, ModeStatus)>);

impl ModeDriver for ClockVeto {
    fn validate_final(&mut self, mode: &DisplayMode, _geometry: &Geometry) -> ModeStatus {
        self.0
            .iter()
            .find(|(clock, _)| *clock == mode.clock)
            .map_or(ModeStatus::Ok, |&(_, status)| status)
    }
}

#[test]
fn vetoed_entry_falls_back_to_same_named_mode() {
    init_tracing();
    let slow = driver_mode("800x600", 36000, (800, 824, 896, 1024), (600, 601, 603, 625));
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let mut driver = ClockVeto(vec![(40000, ModeStatus::Bad)]);

    let accepted = screen
        .validate_modes(&[svga(), slow], &params(&["800x600"]), Some(&mut driver))
        .unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(statuses(&screen), [("800x600", ModeStatus::Ok)]);
    assert_eq!(screen.modes.first().map(|m| m.clock), Some(36000));
}

#[test]
fn vetoed_request_keeps_the_driver_reason() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let mut driver = ClockVeto(vec![(40000, ModeStatus::Bad)]);

    let accepted = screen
        .validate_modes(&[svga()], &params(&["800x600"]), Some(&mut driver))
        .unwrap();
    assert_eq!(accepted, 0);
    assert_eq!(statuses(&screen), [("800x600", ModeStatus::Bad)]);
}

#[test]
fn max_height_limits_growth() {
    let mut screen = Screen::new("s", ClockSource::Programmable, wide_monitor());
    let p = ValidateParams {
        max_height: 700,
        ..params(&["1024x768", "800x600"])
    };

    let accepted = screen.validate_modes(&[svga(), xga()], &p, None).unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(
        statuses(&screen),
        [("1024x768", ModeStatus::VirtualY), ("800x600", ModeStatus::Ok)]
    );
    assert_eq!((screen.geometry.virtual_x, screen.geometry.virtual_y), (800, 600));
}
