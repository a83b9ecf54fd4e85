use grinder_core::config::{FactoryDefaults, FilterCfg, InputCfg, MenuCfg};
use grinder_core::filter::SignalFilter;
use grinder_core::menu::MenuNavigator;
use grinder_core::{CalibrationProfile, InputEvent, MenuItem, ProcessState, WeightHistory};
use proptest::prelude::*;

fn history_from(points: &[(u64, f64)]) -> WeightHistory {
    let mut h = WeightHistory::new(64);
    for &(dt, g) in points {
        let ts = h.latest().map_or(0, |s| s.ts_ms) + dt;
        h.push(ts, g);
    }
    h
}

proptest! {
    #[test]
    fn window_stats_are_ordered(
        points in prop::collection::vec((0u64..200, -50.0f64..500.0), 1..120),
        back in 0u64..5000,
    ) {
        let h = history_from(&points);
        prop_assert!(h.len() <= h.capacity());
        let now = h.latest().map_or(0, |s| s.ts_ms);
        let since = now.saturating_sub(back);
        let min = h.min_since(since).unwrap();
        let max = h.max_since(since).unwrap();
        let avg = h.average_since(since);
        prop_assert!(min <= max);
        prop_assert!(avg >= min - 1e-9 && avg <= max + 1e-9);
    }

    #[test]
    fn steady_input_converges_to_a_quantized_value(weight in 0.0f64..900.0) {
        let cfg = FilterCfg::default();
        let quantum = cfg.quantum_g;
        let mut f = SignalFilter::new(cfg);
        let mut last = 0.0;
        for _ in 0..200 {
            if let Some(v) = f.apply(weight) {
                last = v;
            }
        }
        prop_assert!((last - weight).abs() <= quantum + 0.15 + 1e-9);
        let steps = last / quantum;
        prop_assert!((steps - steps.round()).abs() < 1e-6);
    }

    #[test]
    fn single_outlier_never_moves_the_output(
        base in 0.0f64..100.0,
        spike in 1200.0f64..10_000.0,
    ) {
        let mut f = SignalFilter::new(FilterCfg::default());
        for _ in 0..100 {
            f.apply(base);
        }
        let before = f.last();
        prop_assert_eq!(f.apply(base + spike), None);
        prop_assert_eq!(f.last(), before);
    }

    #[test]
    fn offset_editing_stays_below_target(
        target in 1.0f64..60.0,
        turns in prop::collection::vec(-50i32..50, 1..40),
    ) {
        let cfg = MenuCfg::default();
        let step = cfg.offset_step_g;
        let mut nav = MenuNavigator::new(cfg, &InputCfg::default(), FactoryDefaults::default());
        let mut profile = CalibrationProfile { target_weight_g: target, ..CalibrationProfile::default() };
        profile.offset_g = profile.offset_g.clamp(-(target - step), target - step);

        nav.handle(InputEvent::Rotate(2), ProcessState::InMenu, &mut profile);
        prop_assert_eq!(nav.current_item(), MenuItem::Offset);
        nav.handle(InputEvent::Click, ProcessState::InMenu, &mut profile);
        for d in turns {
            nav.handle(InputEvent::Rotate(d), ProcessState::InSubmenu, &mut profile);
            prop_assert!(profile.offset_g.abs() < target);
        }
    }
}
