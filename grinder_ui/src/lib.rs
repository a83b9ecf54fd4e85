#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Text rendering of controller status.
//!
//! Produces the lines a small display would show for a `StatusSnapshot`.
//! The selected entry of a list is marked with `"> "`, others are indented
//! by two spaces. An asleep display renders as no lines at all.

use std::time::Duration;

use grinder_core::menu::MenuItem;
use grinder_core::{FailReason, ProcessState, StatusBoard, StatusSnapshot};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn grams(g: f64) -> String {
    format!("{g:.1}g")
}

fn seconds(ms: u64) -> String {
    format!("{:.1}s", Duration::from_millis(ms).as_secs_f64())
}

fn choice(label: &str, selected: bool) -> String {
    if selected {
        format!("> {label}")
    } else {
        format!("  {label}")
    }
}

/// What the display shows: a procedure's prompt while one holds the
/// display, the rendered snapshot otherwise.
pub fn render_board(board: &StatusBoard) -> Vec<String> {
    if board.display_locked() {
        if let Some(prompt) = board.prompt() {
            return render_prompt(&prompt);
        }
    }
    render(&board.snapshot())
}

pub fn render_prompt(prompt: &str) -> Vec<String> {
    prompt.lines().map(str::to_owned).collect()
}

pub fn render(s: &StatusSnapshot) -> Vec<String> {
    if s.display_asleep {
        return Vec::new();
    }
    if s.state.is_menu() {
        return render_menu(s);
    }
    if !s.sensor_ready {
        return vec!["SCALE ERROR".to_owned()];
    }
    match s.state {
        ProcessState::Empty => vec![
            "Weight:".to_owned(),
            grams(s.weight_g.abs()),
            format!("Set: {}", grams(s.profile.target_weight_g)),
        ],
        ProcessState::GrindingInProgress => shot_screen("Grinding...", s),
        ProcessState::GrindingFinished => shot_screen("Grinding finished", s),
        ProcessState::GrindingFailed => {
            let mut lines = vec!["Grinding failed".to_owned()];
            if let Some(reason) = s.fail_reason {
                lines.push(fail_text(reason).to_owned());
            }
            lines.push("Press the balance".to_owned());
            lines.push("to reset".to_owned());
            lines
        }
        ProcessState::InMenu | ProcessState::InSubmenu | ProcessState::InfoMenu => Vec::new(),
    }
}

fn fail_text(reason: FailReason) -> &'static str {
    match reason {
        FailReason::NonPositiveWeight => "Weight lost",
        FailReason::SensorNotReady => "Scale not ready",
        FailReason::Timeout => "Took too long",
        FailReason::Stall => "No grounds coming",
        FailReason::CupRemoved => "Cup removed",
        FailReason::Cancelled => "Cancelled",
    }
}

fn shot_screen(title: &str, s: &StatusSnapshot) -> Vec<String> {
    let target = s
        .session
        .map_or(s.profile.target_weight_g, |sess| sess.target_weight_g);
    vec![
        title.to_owned(),
        format!("{} -> {}", grams(s.dose_g.unwrap_or(0.0)), grams(target)),
        seconds(s.grind_elapsed_ms.unwrap_or(0)),
    ]
}

fn render_menu(s: &StatusSnapshot) -> Vec<String> {
    match s.state {
        ProcessState::InfoMenu => vec![
            "System Info".to_owned(),
            format!("Cup Weight: {}", grams(s.profile.cup_weight_g)),
            format!("Offset: {:.2}g", s.profile.offset_g),
            format!("Shots: {}", s.profile.shot_count),
            format!("Version: {VERSION}"),
        ],
        ProcessState::InSubmenu => match s.menu.current_setting {
            Some(item) => render_setting(item, s),
            None => menu_list(s),
        },
        _ => menu_list(s),
    }
}

/// Previous, current (marked) and next item; the list wraps.
fn menu_list(s: &StatusSnapshot) -> Vec<String> {
    let items = MenuItem::visible(s.diagnostic_mode);
    let n = items.len();
    let i = items
        .iter()
        .position(|&it| it == s.menu.current_item)
        .unwrap_or(0);
    vec![
        "Menu".to_owned(),
        choice(items[(i + n - 1) % n].label(), false),
        choice(items[i].label(), true),
        choice(items[(i + 1) % n].label(), false),
    ]
}

fn render_setting(item: MenuItem, s: &StatusSnapshot) -> Vec<String> {
    let p = &s.profile;
    match item {
        MenuItem::CupWeight => vec![
            "Cup Weight".to_owned(),
            grams(s.weight_g),
            "Place cup on scale".to_owned(),
            "and press button".to_owned(),
        ],
        MenuItem::Calibrate => vec![
            "Calibration".to_owned(),
            "Place 100g weight".to_owned(),
            "on scale and".to_owned(),
            "press button".to_owned(),
        ],
        MenuItem::Offset => vec!["Adjust offset".to_owned(), format!("{:.2}g", p.offset_g)],
        MenuItem::ScaleMode => vec![
            "Set Scale Mode".to_owned(),
            choice("GBW", !p.scale_mode),
            choice("Scale only", p.scale_mode),
        ],
        MenuItem::GrindMode => vec![
            "Set Grinder".to_owned(),
            "Start/Stop Mode".to_owned(),
            choice("Continuous", p.grind_mode),
            choice("Impulse", !p.grind_mode),
        ],
        MenuItem::SleepTimer => vec![
            "Adjust Sleep Timer".to_owned(),
            format!("Timer: {} sec", p.sleep_timeout_ms / 1000),
            "Turn to adjust".to_owned(),
        ],
        MenuItem::Reset => vec![
            "Reset to defaults?".to_owned(),
            choice("Confirm", s.menu.reset_confirm),
            choice("Cancel", !s.menu.reset_confirm),
        ],
        MenuItem::Diagnostics => vec![
            "Diagnostics".to_owned(),
            format!("Raw: {}", grams(s.weight_g)),
            format!("Factor: {:.4}", p.scale_factor),
        ],
        MenuItem::Info | MenuItem::Exit => menu_list(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grinder_core::GrindSession;
    use grinder_core::status::MenuContext;
    use rstest::rstest;

    fn snap(state: ProcessState) -> StatusSnapshot {
        StatusSnapshot {
            state,
            sensor_ready: true,
            ..StatusSnapshot::default()
        }
    }

    #[test]
    fn idle_shows_weight_and_target() {
        let s = StatusSnapshot {
            weight_g: -0.3,
            ..snap(ProcessState::Empty)
        };
        assert_eq!(render(&s), vec!["Weight:", "0.3g", "Set: 18.0g"]);
    }

    #[test]
    fn grinding_shows_dose_target_and_time() {
        let s = StatusSnapshot {
            session: Some(GrindSession {
                target_weight_g: 18.0,
                offset_g: 2.0,
                cup_empty_weight_g: 200.0,
                started_at_ms: Some(1000),
                finished_at_ms: None,
            }),
            dose_g: Some(7.3),
            grind_elapsed_ms: Some(4300),
            ..snap(ProcessState::GrindingInProgress)
        };
        assert_eq!(render(&s), vec!["Grinding...", "7.3g -> 18.0g", "4.3s"]);
    }

    #[test]
    fn failure_names_the_reason() {
        let s = StatusSnapshot {
            fail_reason: Some(FailReason::Stall),
            ..snap(ProcessState::GrindingFailed)
        };
        let lines = render(&s);
        assert_eq!(lines[0], "Grinding failed");
        assert!(lines.contains(&"No grounds coming".to_owned()));
    }

    #[test]
    fn sensor_fault_replaces_idle_screen() {
        let s = StatusSnapshot {
            sensor_ready: false,
            ..snap(ProcessState::Empty)
        };
        assert_eq!(render(&s), vec!["SCALE ERROR"]);
    }

    #[test]
    fn asleep_renders_nothing() {
        let s = StatusSnapshot {
            display_asleep: true,
            ..snap(ProcessState::Empty)
        };
        assert!(render(&s).is_empty());
    }

    #[test]
    fn menu_wraps_around_the_first_item() {
        let s = snap(ProcessState::InMenu);
        assert_eq!(
            render(&s),
            vec!["Menu", "  Reset", "> Cup weight", "  Calibrate"]
        );
    }

    #[rstest]
    #[case(MenuItem::ScaleMode, "> GBW")]
    #[case(MenuItem::GrindMode, "> Impulse")]
    #[case(MenuItem::Reset, "> Cancel")]
    #[case(MenuItem::SleepTimer, "Timer: 60 sec")]
    #[case(MenuItem::Offset, "2.00g")]
    fn submenus_show_current_value(#[case] item: MenuItem, #[case] expected: &str) {
        let s = StatusSnapshot {
            menu: MenuContext {
                current_item: item,
                current_setting: Some(item),
                reset_confirm: false,
            },
            ..snap(ProcessState::InSubmenu)
        };
        let lines = render(&s);
        assert!(lines.iter().any(|l| l == expected), "{lines:?}");
    }

    #[test]
    fn info_lists_profile_and_version() {
        let lines = render(&snap(ProcessState::InfoMenu));
        assert_eq!(lines[0], "System Info");
        assert_eq!(lines[1], "Cup Weight: 200.0g");
        assert_eq!(lines[3], "Shots: 0");
        assert!(lines[4].starts_with("Version: "));
    }

    #[test]
    fn locked_board_shows_the_prompt() {
        let board = StatusBoard::new();
        board.publish(snap(ProcessState::Empty));
        {
            let guard = board.lock_display();
            guard.set_prompt("Cup Weight Set:\n150.0g");
            assert_eq!(render_board(&board), vec!["Cup Weight Set:", "150.0g"]);
        }
        assert_eq!(render_board(&board)[0], "Weight:");
    }
}
