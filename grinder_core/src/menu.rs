//! Menu navigation and settings editing.
//!
//! `MenuNavigator::handle` routes one input event given the current process
//! state. It edits the profile in place and returns what the control task
//! must do next (state change, persistence, acceleration, procedures).

use crate::config::{FactoryDefaults, InputCfg, MenuCfg};
use crate::input::InputEvent;
use crate::procedures::Procedure;
use crate::profile::{CalibrationProfile, ProfileField};
use crate::status::{MenuContext, ProcessState};
use crate::util::quantize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    CupWeight,
    Calibrate,
    Offset,
    ScaleMode,
    GrindMode,
    Info,
    SleepTimer,
    Exit,
    Reset,
    Diagnostics,
}

const BASE_ITEMS: [MenuItem; 9] = [
    MenuItem::CupWeight,
    MenuItem::Calibrate,
    MenuItem::Offset,
    MenuItem::ScaleMode,
    MenuItem::GrindMode,
    MenuItem::Info,
    MenuItem::SleepTimer,
    MenuItem::Exit,
    MenuItem::Reset,
];

const DIAGNOSTIC_ITEMS: [MenuItem; 10] = [
    MenuItem::CupWeight,
    MenuItem::Calibrate,
    MenuItem::Offset,
    MenuItem::ScaleMode,
    MenuItem::GrindMode,
    MenuItem::Info,
    MenuItem::SleepTimer,
    MenuItem::Exit,
    MenuItem::Reset,
    MenuItem::Diagnostics,
];

impl MenuItem {
    /// Items in display order; `Diagnostics` only in diagnostic mode.
    pub fn visible(diagnostics: bool) -> &'static [Self] {
        if diagnostics {
            &DIAGNOSTIC_ITEMS
        } else {
            &BASE_ITEMS
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CupWeight => "Cup weight",
            Self::Calibrate => "Calibrate",
            Self::Offset => "Offset",
            Self::ScaleMode => "Scale Mode",
            Self::GrindMode => "Grinding Mode",
            Self::Info => "Info Menu",
            Self::SleepTimer => "Sleep Timer",
            Self::Exit => "Exit",
            Self::Reset => "Reset",
            Self::Diagnostics => "Diagnostics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Persist(ProfileField),
    SetAcceleration(u32),
    RunProcedure(Procedure),
    Tare,
    CancelGrind,
    AcknowledgeFailure,
    DiagnosticsChanged(bool),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MenuOutcome {
    pub next: Option<ProcessState>,
    pub actions: Vec<MenuAction>,
}

impl MenuOutcome {
    fn none() -> Self {
        Self::default()
    }

    fn go(next: ProcessState) -> Self {
        Self {
            next: Some(next),
            actions: Vec::new(),
        }
    }

    fn with(mut self, action: MenuAction) -> Self {
        self.actions.push(action);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MenuNavigator {
    cfg: MenuCfg,
    default_acceleration: u32,
    fine_acceleration: u32,
    defaults: FactoryDefaults,
    index: usize,
    setting: Option<MenuItem>,
    reset_confirm: bool,
    diagnostics: bool,
    /// Field edited in the open submenu but not yet stored.
    dirty: Option<ProfileField>,
}

impl MenuNavigator {
    pub fn new(cfg: MenuCfg, input: &InputCfg, defaults: FactoryDefaults) -> Self {
        Self {
            cfg,
            default_acceleration: input.default_acceleration,
            fine_acceleration: input.fine_acceleration,
            defaults,
            index: 0,
            setting: None,
            reset_confirm: false,
            diagnostics: false,
            dirty: None,
        }
    }

    pub fn current_item(&self) -> MenuItem {
        let items = MenuItem::visible(self.diagnostics);
        items[self.index.min(items.len() - 1)]
    }

    pub const fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    pub fn context(&self) -> MenuContext {
        MenuContext {
            current_item: self.current_item(),
            current_setting: self.setting,
            reset_confirm: self.reset_confirm,
        }
    }

    /// A guided procedure finished (either way); back to the menu list.
    pub fn finish_procedure(&mut self) -> ProcessState {
        self.setting = None;
        ProcessState::InMenu
    }

    pub fn handle(
        &mut self,
        ev: InputEvent,
        state: ProcessState,
        profile: &mut CalibrationProfile,
    ) -> MenuOutcome {
        if ev == InputEvent::RapidRepeat {
            self.diagnostics = !self.diagnostics;
            let count = MenuItem::visible(self.diagnostics).len();
            if self.index >= count {
                self.index = count - 1;
            }
            if !self.diagnostics && self.setting == Some(MenuItem::Diagnostics) {
                self.setting = None;
                return MenuOutcome::go(ProcessState::InMenu)
                    .with(MenuAction::DiagnosticsChanged(false));
            }
            tracing::info!(enabled = self.diagnostics, "diagnostic mode toggled");
            return MenuOutcome::none().with(MenuAction::DiagnosticsChanged(self.diagnostics));
        }

        match state {
            ProcessState::Empty => self.handle_idle(ev, profile),
            ProcessState::GrindingInProgress => match ev {
                InputEvent::Click => MenuOutcome::none().with(MenuAction::CancelGrind),
                _ => MenuOutcome::none(),
            },
            ProcessState::GrindingFailed => match ev {
                InputEvent::Click => MenuOutcome::none().with(MenuAction::AcknowledgeFailure),
                _ => MenuOutcome::none(),
            },
            ProcessState::GrindingFinished => MenuOutcome::none(),
            ProcessState::InMenu => match ev {
                InputEvent::Rotate(d) => {
                    let count = i64::try_from(MenuItem::visible(self.diagnostics).len()).unwrap_or(1);
                    let current = i64::try_from(self.index).unwrap_or(0);
                    let next = (current + i64::from(d)).rem_euclid(count);
                    self.index = usize::try_from(next).unwrap_or(0);
                    MenuOutcome::none()
                }
                InputEvent::Click => self.select(),
                InputEvent::DoubleClick | InputEvent::LongPress => self.exit_to_idle(),
                InputEvent::RapidRepeat => MenuOutcome::none(),
            },
            ProcessState::InSubmenu => match ev {
                InputEvent::Rotate(d) => {
                    self.edit(d, profile);
                    MenuOutcome::none()
                }
                InputEvent::Click => self.confirm(profile),
                InputEvent::DoubleClick => self.back_to_menu(),
                InputEvent::LongPress => self.exit_to_idle(),
                InputEvent::RapidRepeat => MenuOutcome::none(),
            },
            ProcessState::InfoMenu => match ev {
                InputEvent::Click | InputEvent::DoubleClick => MenuOutcome::go(ProcessState::InMenu),
                InputEvent::LongPress => self.exit_to_idle(),
                _ => MenuOutcome::none(),
            },
        }
    }

    fn handle_idle(&mut self, ev: InputEvent, profile: &mut CalibrationProfile) -> MenuOutcome {
        match ev {
            InputEvent::Click => {
                self.setting = None;
                MenuOutcome::go(ProcessState::InMenu)
            }
            InputEvent::DoubleClick => MenuOutcome::none().with(MenuAction::Tare),
            InputEvent::Rotate(d) => {
                let step = self.cfg.target_step_g;
                let target = quantize(
                    profile.target_weight_g + f64::from(d) * step,
                    step,
                )
                .clamp(self.cfg.target_min_g, self.cfg.target_max_g);
                profile.target_weight_g = target;
                let mut out = MenuOutcome::none().with(MenuAction::Persist(ProfileField::TargetWeight));
                let max_offset = (target - self.cfg.offset_step_g).max(0.0);
                if profile.offset_g.abs() > max_offset {
                    profile.offset_g = profile.offset_g.clamp(-max_offset, max_offset);
                    out = out.with(MenuAction::Persist(ProfileField::Offset));
                }
                tracing::debug!(target_g = target, "target weight changed");
                out
            }
            InputEvent::LongPress | InputEvent::RapidRepeat => MenuOutcome::none(),
        }
    }

    fn select(&mut self) -> MenuOutcome {
        let item = self.current_item();
        tracing::debug!(item = item.label(), "menu item selected");
        match item {
            MenuItem::Exit => self.exit_to_idle(),
            MenuItem::Info => MenuOutcome::go(ProcessState::InfoMenu),
            MenuItem::CupWeight => {
                self.setting = Some(item);
                MenuOutcome::go(ProcessState::InSubmenu)
                    .with(MenuAction::RunProcedure(Procedure::CupWeight))
            }
            MenuItem::Calibrate => {
                self.setting = Some(item);
                MenuOutcome::go(ProcessState::InSubmenu)
                    .with(MenuAction::RunProcedure(Procedure::Calibration))
            }
            MenuItem::Offset => {
                self.setting = Some(item);
                MenuOutcome::go(ProcessState::InSubmenu)
                    .with(MenuAction::SetAcceleration(self.fine_acceleration))
            }
            MenuItem::Reset => {
                self.setting = Some(item);
                self.reset_confirm = false;
                MenuOutcome::go(ProcessState::InSubmenu)
            }
            MenuItem::ScaleMode
            | MenuItem::GrindMode
            | MenuItem::SleepTimer
            | MenuItem::Diagnostics => {
                self.setting = Some(item);
                MenuOutcome::go(ProcessState::InSubmenu)
            }
        }
    }

    fn edit(&mut self, d: i32, profile: &mut CalibrationProfile) {
        match self.setting {
            Some(MenuItem::Offset) => {
                let step = self.cfg.offset_step_g;
                let limit = (profile.target_weight_g - step).max(0.0);
                profile.offset_g =
                    quantize(profile.offset_g + f64::from(d) * step, step).clamp(-limit, limit);
                self.dirty = Some(ProfileField::Offset);
            }
            Some(MenuItem::SleepTimer) => {
                let change = i64::from(d) * i64::from(self.cfg.sleep_step_ms);
                let next = (i64::from(profile.sleep_timeout_ms) + change).clamp(
                    i64::from(self.cfg.sleep_min_ms),
                    i64::from(self.cfg.sleep_max_ms),
                );
                profile.sleep_timeout_ms = u32::try_from(next).unwrap_or(self.cfg.sleep_max_ms);
                self.dirty = Some(ProfileField::SleepTimeout);
            }
            Some(MenuItem::Reset) if d % 2 != 0 => {
                self.reset_confirm = !self.reset_confirm;
            }
            _ => {}
        }
    }

    fn confirm(&mut self, profile: &mut CalibrationProfile) -> MenuOutcome {
        let mut out = MenuOutcome::go(ProcessState::InMenu);
        match self.setting {
            Some(MenuItem::Offset) => {
                out = out
                    .with(MenuAction::Persist(ProfileField::Offset))
                    .with(MenuAction::SetAcceleration(self.default_acceleration));
            }
            Some(MenuItem::SleepTimer) => {
                out = out.with(MenuAction::Persist(ProfileField::SleepTimeout));
            }
            Some(MenuItem::ScaleMode) => {
                profile.scale_mode = !profile.scale_mode;
                tracing::info!(timer_only = profile.scale_mode, "scale mode changed");
                out = out.with(MenuAction::Persist(ProfileField::ScaleMode));
            }
            Some(MenuItem::GrindMode) => {
                profile.grind_mode = !profile.grind_mode;
                tracing::info!(continuous = profile.grind_mode, "grind mode changed");
                out = out.with(MenuAction::Persist(ProfileField::GrindMode));
            }
            Some(MenuItem::Reset) => {
                if self.reset_confirm {
                    tracing::info!("settings reset to factory defaults");
                    profile.reset_to_factory(&self.defaults);
                    for field in [
                        ProfileField::TargetWeight,
                        ProfileField::Offset,
                        ProfileField::CupWeight,
                        ProfileField::ScaleMode,
                        ProfileField::GrindMode,
                        ProfileField::SleepTimeout,
                    ] {
                        out = out.with(MenuAction::Persist(field));
                    }
                }
                self.reset_confirm = false;
            }
            _ => {}
        }
        self.dirty = None;
        self.setting = None;
        out
    }

    fn leave_submenu(&mut self, mut out: MenuOutcome) -> MenuOutcome {
        if let Some(field) = self.dirty.take() {
            out = out.with(MenuAction::Persist(field));
        }
        self.setting = None;
        self.reset_confirm = false;
        out
    }

    fn back_to_menu(&mut self) -> MenuOutcome {
        let mut out = MenuOutcome::go(ProcessState::InMenu);
        if self.setting == Some(MenuItem::Offset) {
            out = out.with(MenuAction::SetAcceleration(self.default_acceleration));
        }
        self.leave_submenu(out)
    }

    fn exit_to_idle(&mut self) -> MenuOutcome {
        let out = MenuOutcome::go(ProcessState::Empty)
            .with(MenuAction::SetAcceleration(self.default_acceleration));
        self.leave_submenu(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> MenuNavigator {
        MenuNavigator::new(
            MenuCfg::default(),
            &InputCfg::default(),
            FactoryDefaults::default(),
        )
    }

    #[test]
    fn rotation_wraps_both_ways() {
        let mut n = nav();
        let mut p = CalibrationProfile::default();
        n.handle(InputEvent::Rotate(-1), ProcessState::InMenu, &mut p);
        assert_eq!(n.current_item(), MenuItem::Reset);
        n.handle(InputEvent::Rotate(2), ProcessState::InMenu, &mut p);
        assert_eq!(n.current_item(), MenuItem::Calibrate);
    }

    #[test]
    fn diagnostics_adds_an_item() {
        let mut n = nav();
        let mut p = CalibrationProfile::default();
        let out = n.handle(InputEvent::RapidRepeat, ProcessState::Empty, &mut p);
        assert_eq!(out.actions, vec![MenuAction::DiagnosticsChanged(true)]);
        n.handle(InputEvent::Rotate(-1), ProcessState::InMenu, &mut p);
        assert_eq!(n.current_item(), MenuItem::Diagnostics);
        n.handle(InputEvent::RapidRepeat, ProcessState::InMenu, &mut p);
        assert_eq!(n.current_item(), MenuItem::Reset);
    }

    #[test]
    fn offset_edit_uses_fine_steps_and_persists_on_click() {
        let mut n = nav();
        let mut p = CalibrationProfile::default();
        n.handle(InputEvent::Rotate(2), ProcessState::InMenu, &mut p);
        let enter = n.handle(InputEvent::Click, ProcessState::InMenu, &mut p);
        assert_eq!(enter.next, Some(ProcessState::InSubmenu));
        assert_eq!(enter.actions, vec![MenuAction::SetAcceleration(0)]);

        n.handle(InputEvent::Rotate(-5), ProcessState::InSubmenu, &mut p);
        assert!((p.offset_g - 1.95).abs() < 1e-9);

        let done = n.handle(InputEvent::Click, ProcessState::InSubmenu, &mut p);
        assert_eq!(done.next, Some(ProcessState::InMenu));
        assert_eq!(
            done.actions,
            vec![
                MenuAction::Persist(ProfileField::Offset),
                MenuAction::SetAcceleration(100)
            ]
        );
    }

    #[test]
    fn offset_bounds_hold_for_tiny_targets() {
        let mut n = MenuNavigator::new(
            MenuCfg {
                target_min_g: 0.005,
                ..MenuCfg::default()
            },
            &InputCfg::default(),
            FactoryDefaults::default(),
        );
        let mut p = CalibrationProfile {
            target_weight_g: 0.105,
            ..CalibrationProfile::default()
        };
        let out = n.handle(InputEvent::Rotate(-1), ProcessState::Empty, &mut p);
        assert!((p.target_weight_g - 0.005).abs() < 1e-12);
        assert_eq!(p.offset_g, 0.0);
        assert!(out.actions.contains(&MenuAction::Persist(ProfileField::Offset)));

        n.handle(InputEvent::Click, ProcessState::Empty, &mut p);
        n.handle(InputEvent::Rotate(2), ProcessState::InMenu, &mut p);
        n.handle(InputEvent::Click, ProcessState::InMenu, &mut p);
        n.handle(InputEvent::Rotate(3), ProcessState::InSubmenu, &mut p);
        assert_eq!(p.offset_g, 0.0);
    }

    #[test]
    fn sleep_timer_is_clamped() {
        let mut n = nav();
        let mut p = CalibrationProfile::default();
        n.handle(InputEvent::Rotate(6), ProcessState::InMenu, &mut p);
        assert_eq!(n.current_item(), MenuItem::SleepTimer);
        n.handle(InputEvent::Click, ProcessState::InMenu, &mut p);
        n.handle(InputEvent::Rotate(-1000), ProcessState::InSubmenu, &mut p);
        assert_eq!(p.sleep_timeout_ms, 5000);
        n.handle(InputEvent::Rotate(3), ProcessState::InSubmenu, &mut p);
        assert_eq!(p.sleep_timeout_ms, 8000);
        // leaving without a click still stores the edit
        let out = n.handle(InputEvent::LongPress, ProcessState::InSubmenu, &mut p);
        assert_eq!(out.next, Some(ProcessState::Empty));
        assert!(out.actions.contains(&MenuAction::Persist(ProfileField::SleepTimeout)));
    }

    #[test]
    fn reset_requires_confirmation() {
        let mut n = nav();
        let mut p = CalibrationProfile {
            target_weight_g: 21.0,
            ..CalibrationProfile::default()
        };
        n.handle(InputEvent::Rotate(8), ProcessState::InMenu, &mut p);
        assert_eq!(n.current_item(), MenuItem::Reset);
        n.handle(InputEvent::Click, ProcessState::InMenu, &mut p);
        let cancelled = n.handle(InputEvent::Click, ProcessState::InSubmenu, &mut p);
        assert!(cancelled.actions.is_empty());
        assert!((p.target_weight_g - 21.0).abs() < 1e-9);

        n.handle(InputEvent::Click, ProcessState::InMenu, &mut p);
        n.handle(InputEvent::Rotate(1), ProcessState::InSubmenu, &mut p);
        assert!(n.context().reset_confirm);
        let confirmed = n.handle(InputEvent::Click, ProcessState::InSubmenu, &mut p);
        assert_eq!(confirmed.actions.len(), 6);
        assert!((p.target_weight_g - 18.0).abs() < 1e-9);
    }

    #[test]
    fn idle_rotation_edits_target() {
        let mut n = nav();
        let mut p = CalibrationProfile::default();
        let out = n.handle(InputEvent::Rotate(5), ProcessState::Empty, &mut p);
        assert!((p.target_weight_g - 18.5).abs() < 1e-9);
        assert_eq!(out.actions, vec![MenuAction::Persist(ProfileField::TargetWeight)]);
    }

    #[test]
    fn click_while_grinding_cancels() {
        let mut n = nav();
        let mut p = CalibrationProfile::default();
        let out = n.handle(InputEvent::Click, ProcessState::GrindingInProgress, &mut p);
        assert_eq!(out.actions, vec![MenuAction::CancelGrind]);
        let rot = n.handle(InputEvent::Rotate(3), ProcessState::GrindingInProgress, &mut p);
        assert_eq!(rot, MenuOutcome::default());
    }
}
