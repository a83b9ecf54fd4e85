//! Process state and the read-only view published to the display.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::FailReason;
use crate::grind::GrindSession;
use crate::menu::MenuItem;
use crate::profile::CalibrationProfile;

/// Exactly one is active at any time; only the control task changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Empty,
    GrindingInProgress,
    GrindingFinished,
    GrindingFailed,
    InMenu,
    InSubmenu,
    InfoMenu,
}

impl ProcessState {
    pub const fn is_menu(self) -> bool {
        matches!(self, Self::InMenu | Self::InSubmenu | Self::InfoMenu)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::GrindingInProgress => "grinding",
            Self::GrindingFinished => "finished",
            Self::GrindingFailed => "failed",
            Self::InMenu => "menu",
            Self::InSubmenu => "submenu",
            Self::InfoMenu => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuContext {
    pub current_item: MenuItem,
    pub current_setting: Option<MenuItem>,
    /// Highlighted choice on the reset screen.
    pub reset_confirm: bool,
}

impl Default for MenuContext {
    fn default() -> Self {
        Self {
            current_item: MenuItem::CupWeight,
            current_setting: None,
            reset_confirm: false,
        }
    }
}

/// Everything a display needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: ProcessState,
    pub weight_g: f64,
    pub sensor_ready: bool,
    pub profile: CalibrationProfile,
    pub session: Option<GrindSession>,
    pub fail_reason: Option<FailReason>,
    pub menu: MenuContext,
    pub diagnostic_mode: bool,
    pub display_asleep: bool,
    /// Grinding time so far, or total once finished.
    pub grind_elapsed_ms: Option<u64>,
    /// Weight above the empty cup.
    pub dose_g: Option<f64>,
    pub now_ms: u64,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: ProcessState::Empty,
            weight_g: 0.0,
            sensor_ready: false,
            profile: CalibrationProfile::default(),
            session: None,
            fail_reason: None,
            menu: MenuContext::default(),
            diagnostic_mode: false,
            display_asleep: false,
            grind_elapsed_ms: None,
            dose_g: None,
            now_ms: 0,
        }
    }
}

/// Shared between the control task (writer) and display consumers (readers).
#[derive(Debug, Default)]
pub struct StatusBoard {
    snapshot: Mutex<StatusSnapshot>,
    prompt: Mutex<Option<String>>,
    display_locked: AtomicBool,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snap: StatusSnapshot) {
        match self.snapshot.lock() {
            Ok(mut g) => *g = snap,
            Err(poisoned) => *poisoned.into_inner() = snap,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match self.snapshot.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Take over the display for a guided procedure. Released when the guard drops.
    pub fn lock_display(&self) -> DisplayGuard<'_> {
        self.display_locked.store(true, Ordering::Release);
        DisplayGuard { board: self }
    }

    pub fn display_locked(&self) -> bool {
        self.display_locked.load(Ordering::Acquire)
    }

    /// Text shown while the display is locked.
    pub fn prompt(&self) -> Option<String> {
        match self.prompt.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_prompt_inner(&self, text: Option<String>) {
        match self.prompt.lock() {
            Ok(mut g) => *g = text,
            Err(poisoned) => *poisoned.into_inner() = text,
        }
    }
}

/// Exclusive use of the display; clears the lock and prompt on drop.
#[derive(Debug)]
pub struct DisplayGuard<'a> {
    board: &'a StatusBoard,
}

impl DisplayGuard<'_> {
    pub fn set_prompt(&self, text: impl Into<String>) {
        self.board.set_prompt_inner(Some(text.into()));
    }
}

impl Drop for DisplayGuard<'_> {
    fn drop(&mut self) {
        self.board.set_prompt_inner(None);
        self.board.display_locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_guard_releases_on_early_return() {
        fn procedure(board: &StatusBoard) -> Result<(), &'static str> {
            let guard = board.lock_display();
            guard.set_prompt("Place cup");
            assert!(board.display_locked());
            Err("timed out")
        }

        let board = StatusBoard::new();
        assert!(procedure(&board).is_err());
        assert!(!board.display_locked());
        assert_eq!(board.prompt(), None);
    }

    #[test]
    fn publish_replaces_snapshot() {
        let board = StatusBoard::new();
        let snap = StatusSnapshot {
            state: ProcessState::InMenu,
            weight_g: 12.3,
            ..StatusSnapshot::default()
        };
        board.publish(snap.clone());
        assert_eq!(board.snapshot(), snap);
    }
}
