//! Rotary encoder input → semantic events.
//!
//! `poll()` is called once per control tick with the current monotonic time.
//! Clicks are classified by a small gesture state machine:
//!
//! | Gesture      | Condition                                           | Event          |
//! |--------------|-----------------------------------------------------|----------------|
//! | Single click | no second click within `single_click_delay_ms`      | `Click`        |
//! | Double click | second click while a single is pending, then quiet  | `DoubleClick`  |
//! | Rapid clicks | `rapid_clicks` clicks, each within `double_click_ms` | `RapidRepeat`  |
//! | Long press   | button held for `long_press_ms`                     | `LongPress`    |
//!
//! A double click is reported once the burst has been quiet for
//! `double_click_ms`, so a rapid sequence does not also produce one.

use grinder_traits::RotaryInput;

use crate::config::InputCfg;
use crate::util::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Net detents since the previous poll (positive = clockwise).
    Rotate(i32),
    Click,
    DoubleClick,
    LongPress,
    RapidRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickState {
    Idle,
    Pending { first_ms: u64 },
    Burst { count: u8, last_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct InputDispatcher {
    cfg: InputCfg,
    last_counter: Option<i32>,
    clicks: ClickState,
    pressed_since: Option<u64>,
    long_fired: bool,
}

impl InputDispatcher {
    pub fn new(cfg: InputCfg) -> Self {
        Self {
            cfg,
            last_counter: None,
            clicks: ClickState::Idle,
            pressed_since: None,
            long_fired: false,
        }
    }

    /// Forget rotation that happened while input was not being dispatched.
    pub fn resync<R: RotaryInput + ?Sized>(&mut self, input: &mut R) {
        self.last_counter = Some(input.read_counter());
        self.clicks = ClickState::Idle;
        self.pressed_since = None;
        self.long_fired = false;
    }

    pub fn poll<R: RotaryInput + ?Sized>(&mut self, input: &mut R, now_ms: u64) -> Vec<InputEvent> {
        let mut events = Vec::new();

        let counter = input.read_counter();
        let delta = self
            .last_counter
            .map_or(0, |last| counter.wrapping_sub(last));
        self.last_counter = Some(counter);
        if delta != 0 {
            events.push(InputEvent::Rotate(delta));
        }

        let mut swallow_click = false;
        if input.is_button_down() {
            let since = *self.pressed_since.get_or_insert(now_ms);
            if !self.long_fired && elapsed_ms(now_ms, since) >= self.cfg.long_press_ms {
                self.long_fired = true;
                self.clicks = ClickState::Idle;
                events.push(InputEvent::LongPress);
            }
        } else {
            // Drivers report the click of a long press on release.
            swallow_click = self.long_fired;
            self.pressed_since = None;
            self.long_fired = false;
        }

        if let Some(ev) = self.resolve(now_ms) {
            events.push(ev);
        }

        if input.is_button_clicked() && !swallow_click {
            if let Some(ev) = self.on_click(now_ms) {
                events.push(ev);
            }
        }

        if !events.is_empty() {
            tracing::trace!(?events, now_ms, "input events");
        }
        events
    }

    fn resolve(&mut self, now_ms: u64) -> Option<InputEvent> {
        match self.clicks {
            ClickState::Pending { first_ms }
                if elapsed_ms(now_ms, first_ms) >= self.cfg.single_click_delay_ms =>
            {
                self.clicks = ClickState::Idle;
                Some(InputEvent::Click)
            }
            ClickState::Burst { last_ms, .. }
                if elapsed_ms(now_ms, last_ms) > self.cfg.double_click_ms =>
            {
                self.clicks = ClickState::Idle;
                Some(InputEvent::DoubleClick)
            }
            _ => None,
        }
    }

    fn on_click(&mut self, now_ms: u64) -> Option<InputEvent> {
        match self.clicks {
            ClickState::Idle => {
                self.clicks = ClickState::Pending { first_ms: now_ms };
                None
            }
            ClickState::Pending { .. } => self.grow_burst(2, now_ms),
            ClickState::Burst { count, .. } => self.grow_burst(count.saturating_add(1), now_ms),
        }
    }

    fn grow_burst(&mut self, count: u8, now_ms: u64) -> Option<InputEvent> {
        if count >= self.cfg.rapid_clicks {
            self.clicks = ClickState::Idle;
            return Some(InputEvent::RapidRepeat);
        }
        self.clicks = ClickState::Burst {
            count,
            last_ms: now_ms,
        };
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedInput;

    fn setup() -> (InputDispatcher, ScriptedInput) {
        let mut d = InputDispatcher::new(InputCfg::default());
        let mut input = ScriptedInput::default();
        d.resync(&mut input);
        (d, input)
    }

    #[test]
    fn single_click_is_deferred() {
        let (mut d, input) = setup();
        let mut rx = input.clone();
        input.click();
        assert!(d.poll(&mut rx, 0).is_empty());
        assert!(d.poll(&mut rx, 250).is_empty());
        assert_eq!(d.poll(&mut rx, 300), vec![InputEvent::Click]);
        assert!(d.poll(&mut rx, 350).is_empty());
    }

    #[test]
    fn second_click_makes_a_double() {
        let (mut d, input) = setup();
        let mut rx = input.clone();
        input.click();
        d.poll(&mut rx, 0);
        input.click();
        assert!(d.poll(&mut rx, 150).is_empty());
        assert!(d.poll(&mut rx, 600).is_empty());
        assert_eq!(d.poll(&mut rx, 700), vec![InputEvent::DoubleClick]);
    }

    #[test]
    fn four_rapid_clicks_toggle_once() {
        let (mut d, input) = setup();
        let mut rx = input.clone();
        let mut seen = Vec::new();
        for t in [0_u64, 100, 200, 300] {
            input.click();
            seen.extend(d.poll(&mut rx, t));
        }
        seen.extend(d.poll(&mut rx, 2000));
        assert_eq!(seen, vec![InputEvent::RapidRepeat]);
    }

    #[test]
    fn rotation_reports_wrapping_delta() {
        let (mut d, input) = setup();
        let mut rx = input.clone();
        input.rotate(i32::MAX);
        d.poll(&mut rx, 0);
        input.rotate(3);
        assert_eq!(d.poll(&mut rx, 50), vec![InputEvent::Rotate(3)]);
    }

    #[test]
    fn long_press_fires_once_and_eats_release_click() {
        let (mut d, input) = setup();
        let mut rx = input.clone();
        input.hold(true);
        assert!(d.poll(&mut rx, 0).is_empty());
        assert_eq!(d.poll(&mut rx, 1500), vec![InputEvent::LongPress]);
        assert!(d.poll(&mut rx, 2000).is_empty());
        input.hold(false);
        input.click();
        assert!(d.poll(&mut rx, 2100).is_empty());
        assert!(d.poll(&mut rx, 3000).is_empty());
    }
}
