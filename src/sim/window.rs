//! Shoot window state machine
//!
//! The window opens on a fixed period and stays open for the profile's window
//! size. Trigger presses while open are hits; presses while closed are
//! impulses.

use super::timer::TimerArena;
use crate::Millis;
use crate::consts::WINDOW_PERIOD_MS;

/// Current window state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    pub is_open: bool,
    pub opened_at_ms: Option<Millis>,
}

/// Classification of one trigger press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerClass {
    /// Pressed while open; latency measured from the window opening
    Hit { latency_ms: Millis },
    /// Pressed while closed
    Impulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Opened { at: Millis },
    Closed { at: Millis },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowTimer {
    Open,
    Close,
}

#[derive(Debug, Clone)]
pub struct TimingWindowMachine {
    timers: TimerArena<WindowTimer>,
    window_ms: Millis,
    state: WindowState,
    clean_streak: u32,
    best_streak: u32,
}

impl TimingWindowMachine {
    /// Start the open cycle; the first window opens one period after `now`
    pub fn start(now: Millis, window_ms: Millis) -> Self {
        let mut timers = TimerArena::new();
        timers.every(now, WINDOW_PERIOD_MS, WindowTimer::Open);
        Self {
            timers,
            window_ms,
            state: WindowState::default(),
            clean_streak: 0,
            best_streak: 0,
        }
    }

    pub fn advance(&mut self, now: Millis) -> Vec<WindowEvent> {
        let mut events = Vec::new();
        while let Some(fired) = self.timers.pop_due(now) {
            match fired.kind {
                WindowTimer::Open => {
                    // window_ms < period, so the previous window is always closed here
                    debug_assert!(!self.state.is_open, "window re-opened before closing");
                    self.state = WindowState {
                        is_open: true,
                        opened_at_ms: Some(fired.at),
                    };
                    self.timers.after(fired.at, self.window_ms, WindowTimer::Close);
                    log::debug!("Window open at {}ms", fired.at);
                    events.push(WindowEvent::Opened { at: fired.at });
                }
                WindowTimer::Close => {
                    self.state = WindowState::default();
                    events.push(WindowEvent::Closed { at: fired.at });
                }
            }
        }
        events
    }

    /// Classify a trigger press at `now`
    pub fn classify(&mut self, now: Millis) -> TriggerClass {
        match self.state {
            WindowState {
                is_open: true,
                opened_at_ms: Some(opened_at),
            } => {
                self.clean_streak += 1;
                self.best_streak = self.best_streak.max(self.clean_streak);
                TriggerClass::Hit {
                    latency_ms: now.saturating_sub(opened_at),
                }
            }
            _ => {
                self.clean_streak = 0;
                TriggerClass::Impulse
            }
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    pub fn clean_streak(&self) -> u32 {
        self.clean_streak
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    pub fn window_ms(&self) -> Millis {
        self.window_ms
    }
}
