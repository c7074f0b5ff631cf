//! The four-state visibility model and the hysteresis/debounce machine that
//! drives it from pointer samples.
//!
//! The committed state lives in a [`StateSlot`], a single atomic value shared
//! between the sampler thread and the dispatch thread. Everything else (the
//! consecutive show counter and the pending timer) is owned by the sampler and
//! lives in [`VisibilityMachine`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use strum::Display;
use tracing::{debug, trace};

use crate::common::config::Settings;

/// Lower bound applied to both pending delays before a transition commits.
pub const MIN_DELAY: Duration = Duration::from_millis(10);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Display,
    Serialize
)]
#[repr(u8)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisibilityState {
    /// The panel is shown.
    Visible,
    /// The panel is hidden.
    Hidden,
    /// Hidden, waiting for the show delay to elapse.
    PendingVisible,
    /// Shown, waiting for the hide delay to elapse.
    PendingHidden,
}

impl VisibilityState {
    /// Whether the panel should currently be drawn.
    ///
    /// Pending states keep the mode of the state they are leaving.
    pub fn panel_visible(self) -> bool {
        match self {
            VisibilityState::Visible | VisibilityState::PendingHidden => true,
            VisibilityState::Hidden | VisibilityState::PendingVisible => false,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, VisibilityState::PendingVisible | VisibilityState::PendingHidden)
    }
}

/// Single atomically published [`VisibilityState`].
#[derive(Debug)]
pub struct StateSlot(AtomicU8);

impl Default for StateSlot {
    fn default() -> Self { Self::new(VisibilityState::Visible) }
}

impl StateSlot {
    pub fn new(state: VisibilityState) -> Self { Self(AtomicU8::new(state.into())) }

    pub fn load(&self) -> VisibilityState { decode(self.0.load(Ordering::Acquire)) }

    pub fn store(&self, state: VisibilityState) { self.0.store(state.into(), Ordering::Release) }

    /// Replaces `current` with `next` only if no other writer got there first.
    ///
    /// On failure the value that is actually in the slot is returned.
    pub fn compare_exchange(
        &self,
        current: VisibilityState,
        next: VisibilityState,
    ) -> Result<VisibilityState, VisibilityState> {
        self.0
            .compare_exchange(current.into(), next.into(), Ordering::AcqRel, Ordering::Acquire)
            .map(decode)
            .map_err(decode)
    }
}

// Only values produced by `VisibilityState::into` are ever stored.
fn decode(raw: u8) -> VisibilityState {
    VisibilityState::try_from(raw).unwrap_or(VisibilityState::Visible)
}

/// Where a monitor-relative pointer y lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Zone {
    Show,
    Neutral,
    Hide,
}

/// The two hysteresis thresholds, in pixels from the top of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub hidden_y: u32,
    pub visible_y: u32,
}

impl Thresholds {
    /// `y <= hidden_y` arms a show, `y > visible_y` arms a hide.
    ///
    /// The show test runs first, so the two zones never both match a sample
    /// even if the band between them is empty.
    pub fn classify(&self, relative_y: i32) -> Zone {
        let y = i64::from(relative_y);
        if y <= i64::from(self.hidden_y) {
            Zone::Show
        } else if y > i64::from(self.visible_y) {
            Zone::Hide
        } else {
            Zone::Neutral
        }
    }
}

/// Outcome of feeding one sample to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub zone: Zone,
    pub next: VisibilityState,
    /// The step committed a pending transition and the panel must be redrawn.
    pub committed: bool,
}

/// Sampler-owned half of the state machine.
#[derive(Debug)]
pub struct VisibilityMachine {
    thresholds: Thresholds,
    delay_show: Duration,
    delay_hide: Duration,
    required_show_checks: u32,
    consecutive_show: u32,
    timer_start: Instant,
}

impl VisibilityMachine {
    pub fn new(settings: &Settings, now: Instant) -> Self {
        Self {
            thresholds: settings.thresholds(),
            delay_show: settings.effective_delay_show(),
            delay_hide: settings.effective_delay_hide(),
            required_show_checks: settings.consecutive_checks_before_visible.max(1),
            consecutive_show: 0,
            timer_start: now,
        }
    }

    pub fn thresholds(&self) -> Thresholds { self.thresholds }

    pub fn consecutive_show(&self) -> u32 { self.consecutive_show }

    /// Applies the transition rules for one sample taken at `now`, starting
    /// from `current`, and then evaluates the pending timer.
    pub fn observe(&mut self, current: VisibilityState, relative_y: i32, now: Instant) -> Step {
        use VisibilityState::*;

        let zone = self.thresholds.classify(relative_y);
        let mut next = current;

        match zone {
            Zone::Show => {
                self.consecutive_show = self.consecutive_show.saturating_add(1);
                if self.consecutive_show >= self.required_show_checks {
                    if matches!(current, Hidden | PendingHidden) {
                        debug!(
                            relative_y,
                            checks = self.consecutive_show,
                            from = %current,
                            "show confirmed, scheduling show"
                        );
                        next = PendingVisible;
                        self.timer_start = now;
                    }
                } else {
                    trace!(relative_y, checks = self.consecutive_show, "show trigger, waiting");
                }
            }
            Zone::Hide => {
                self.consecutive_show = 0;
                // An already pending hide keeps its original start time.
                if matches!(current, Visible | PendingVisible) {
                    debug!(relative_y, from = %current, "scheduling hide");
                    next = PendingHidden;
                    self.timer_start = now;
                }
            }
            Zone::Neutral => self.consecutive_show = 0,
        }

        let elapsed = now.saturating_duration_since(self.timer_start);
        let mut committed = false;
        match next {
            PendingVisible if elapsed >= self.delay_show => {
                debug!(?elapsed, "executing delayed show");
                next = Visible;
                committed = true;
            }
            PendingHidden if elapsed >= self.delay_hide => {
                debug!(?elapsed, "executing delayed hide");
                next = Hidden;
                committed = true;
            }
            _ => {}
        }

        Step { zone, next, committed }
    }
}
