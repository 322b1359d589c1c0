//! Replaceable timer handles for the connection event loop.
//!
//! A timer task never touches connection state. It posts a [`TimerTick`]
//! to the loop, tagged with the generation it was armed with. Re-arming a
//! [`TimerSlot`] aborts the previous task and bumps the generation, so a
//! tick that was already in flight is recognized as stale and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};

// ============================================================================
// Constants
// ============================================================================

/// Shortest period accepted by [`TimerSlot::every`].
const MIN_PERIOD: Duration = Duration::from_millis(1);

// ============================================================================
// TimerKind
// ============================================================================

/// The timers a connection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    /// Heartbeat ticker.
    Ping,
    /// Deadline for the pong answering a ping.
    Pong,
    /// Readiness assumption after connect.
    Readiness,
}

/// Notification posted by a timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerTick {
    pub kind: TimerKind,
    pub generation: u64,
}

// ============================================================================
// Timer
// ============================================================================

/// A spawned timer task, aborted on drop.
#[derive(Debug)]
struct Timer {
    handle: JoinHandle<()>,
    generation: u64,
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// TimerSlot
// ============================================================================

/// Holds at most one live timer of a kind.
#[derive(Debug)]
pub(crate) struct TimerSlot {
    kind: TimerKind,
    current: Option<Timer>,
    generation: u64,
    ticks: mpsc::UnboundedSender<TimerTick>,
}

impl TimerSlot {
    /// Creates an empty slot posting to `ticks`.
    pub fn new(kind: TimerKind, ticks: mpsc::UnboundedSender<TimerTick>) -> Self {
        Self {
            kind,
            current: None,
            generation: 0,
            ticks,
        }
    }

    /// Replaces the current timer with one firing once after `delay`.
    pub fn once(&mut self, delay: Duration) {
        let tick = self.next_tick();
        let ticks = self.ticks.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = ticks.send(tick);
        });
        self.install(handle, tick.generation);
    }

    /// Replaces the current timer with one firing every `period`, first
    /// after one full period.
    ///
    /// A zero period is clamped to one millisecond. A period whose first
    /// deadline is not representable never fires.
    pub fn every(&mut self, period: Duration) {
        let period = period.max(MIN_PERIOD);
        let tick = self.next_tick();
        let ticks = self.ticks.clone();
        let handle = tokio::spawn(async move {
            let Some(start) = Instant::now().checked_add(period) else {
                return pending().await;
            };
            let mut interval = interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(tick).is_err() {
                    break;
                }
            }
        });
        self.install(handle, tick.generation);
    }

    /// Aborts the current timer, if any.
    pub fn cancel(&mut self) {
        if self.current.take().is_some() {
            self.generation += 1;
        }
    }

    /// Returns `true` while a timer is installed.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.current.is_some()
    }

    /// Checks a tick against the installed timer.
    ///
    /// Returns `false` for stale ticks. A one-shot timer is disarmed when
    /// its tick is accepted.
    pub fn accept(&mut self, tick: TimerTick, one_shot: bool) -> bool {
        let live = self
            .current
            .as_ref()
            .is_some_and(|timer| timer.generation == tick.generation);
        if live && one_shot {
            // The task has already finished; dropping it is a no-op abort.
            self.current = None;
        }
        live
    }

    fn next_tick(&mut self) -> TimerTick {
        self.generation += 1;
        TimerTick {
            kind: self.kind,
            generation: self.generation,
        }
    }

    fn install(&mut self, handle: JoinHandle<()>, generation: u64) {
        // Dropping the previous timer aborts its task.
        self.current = Some(Timer { handle, generation });
    }
}

// ============================================================================
// Tests
// ============================================================================
