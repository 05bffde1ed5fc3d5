//! Virtual-time clock: day/night phase, speed control, one-shot deferred
//! events, and per-frame observers.
//!
//! The clock is the single heartbeat of the farm. The presentation shell
//! calls [`Clock::advance`] once per rendered frame with the real delta since
//! the previous frame; the clock converts it to virtual time and dispatches
//! everything that became due.
//!
//! # Dispatch Pass
//!
//! Each non-paused `advance` call runs:
//!
//! 1. **Apply** -- `effective = real_delta * speed` is added to `elapsed`.
//! 2. **Snapshot** -- every pending event with `trigger_at <= elapsed` is
//!    queued, ordered by registration. The snapshot is fixed before any
//!    callback runs, so events scheduled during the pass wait for a later one.
//! 3. **Fire** -- queued events are removed and handed to the caller's fire
//!    function one at a time. Cancelling a queued event from inside another
//!    callback still prevents it from firing. A failing callback is logged
//!    and counted; the pass continues.
//! 4. **Observe** -- per-frame observers run in subscription order.
//!
//! A pass with zero effective delta fires nothing (time did not move) but
//! still notifies observers.
//!
//! Events carry an arbitrary payload `T`. The farm uses a small enum naming
//! the item and timer slot; [`Deferred`] wraps a plain closure for callers
//! that want callback-style scheduling.

use crate::fixed::{Fixed64, SimTime, secs, to_secs};
use crate::id::{ObserverId, TimerId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Clock timing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Seconds of virtual time per full day/night cycle.
    pub cycle_duration: f64,
    /// Real seconds a fast-forward window lasts. One full cycle is
    /// compressed into this span.
    pub fast_forward_duration: f64,
    /// Speed multiplier outside fast-forward windows.
    pub base_speed: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            cycle_duration: 5.0,
            fast_forward_duration: 0.2,
            base_speed: 1.0,
        }
    }
}

impl ClockConfig {
    /// Reject durations that are not strictly positive and finite.
    pub fn validate(&self) -> Result<(), ClockError> {
        if !(self.cycle_duration.is_finite() && self.cycle_duration > 0.0) {
            return Err(ClockError::InvalidConfig {
                reason: format!("cycle_duration must be positive, got {}", self.cycle_duration),
            });
        }
        if !(self.fast_forward_duration.is_finite() && self.fast_forward_duration > 0.0) {
            return Err(ClockError::InvalidConfig {
                reason: format!(
                    "fast_forward_duration must be positive, got {}",
                    self.fast_forward_duration
                ),
            });
        }
        if !(self.base_speed.is_finite() && self.base_speed >= 0.0) {
            return Err(ClockError::InvalidConfig {
                reason: format!("base_speed must be non-negative, got {}", self.base_speed),
            });
        }
        Ok(())
    }
}

/// Errors from clock construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig { reason: String },
}

// ---------------------------------------------------------------------------
// Frame data
// ---------------------------------------------------------------------------

/// Parameters handed to per-frame observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Virtual seconds added this frame (real delta times speed).
    pub delta_time: f64,
    /// Real seconds since the previous frame.
    pub fixed_delta_time: f64,
    /// Total virtual seconds elapsed.
    pub time: f64,
    /// Total real seconds elapsed while unpaused.
    pub fixed_time: f64,
    /// Day/night phase in `[0, 1)`.
    pub phase: f64,
    /// Number of unpaused frames so far, including this one.
    pub frame: u64,
}

/// Returned by an observer to stay subscribed or remove itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observe {
    Keep,
    Unsubscribe,
}

/// A per-frame observer.
pub type FrameObserver = Box<dyn FnMut(&FrameTick) -> Observe>;

/// Outcome of one `advance` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Frame parameters, or `None` if the clock was paused.
    pub tick: Option<FrameTick>,
    /// Callbacks that completed successfully.
    pub fired: usize,
    /// Callbacks that returned an error.
    pub failed: usize,
}

impl FrameReport {
    pub fn was_paused(&self) -> bool {
        self.tick.is_none()
    }
}

// ---------------------------------------------------------------------------
// Deferred closures
// ---------------------------------------------------------------------------

/// A boxed one-shot callback for callback-style scheduling on a
/// `Clock<Deferred>`. The callback receives the clock so it can schedule or
/// cancel further work.
pub struct Deferred(Box<dyn FnOnce(&mut Clock<Deferred>) -> Result<(), String>>);

impl Deferred {
    pub fn new(f: impl FnOnce(&mut Clock<Deferred>) -> Result<(), String> + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Wrap a callback that cannot fail.
    pub fn infallible(f: impl FnOnce(&mut Clock<Deferred>) + 'static) -> Self {
        Self(Box::new(move |clock| {
            f(clock);
            Ok(())
        }))
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(<fn>)")
    }
}

impl Clock<Deferred> {
    /// Advance and invoke every due closure.
    pub fn run_frame(&mut self, real_delta: f64) -> FrameReport {
        self.advance(real_delta, |clock, _, deferred| (deferred.0)(clock))
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

struct ScheduledEvent<T> {
    payload: T,
    trigger_at: SimTime,
    seq: u64,
}

/// Owns virtual time, phase, speed, pending events, and frame observers.
pub struct Clock<T> {
    config: ClockConfig,
    cycle: SimTime,
    elapsed: SimTime,
    real_elapsed: f64,
    fast_forward_remaining: f64,
    paused: bool,
    frame: u64,

    pending: SlotMap<TimerId, ScheduledEvent<T>>,
    /// Snapshot of the current dispatch pass, in registration order.
    due: VecDeque<TimerId>,
    next_seq: u64,

    observers: SlotMap<ObserverId, FrameObserver>,
    observer_order: Vec<ObserverId>,
}

impl<T> fmt::Debug for Clock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("config", &self.config)
            .field("elapsed", &self.elapsed)
            .field("fast_forward_remaining", &self.fast_forward_remaining)
            .field("paused", &self.paused)
            .field("frame", &self.frame)
            .field("pending", &self.pending.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<T> Clock<T> {
    /// Create a clock at virtual time zero.
    pub fn new(config: ClockConfig) -> Result<Self, ClockError> {
        config.validate()?;
        let cycle = secs(config.cycle_duration);
        if cycle == SimTime::ZERO {
            return Err(ClockError::InvalidConfig {
                reason: "cycle_duration is below fixed-point resolution".to_string(),
            });
        }
        Ok(Self {
            config,
            cycle,
            elapsed: SimTime::ZERO,
            real_elapsed: 0.0,
            fast_forward_remaining: 0.0,
            paused: false,
            frame: 0,
            pending: SlotMap::with_key(),
            due: VecDeque::new(),
            next_seq: 0,
            observers: SlotMap::with_key(),
            observer_order: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Time queries
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Total virtual time elapsed.
    pub fn elapsed(&self) -> SimTime {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f64 {
        to_secs(self.elapsed)
    }

    /// Total real time elapsed while unpaused.
    pub fn real_elapsed(&self) -> f64 {
        self.real_elapsed
    }

    /// Duration of one day/night cycle.
    pub fn cycle_duration(&self) -> SimTime {
        self.cycle
    }

    /// Convert a duration in cycles to virtual time.
    pub fn cycles(&self, cycles: f64) -> SimTime {
        secs(cycles * self.config.cycle_duration)
    }

    /// Position within the current cycle, in `[0, 1)`. 0 is the start of day,
    /// 0.5 is midnight.
    pub fn phase(&self) -> f64 {
        let within: Fixed64 = self.elapsed % self.cycle;
        (within / self.cycle).to_num::<f64>()
    }

    /// Number of unpaused `advance` calls so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -----------------------------------------------------------------------
    // Speed and pause
    // -----------------------------------------------------------------------

    /// Speed multiplier that the next `advance` will apply.
    pub fn current_speed(&self) -> f64 {
        if self.fast_forward_remaining > 0.0 {
            self.config.cycle_duration / self.config.fast_forward_duration
        } else {
            self.config.base_speed
        }
    }

    pub fn is_fast_forwarding(&self) -> bool {
        self.fast_forward_remaining > 0.0
    }

    /// Real seconds left in the current fast-forward window.
    pub fn fast_forward_remaining(&self) -> f64 {
        self.fast_forward_remaining
    }

    /// Start (or restart) a fast-forward window that compresses one cycle
    /// into `fast_forward_duration` real seconds.
    pub fn speed_up(&mut self) {
        self.fast_forward_remaining = self.config.fast_forward_duration;
        debug!(
            window = self.fast_forward_remaining,
            speed = self.current_speed(),
            "fast-forward started"
        );
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            info!(paused, elapsed = self.elapsed_secs(), "clock pause toggled");
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Register a one-shot event `delay` after the current virtual time.
    /// Safe to call from inside a firing callback; the new event is never
    /// eligible within the pass that scheduled it.
    pub fn schedule(&mut self, payload: T, delay: SimTime) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(ScheduledEvent {
            payload,
            trigger_at: self.elapsed.saturating_add(delay.max(SimTime::ZERO)),
            seq,
        })
    }

    /// Convenience for [`schedule`](Self::schedule) with a delay in seconds.
    pub fn schedule_secs(&mut self, payload: T, delay: f64) -> TimerId {
        self.schedule(payload, secs(delay))
    }

    /// Cancel a pending event. Returns false if it already fired or was
    /// already cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(id)
    }

    /// Absolute virtual time at which a pending event becomes due.
    pub fn trigger_at(&self, id: TimerId) -> Option<SimTime> {
        self.pending.get(id).map(|e| e.trigger_at)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Register a per-frame observer. Observers run after due events, in
    /// subscription order.
    pub fn subscribe(&mut self, observer: FrameObserver) -> ObserverId {
        let id = self.observers.insert(observer);
        self.observer_order.push(id);
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        if self.observers.remove(id).is_some() {
            self.observer_order.retain(|&o| o != id);
            true
        } else {
            false
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    /// Run one frame. `fire` receives each due event together with the clock
    /// so it can schedule and cancel during dispatch.
    pub fn advance<F, E>(&mut self, real_delta: f64, mut fire: F) -> FrameReport
    where
        F: FnMut(&mut Self, TimerId, T) -> Result<(), E>,
        E: fmt::Display,
    {
        if self.paused {
            return FrameReport::default();
        }

        let real = if real_delta.is_finite() && real_delta >= 0.0 {
            real_delta
        } else {
            warn!(real_delta, "ignoring invalid frame delta");
            0.0
        };

        // Speed is sampled before the window shrinks, so the frame that
        // crosses the end of a window still runs fast.
        let speed = self.current_speed();
        if self.fast_forward_remaining > 0.0 {
            self.fast_forward_remaining = (self.fast_forward_remaining - real).max(0.0);
        }

        let effective = secs(real * speed);
        self.elapsed = self.elapsed.saturating_add(effective);
        self.real_elapsed += real;
        self.frame += 1;

        let mut report = FrameReport::default();

        if effective > SimTime::ZERO {
            self.snapshot_due();
            while let Some(id) = self.due.pop_front() {
                // Cancelled after the snapshot was taken.
                let Some(event) = self.pending.remove(id) else {
                    continue;
                };
                match fire(self, id, event.payload) {
                    Ok(()) => report.fired += 1,
                    Err(error) => {
                        warn!(%error, elapsed = self.elapsed_secs(), "scheduled callback failed");
                        report.failed += 1;
                    }
                }
            }
        }

        let tick = FrameTick {
            delta_time: to_secs(effective),
            fixed_delta_time: real,
            time: self.elapsed_secs(),
            fixed_time: self.real_elapsed,
            phase: self.phase(),
            frame: self.frame,
        };
        self.notify_observers(&tick);
        report.tick = Some(tick);
        report
    }

    fn snapshot_due(&mut self) {
        let now = self.elapsed;
        let mut due: Vec<(u64, TimerId)> = self
            .pending
            .iter()
            .filter(|(_, e)| e.trigger_at <= now)
            .map(|(id, e)| (e.seq, id))
            .collect();
        due.sort_unstable_by_key(|&(seq, _)| seq);
        self.due.clear();
        self.due.extend(due.into_iter().map(|(_, id)| id));
    }

    fn notify_observers(&mut self, tick: &FrameTick) {
        let order = self.observer_order.clone();
        for id in order {
            let Some(observer) = self.observers.get_mut(id) else {
                continue;
            };
            if observer(tick) == Observe::Unsubscribe {
                self.unsubscribe(id);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
