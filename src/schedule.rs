//! Cyclic transmission schedule on a 1 ms tick.
//!
//! Each cyclic message has an alarm. Tick 0 only arms the alarms; every later tick counts
//! them down and fires those reaching zero. Firing zeroes the message checksum and sets
//! `needs_tx`, so a message with a cycle of N ms goes out at ticks N, 2N, 3N, ...

use crate::message::Message;
use tracing::{debug, trace};

/// Nominal tick period in seconds.
pub const TICK_PERIOD_S: f64 = 0.001;

/// Stretch applied to elapsed ticks so float error cannot round a due tick down.
const TICK_STRETCH: f64 = 1.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub message: usize,
    pub alarm: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
    tick: u64,
    initial_tick_done: bool,
    last_tick_time: f64,
}

impl Schedule {
    pub fn new(messages: &[Message]) -> Self {
        let mut schedule = Schedule::default();
        schedule.reset(messages);
        schedule
    }

    /// Rebuild the entries from the cyclic messages and restart at tick 0.
    pub fn reset(&mut self, messages: &[Message]) {
        self.entries = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_cyclic())
            .map(|(message, _)| ScheduleEntry { message, alarm: 0 })
            .collect();
        self.tick = 0;
        self.initial_tick_done = false;
        self.last_tick_time = 0.0;
        debug!(entries = self.entries.len(), "schedule reset");
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn tick(&mut self, messages: &mut [Message]) {
        for e in self.entries.iter_mut() {
            let m = &mut messages[e.message];
            if self.tick != 0 && e.alarm != 0 {
                e.alarm -= 1;
                if e.alarm == 0 {
                    trace!(msg = %m.name, tick = self.tick, "alarm fired");
                    m.checksum = 0;
                    m.needs_tx = true;
                }
            }
            if e.alarm == 0 {
                e.alarm = m.cycle_time_ms;
            }
        }
        self.tick += 1;
    }

    /// Number of ticks due at `model_time_s`, updating the last tick time.
    ///
    /// The first call at time 0 yields one tick (once per reset). After that the elapsed
    /// time since the last tick is converted to whole milliseconds.
    pub fn due_ticks(&mut self, model_time_s: f64) -> u64 {
        let mut due = 0;
        if model_time_s == 0.0 && !self.initial_tick_done {
            self.initial_tick_done = true;
            due += 1;
        }
        let elapsed = (model_time_s - self.last_tick_time) / TICK_PERIOD_S * TICK_STRETCH;
        if elapsed >= 1.0 && elapsed.is_finite() {
            due += elapsed as u64;
            self.last_tick_time = model_time_s;
        }
        due
    }
}
