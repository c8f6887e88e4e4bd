//! Clock device
//!
//! [`ClockDevice`] turns a millisecond [`Clock`] into at most one event per
//! poll. Once the deadline has passed it moves a whole number of periods past
//! the current time, so a VM that fell behind gets one event, not a burst.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::interpreter::constants::CLOCK_PERIOD_MS;
use crate::memory::value::Val;

/// Milliseconds since the Unix epoch
pub trait Clock {
    fn now_millis(&mut self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&mut self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

/// Clock moved by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        ManualClock(Rc::new(Cell::new(millis)))
    }

    pub fn set(&self, millis: u64) {
        self.0.set(millis);
    }

    pub fn advance(&self, millis: u64) {
        self.0.set(self.0.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&mut self) -> u64 {
        self.0.get()
    }
}

pub struct ClockDevice {
    clock: Box<dyn Clock>,
    handler: Val,
    deadline: u64,
    period: u64,
}

impl ClockDevice {
    /// The first event is due immediately
    pub fn new(mut clock: Box<dyn Clock>, handler: Val) -> Self {
        let deadline = clock.now_millis();
        ClockDevice {
            clock,
            handler,
            deadline,
            period: CLOCK_PERIOD_MS,
        }
    }

    pub fn handler(&self) -> Val {
        self.handler
    }

    /// Epoch seconds if an event is due
    pub fn poll(&mut self) -> Option<i64> {
        let now = self.clock.now_millis();
        if now < self.deadline {
            return None;
        }
        let missed = (now - self.deadline) / self.period;
        self.deadline += (missed + 1) * self.period;
        Some((now / 1000) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::UNIT;

    #[test]
    fn test_one_event_per_period() {
        let clock = ManualClock::new(5_000);
        let mut device = ClockDevice::new(Box::new(clock.clone()), UNIT);
        assert_eq!(device.poll(), Some(5));
        assert_eq!(device.poll(), None);
        clock.advance(999);
        assert_eq!(device.poll(), None);
        clock.advance(1);
        assert_eq!(device.poll(), Some(6));
    }

    #[test]
    fn test_catch_up_is_a_single_event() {
        let clock = ManualClock::new(0);
        let mut device = ClockDevice::new(Box::new(clock.clone()), UNIT);
        assert_eq!(device.poll(), Some(0));
        clock.set(10_500);
        assert_eq!(device.poll(), Some(10));
        assert_eq!(device.poll(), None);
        clock.set(10_999);
        assert_eq!(device.poll(), None);
        clock.set(11_000);
        assert_eq!(device.poll(), Some(11));
    }
}
