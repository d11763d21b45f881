//! Calendar source for admission and sweeps.

use chrono::{Local, NaiveDate};

pub trait ClockPort {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl ClockPort for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
