use crate::domain::record::Stay;
use chrono::{Duration, NaiveDate};

/// Inclusive; one-night stays every `stride_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
    stride_days: u32,
}

impl DateRange {
    /// A stride of zero is clamped to one day.
    pub fn new(start: NaiveDate, end: NaiveDate, stride_days: u32) -> Self {
        Self {
            start,
            end,
            stride_days: stride_days.max(1),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn stride_days(&self) -> u32 {
        self.stride_days
    }

    pub fn iter(&self) -> StayIter {
        StayIter {
            next: Some(self.start),
            end: self.end,
            stride: Duration::days(i64::from(self.stride_days)),
        }
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let span = (self.end - self.start).num_days() as u64;
        (span / u64::from(self.stride_days)) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for &DateRange {
    type Item = Stay;
    type IntoIter = StayIter;

    fn into_iter(self) -> StayIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct StayIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
    stride: Duration,
}

impl Iterator for StayIter {
    type Item = Stay;

    fn next(&mut self) -> Option<Stay> {
        let check_in = self.next.filter(|d| *d <= self.end)?;
        let check_out = check_in.succ_opt()?;
        self.next = check_in.checked_add_signed(self.stride);
        Some(Stay {
            check_in,
            check_out,
        })
    }
}
