//! Business-day and school-day calendars consumed by guards.

use std::collections::{HashMap, HashSet};

use time::{Date, Weekday};

use crate::subject::InstitutionId;

/// Read-only calendar lookups.
///
/// Implementations back the guards and the cancellation window; they must not
/// mutate anything.
pub trait Calendar: Send + Sync {
    /// Weekday that is not a public holiday.
    fn is_business_day(&self, date: Date) -> bool;

    /// Day on which `school` holds classes.
    fn is_school_day(&self, school: &InstitutionId, date: Date) -> bool;

    /// Days within the next `business_days` business days after `from` on
    /// which activities at `school` are suspended.
    fn suspension_days(&self, _school: &InstitutionId, _from: Date, _business_days: u32) -> u32 {
        0
    }

    /// Fiscal year a date belongs to.
    fn fiscal_year(&self, date: Date) -> i32 {
        date.year()
    }

    /// The `days`-th business day after `from`.
    fn add_business_days(&self, from: Date, days: u32) -> Date {
        let mut date = from;
        let mut left = days;
        while left > 0 {
            let Some(next) = date.next_day() else {
                return date;
            };
            date = next;
            if self.is_business_day(date) {
                left -= 1;
            }
        }
        date
    }

    /// `date` itself if it is a business day, otherwise the closest one before.
    fn business_day_on_or_before(&self, date: Date) -> Date {
        let mut date = date;
        while !self.is_business_day(date) {
            let Some(previous) = date.previous_day() else {
                return date;
            };
            date = previous;
        }
        date
    }
}

fn is_weekend(date: Date) -> bool {
    matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// Calendar backed by in-memory sets.
///
/// Weekdays are business days unless listed as holidays. A school holds
/// classes on business days unless it has that day off, and on any extra
/// day (a Saturday make-up class, say) registered for it.
#[derive(Debug, Clone, Default)]
pub struct WorkCalendar {
    holidays: HashSet<Date>,
    days_off: HashMap<InstitutionId, HashSet<Date>>,
    extra_school_days: HashMap<InstitutionId, HashSet<Date>>,
    suspensions: HashMap<InstitutionId, HashSet<Date>>,
}

impl WorkCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holiday(mut self, date: Date) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn with_day_off(mut self, school: impl Into<InstitutionId>, date: Date) -> Self {
        self.days_off.entry(school.into()).or_default().insert(date);
        self
    }

    pub fn with_extra_school_day(mut self, school: impl Into<InstitutionId>, date: Date) -> Self {
        self.extra_school_days
            .entry(school.into())
            .or_default()
            .insert(date);
        self
    }

    pub fn with_suspension(mut self, school: impl Into<InstitutionId>, date: Date) -> Self {
        self.suspensions.entry(school.into()).or_default().insert(date);
        self
    }
}

impl Calendar for WorkCalendar {
    fn is_business_day(&self, date: Date) -> bool {
        !is_weekend(date) && !self.holidays.contains(&date)
    }

    fn is_school_day(&self, school: &InstitutionId, date: Date) -> bool {
        if self
            .extra_school_days
            .get(school)
            .is_some_and(|days| days.contains(&date))
        {
            return true;
        }
        self.is_business_day(date)
            && !self
                .days_off
                .get(school)
                .is_some_and(|days| days.contains(&date))
    }

    fn suspension_days(&self, school: &InstitutionId, from: Date, business_days: u32) -> u32 {
        let Some(days) = self.suspensions.get(school) else {
            return 0;
        };
        let until = self.add_business_days(from, business_days);
        days.iter().filter(|d| **d > from && **d <= until).count() as u32
    }
}
