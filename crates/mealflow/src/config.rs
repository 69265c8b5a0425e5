//! Engine configuration.

use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::{Error, Result};

/// Business rules shared by every workflow variant.
///
/// Deserializable so it can be loaded from the host application's settings;
/// missing fields fall back to the defaults below.
///
/// # Example
///
/// ```
/// use mealflow::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "cancel_notice_business_days": 3 }"#).unwrap();
/// assert_eq!(config.cancel_notice_business_days, 3);
/// assert_eq!(config.advance_notice_business_days, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Business days that must separate today from a date for it to be
    /// cancellable. Activity suspension days are added on top.
    /// Default: 2.
    pub cancel_notice_business_days: u32,

    /// Business days of notice a request must give before its first date.
    /// Default: 2.
    pub advance_notice_business_days: u32,

    /// Requests whose first date falls within this many business days are
    /// classified as priority. Default: 2.
    pub priority_business_days: u32,

    /// Upper bound (inclusive) of the "limit" band; anything later is
    /// regular. Default: 5.
    pub limit_business_days: u32,

    /// School vacation months (1-12). Default: January and July.
    pub vacation_months: Vec<u8>,

    /// Offset used to decide what "today" is. Default: -3 (São Paulo).
    /// Must lie within -25..=25.
    #[serde(deserialize_with = "offset_hours")]
    pub utc_offset_hours: i8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cancel_notice_business_days: 2,
            advance_notice_business_days: 2,
            priority_business_days: 2,
            limit_business_days: 5,
            vacation_months: vec![1, 7],
            utc_offset_hours: -3,
        }
    }
}

impl EngineConfig {
    /// Reject values no calendar can honour. The builder calls this before
    /// building a service.
    pub fn validate(&self) -> Result<()> {
        self.utc_offset()?;
        if let Some(month) = self.vacation_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(Error::InvalidConfig(format!(
                "vacation month {month} is outside 1-12"
            )));
        }
        if self.limit_business_days < self.priority_business_days {
            return Err(Error::InvalidConfig(format!(
                "limit band ({} days) ends before the priority band ({} days)",
                self.limit_business_days, self.priority_business_days
            )));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<UtcOffset> {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0).map_err(|_| {
            Error::InvalidConfig(format!(
                "utc offset of {} hours is out of range",
                self.utc_offset_hours
            ))
        })
    }

    /// Local calendar date of `now`.
    pub fn local_date(&self, now: OffsetDateTime) -> Result<Date> {
        Ok(now.to_offset(self.utc_offset()?).date())
    }

    pub fn is_vacation(&self, date: Date) -> bool {
        self.vacation_months.contains(&u8::from(date.month()))
    }
}

fn offset_hours<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i8, D::Error> {
    let hours = i8::deserialize(deserializer)?;
    UtcOffset::from_hms(hours, 0, 0)
        .map(|_| hours)
        .map_err(|_| serde::de::Error::custom(format!("utc offset of {hours} hours is out of range")))
}
