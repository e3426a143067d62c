//! Reporting periods for the admin order listing
//!
//! Every period resolves to a half-open UTC range `[start, end)` plus the
//! calendar dates reported back in the response meta. Days are UTC days.

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc};

use super::models::OrderListQuery;
use crate::core_types::text_enum;
use crate::error::ServiceError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    Today,
    Yesterday,
    /// Rolling seven days up to now
    Week,
    /// Rolling calendar month up to now
    Month,
    Custom,
}

text_enum!(Period, "period", {
    All => "all",
    Today => "today",
    Yesterday => "yesterday",
    Week => "week",
    Month => "month",
    Custom => "custom",
});

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRange {
    pub period: Period,
    /// `None` means no time restriction
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub start_date: Option<NaiveDate>,
    /// Inclusive
    pub end_date: Option<NaiveDate>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, ServiceError> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| ServiceError::validation("date out of range"))
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        ServiceError::validation(format!("invalid '{}' date format (use YYYY-MM-DD)", field))
    })
}

/// Resolve the query against `now`
pub fn resolve(query: &OrderListQuery, now: DateTime<Utc>) -> Result<PeriodRange, ServiceError> {
    let period = match query.period.as_deref().map(str::trim) {
        None | Some("") => Period::All,
        Some(p) => p
            .parse::<Period>()
            .map_err(|e| ServiceError::validation(e.to_string()))?,
    };

    let today = now.date_naive();
    let tomorrow = midnight(next_day(today)?);

    let resolved = match period {
        Period::All => PeriodRange {
            period,
            range: None,
            start_date: None,
            end_date: None,
        },
        Period::Today => PeriodRange {
            period,
            range: Some((midnight(today), tomorrow)),
            start_date: Some(today),
            end_date: Some(today),
        },
        Period::Yesterday => {
            let yesterday = today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| ServiceError::validation("date out of range"))?;
            PeriodRange {
                period,
                range: Some((midnight(yesterday), midnight(today))),
                start_date: Some(yesterday),
                end_date: Some(yesterday),
            }
        }
        Period::Week => {
            let start = now - chrono::Duration::days(7);
            PeriodRange {
                period,
                range: Some((start, tomorrow)),
                start_date: Some(start.date_naive()),
                end_date: Some(today),
            }
        }
        Period::Month => {
            let start = now
                .checked_sub_months(Months::new(1))
                .ok_or_else(|| ServiceError::validation("date out of range"))?;
            PeriodRange {
                period,
                range: Some((start, tomorrow)),
                start_date: Some(start.date_naive()),
                end_date: Some(today),
            }
        }
        Period::Custom => {
            let from = query
                .from
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_date(s, "from"))
                .transpose()?;
            let to = query
                .to
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_date(s, "to"))
                .transpose()?;

            if let (Some(from), Some(to)) = (from, to) {
                if from > to {
                    return Err(ServiceError::validation("'from' must not be after 'to'"));
                }
            }

            let start = from.map(midnight).unwrap_or(DateTime::UNIX_EPOCH);
            let end = match to {
                Some(to) => midnight(next_day(to)?),
                None => tomorrow,
            };
            PeriodRange {
                period,
                range: Some((start, end)),
                start_date: from,
                end_date: Some(to.unwrap_or(today)),
            }
        }
    };
    Ok(resolved)
}
