use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::dates::days_in_year;

/// One employee or partner on the roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub partner_date: Option<NaiveDate>,
    /// Fraction of the company owned, in [0, 1].
    pub ownership: f64,
}

impl Person {
    pub fn new(name: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date: None,
            partner_date: None,
            ownership: 0.0,
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_partnership(mut self, partner_date: NaiveDate, ownership: f64) -> Self {
        self.partner_date = Some(partner_date);
        self.ownership = ownership;
        self
    }

    pub fn is_active(&self, date: NaiveDate) -> bool {
        if date < self.start_date {
            return false;
        }
        match self.end_date {
            Some(end) => date <= end,
            None => true,
        }
    }

    /// Partners keep their stake after leaving, so this ignores `end_date`.
    pub fn is_partner(&self, date: NaiveDate) -> bool {
        self.partner_date.is_some_and(|since| date >= since)
    }

    pub fn is_active_or_partner(&self, date: NaiveDate) -> bool {
        self.is_active(date) || self.is_partner(date)
    }

    /// Share of the calendar year containing `date` that this person was on
    /// the roster, counted in whole days.
    pub fn fraction_of_year(&self, date: NaiveDate) -> f64 {
        let year = date.year();
        let (Some(year_start), Some(year_end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return 0.0;
        };

        let from = self.start_date.max(year_start);
        let to = self.end_date.map_or(year_end, |end| end.min(year_end));
        if to < from {
            return 0.0;
        }
        let days = (to - from).num_days() + 1;
        days as f64 / days_in_year(year) as f64
    }
}
