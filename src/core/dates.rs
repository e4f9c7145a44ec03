//! Calendar-month arithmetic. Everything here works on whole calendar months
//! rather than 30-day approximations.

use chrono::{Datelike, Months, NaiveDate};

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Shift `date` by `months` calendar months, clamping the day to the end of
/// the target month (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(if months >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}

/// Number of calendar month boundaries between `earlier` and `later`.
/// Negative when `later` is actually earlier.
pub fn months_between(later: NaiveDate, earlier: NaiveDate) -> i32 {
    (later.year() - earlier.year()) * 12 + later.month() as i32 - earlier.month() as i32
}

pub fn end_of_last_month(today: NaiveDate) -> NaiveDate {
    first_of_month(today).pred_opt().unwrap_or(NaiveDate::MIN)
}

/// End of the relative simulation month `month`; month 0 is the month that
/// contains `today`.
pub fn month_end_in(today: NaiveDate, month: usize) -> NaiveDate {
    end_of_month(add_months(first_of_month(today), month as i32))
}

/// Month ends from `start`'s month through `end`, inclusive of `end` when it is
/// itself a month end.
pub fn iter_end_of_months(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let mut next = Some(end_of_month(start));
    std::iter::from_fn(move || {
        let current = next.filter(|date| *date <= end)?;
        next = current.succ_opt().map(end_of_month);
        Some(current)
    })
}

/// Months left in the calendar year, counting the current one.
pub fn months_to_end_of_year(today: NaiveDate) -> usize {
    (12 - today.month() + 1) as usize
}

pub fn days_in_year(year: i32) -> i64 {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1);
    match (start, end) {
        (Some(start), Some(end)) => (end - start).num_days(),
        _ => 365,
    }
}
