use std::path::Path;

use serde::Deserialize;

use super::parse::{parse_date, parse_fraction, parse_optional_date, read_records, row_context};
use crate::core::Person;
use crate::error::{ModelError, Result};

#[derive(Debug, Deserialize)]
struct RosterRecord {
    name: String,
    start_date: String,
    #[serde(default)]
    end_date: String,
    #[serde(default)]
    partner_date: String,
    #[serde(default)]
    ownership: String,
}

pub fn load_roster(path: &Path) -> Result<Vec<Person>> {
    let records: Vec<RosterRecord> = read_records(path)?;
    let mut people = Vec::with_capacity(records.len());
    for (row, record) in records.into_iter().enumerate() {
        let context = row_context(path, row);
        let ownership = parse_fraction(&record.ownership, &context)?;
        if !(0.0..=1.0).contains(&ownership) {
            return Err(ModelError::InvalidAmount {
                value: record.ownership,
                context: format!("{context}: ownership must be between 0% and 100%"),
            });
        }
        people.push(Person {
            start_date: parse_date(&record.start_date, &context)?,
            end_date: parse_optional_date(&record.end_date, &context)?,
            partner_date: parse_optional_date(&record.partner_date, &context)?,
            ownership,
            name: record.name,
        });
    }
    Ok(people)
}
