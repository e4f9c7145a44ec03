use std::path::PathBuf;

use chrono::NaiveDate;

/// Every failure the model can surface. Simulated insolvency is an outcome,
/// not an error, so nothing here describes a bad universe.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("revenues and costs must have the same length (got {revenues} revenues, {costs} costs)")]
    LengthMismatch { revenues: usize, costs: usize },

    #[error("no historical {series} data available")]
    EmptyHistory { series: &'static str },

    #[error(
        "double check the invoice projections: there is a projected invoice dated {date} \
         at or before {now}; correct the spreadsheet or try specifying --today"
    )]
    StaleProjection { date: NaiveDate, now: NaiveDate },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unparseable date {value:?} in {context}")]
    InvalidDate { value: String, context: String },

    #[error("unparseable amount {value:?} in {context}")]
    InvalidAmount { value: String, context: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("result cache failure at {path}: {reason}")]
    Cache { path: PathBuf, reason: String },

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

impl ModelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the input data rather than by how the model
    /// was invoked.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            ModelError::StaleProjection { .. }
                | ModelError::EmptyHistory { .. }
                | ModelError::InvalidDate { .. }
                | ModelError::InvalidAmount { .. }
                | ModelError::Csv { .. }
        )
    }
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_name_the_path_for_reads_and_writes() {
        let err = ModelError::Io {
            path: PathBuf::from("cache/entry.json"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(err.to_string(), "I/O error at cache/entry.json: disk full");
        assert!(!err.is_data_integrity());
    }
}
