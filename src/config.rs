//! Model configuration, read from a TOML file. Every section is optional and
//! falls back to compiled defaults; unknown keys are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::cache::{DiskCache, NoCache, ResultCache};
use crate::core::{Company, NoiseModel, Parameters};
use crate::data::Reports;
use crate::error::{ModelError, Result};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_CACHE_TTL_DAYS: u64 = 14;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// No directory means no caching.
    pub dir: Option<PathBuf>,
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_days: DEFAULT_CACHE_TTL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Pin "today" for reproducible runs; defaults to the local date.
    pub today: Option<NaiveDate>,
    pub data_dir: PathBuf,
    pub seed: u64,
    pub parameters: Parameters,
    pub noise: NoiseModel,
    pub cache: CacheConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            today: None,
            data_dir: PathBuf::from("data"),
            seed: DEFAULT_SEED,
            parameters: Parameters::default(),
            noise: NoiseModel::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Reads and validates `path`. Relative directories are resolved against
    /// the directory holding the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text).map_err(|source| ModelError::Config {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.data_dir = resolve(base, &config.data_dir);
            config.cache.dir = config.cache.dir.as_deref().map(|dir| resolve(base, dir));
        }
        config.validate()?;
        info!(path = %path.display(), data_dir = %config.data_dir.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        if self.cache.dir.is_some() && self.cache.ttl_days == 0 {
            return Err(ModelError::invalid(
                "cache.ttl_days",
                "must be > 0 when a cache dir is set",
            ));
        }
        Ok(())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn result_cache(&self) -> Box<dyn ResultCache> {
        match &self.cache.dir {
            Some(dir) => Box::new(DiskCache::with_ttl_days(dir, self.cache.ttl_days)),
            None => Box::new(NoCache),
        }
    }

    /// Loads the reports from `data_dir` and builds the company as of `today`.
    pub fn load_company(&self, today: NaiveDate) -> Result<Company> {
        let reports = Reports::load(&self.data_dir)?;
        Company::new(self.parameters.clone(), today, reports)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BonusPolicy;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ModelConfig::from_toml("").unwrap();
        assert_eq!(config, ModelConfig::default());
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.cache.ttl_days, 14);
        config.validate().unwrap();
    }

    #[test]
    fn full_file_overrides_every_section() {
        let config = ModelConfig::from_toml(
            r#"
today = "2024-03-15"
data_dir = "reports"
seed = 9

[parameters]
tax_rate = 0.3
n_months_buffer = 4
line_of_credit = 50000
bonus_policy = "conservative"
tax_months = [1, 4, 7, 10]

[noise]
max_payment_delay_months = 1

[cache]
dir = ".runway-cache"
ttl_days = 3
"#,
        )
        .unwrap();

        assert_eq!(config.today, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(config.seed, 9);
        assert_eq!(config.parameters.tax_rate, 0.3);
        assert_eq!(config.parameters.n_months_buffer, 4.0);
        assert_eq!(config.parameters.bonus_policy, BonusPolicy::Conservative);
        assert_eq!(config.parameters.tax_months, vec![1, 4, 7, 10]);
        assert_eq!(config.noise.max_payment_delay_months, 1);
        assert_eq!(config.noise.max_completion_delay_months, 2);
        assert_eq!(config.cache.ttl_days, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ModelConfig::from_toml("sed = 1").is_err());
        assert!(ModelConfig::from_toml("[parameters]\ntax = 0.3").is_err());
        assert!(ModelConfig::from_toml("[noise]\njitter = 2").is_err());
    }

    #[test]
    fn load_resolves_relative_dirs_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runway.toml");
        fs::write(&path, "data_dir = \"data\"\n[cache]\ndir = \"cache\"\n").unwrap();
        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, dir.path().join("data"));
        assert_eq!(config.cache.dir, Some(dir.path().join("cache")));

        fs::write(&path, "[parameters]\ntax_rate = 2.0\n").unwrap();
        assert!(matches!(
            ModelConfig::load(&path),
            Err(ModelError::InvalidParameter {
                name: "tax_rate",
                ..
            })
        ));

        fs::write(&path, "seed = \"many\"\n").unwrap();
        assert!(matches!(
            ModelConfig::load(&path),
            Err(ModelError::Config { .. })
        ));

        assert!(matches!(
            ModelConfig::load(&dir.path().join("missing.toml")),
            Err(ModelError::Io { .. })
        ));
    }

    #[test]
    fn pinned_today_wins_over_the_clock() {
        let config = ModelConfig {
            today: NaiveDate::from_ymd_opt(2024, 7, 4),
            ..ModelConfig::default()
        };
        assert_eq!(config.today(), NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
    }
}
