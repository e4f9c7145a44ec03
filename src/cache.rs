//! Memoisation of expensive runs. A cache is an explicit capability handed to
//! the caller's entry point; there is no global cache.
//!
//! Keys are the method name plus a SHA-256 digest of the serialized
//! arguments. Disk entries are JSON files that expire after a TTL.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::{
    Company, Parameters, Person, SimulationOutputs, SimulationRequest, simulate_monthly_cash,
};
use crate::data::{MonthlyFinancials, ProjectedInvoice, UnpaidInvoice};
use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: &'static str,
    digest: String,
}

impl CacheKey {
    pub fn new<A: Serialize + ?Sized>(method: &'static str, args: &A) -> Result<Self> {
        let bytes = serde_json::to_vec(args).map_err(|err| ModelError::Cache {
            path: PathBuf::from(method),
            reason: format!("cannot serialize arguments: {err}"),
        })?;
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
        let digest = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Ok(Self { method, digest })
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.method, self.digest)
    }
}

pub trait ResultCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<serde_json::Value>>;
    fn put(&self, key: &CacheKey, value: &serde_json::Value) -> Result<()>;
}

/// Always misses and never stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ResultCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    fn put(&self, _key: &CacheKey, _value: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn with_ttl_days(dir: impl Into<PathBuf>, days: u64) -> Self {
        Self::new(dir, Duration::from_secs(days * 24 * 60 * 60))
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn is_fresh(&self, path: &Path) -> Result<bool> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        Ok(age < self.ttl)
    }
}

impl ResultCache for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        if !self.is_fresh(&path)? {
            debug!(path = %path.display(), "cache entry expired");
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring corrupt cache entry");
                Ok(None)
            }
        }
    }

    fn put(&self, key: &CacheKey, value: &serde_json::Value) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| ModelError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(value).map_err(|err| ModelError::Cache {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        // Readers never observe a partial entry: write aside, then rename.
        let mut staged =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|source| ModelError::Io {
                path: self.dir.clone(),
                source,
            })?;
        staged.write_all(&bytes).map_err(|source| ModelError::Io {
            path: staged.path().to_path_buf(),
            source,
        })?;
        staged.persist(&path).map_err(|err| ModelError::Io {
            path,
            source: err.error,
        })?;
        Ok(())
    }
}

/// Returns the cached result for `key`, or computes and stores it. An entry
/// that no longer deserializes into `T` is recomputed.
pub fn cached<T, F>(cache: &dyn ResultCache, key: &CacheKey, compute: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if let Some(value) = cache.get(key)? {
        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!(method = key.method(), digest = key.digest(), "cache hit");
                return Ok(hit);
            }
            Err(err) => warn!(method = key.method(), %err, "discarding unreadable cache entry"),
        }
    }

    let result = compute()?;
    let value = serde_json::to_value(&result).map_err(|err| ModelError::Cache {
        path: PathBuf::from(key.file_name()),
        reason: err.to_string(),
    })?;
    cache.put(key, &value)?;
    Ok(result)
}

/// Everything a simulation run depends on, in serializable form.
#[derive(Serialize)]
struct SimulationArgs<'a> {
    today: NaiveDate,
    parameters: &'a Parameters,
    request: &'a SimulationRequest,
    people: &'a [Person],
    cash_in_bank: &'a [(NaiveDate, f64)],
    profit_loss: &'a [MonthlyFinancials],
    per_person_costs: &'a [f64],
    average_fixed_cost: f64,
    unpaid_invoices: &'a [UnpaidInvoice],
    invoice_projections: &'a [ProjectedInvoice],
}

pub fn simulation_key(company: &Company, request: &SimulationRequest) -> Result<CacheKey> {
    let basis = company.cost_basis();
    CacheKey::new(
        "simulate_monthly_cash",
        &SimulationArgs {
            today: company.today(),
            parameters: company.params(),
            request,
            people: company.people(),
            cash_in_bank: company.balance_sheet().historical_cash_in_bank(),
            profit_loss: company.profit_loss().months(),
            per_person_costs: &basis.per_person_costs,
            average_fixed_cost: basis.average_fixed_cost,
            unpaid_invoices: company.unpaid_invoices().invoices(),
            invoice_projections: company.invoice_projections().projections(),
        },
    )
}

pub fn simulate_monthly_cash_cached(
    company: &Company,
    request: &SimulationRequest,
    cache: &dyn ResultCache,
) -> Result<SimulationOutputs> {
    let key = simulation_key(company, request)?;
    cached(cache, &key, || simulate_monthly_cash(company, request))
}
