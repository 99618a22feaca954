//! Per-read recalibration.
//!
//! Architecture:
//! 1. Validate the read against the configured length ceiling
//! 2. Extract one covariate key per base for each event model
//! 3. Validate every key set before touching any buffer
//! 4. For each usable base, reuse the cached quality or run the formula
//! 5. Write results back into the caller's buffers in place
//!
//! A recalibrator is `Send + Sync` and meant to be shared by reference across
//! worker threads, each handling distinct reads. The only shared mutable state
//! is the [`RecalibrationCache`], which only grows.

use std::path::Path;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStats, RecalibrationCache, TableFingerprint};
use crate::config::RecalibrationConfig;
use crate::covariates::{CovariateExtractor, CovariateKey};
use crate::error::{Error, Result};
use crate::event::EventModel;
use crate::formula::RecalibrationFormula;
use crate::quantization::QuantizationTable;
use crate::read::Read;
use crate::report::RecalibrationReport;
use crate::tables::RecalibrationTables;

/// Thread-safe base quality recalibrator.
pub struct BaseRecalibrator {
    tables: Arc<RecalibrationTables>,
    quantization: QuantizationTable,
    extractor: Box<dyn CovariateExtractor>,
    cache: Arc<RecalibrationCache>,
    config: RecalibrationConfig,
}

impl std::fmt::Debug for BaseRecalibrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseRecalibrator")
            .field("tables", &self.tables.counts())
            .field("covariates", &self.extractor.covariate_count())
            .field("cache", &self.cache.stats())
            .field("config", &self.config)
            .finish()
    }
}

impl BaseRecalibrator {
    /// Load a report and build a recalibrator with its standard covariates.
    ///
    /// `config.quantization` selects native, disabled, or re-bucketed output.
    pub fn from_report_path(path: &Path, config: RecalibrationConfig) -> Result<Self> {
        let report = RecalibrationReport::from_path(path)?;
        Self::from_report(report, config)
    }

    pub fn from_report(report: RecalibrationReport, config: RecalibrationConfig) -> Result<Self> {
        let extractor = report.covariate_extractor()?;
        let quantization = report.quantization().resolve(config.quantization);
        let (tables, _) = report.into_parts();
        Self::new(Arc::new(tables), quantization, Box::new(extractor), config)
    }

    /// Build from pre-parsed parts with a fresh cache.
    pub fn new(
        tables: Arc<RecalibrationTables>,
        quantization: QuantizationTable,
        extractor: Box<dyn CovariateExtractor>,
        config: RecalibrationConfig,
    ) -> Result<Self> {
        config.validate()?;
        let fingerprint =
            TableFingerprint::compute(&tables, &quantization, config.max_recalibrated_quality);
        let cache = Arc::new(RecalibrationCache::new(fingerprint));
        Self::assemble(tables, quantization, extractor, cache, config)
    }

    /// Build from pre-parsed parts around an existing cache.
    ///
    /// Fails with [`Error::CacheMismatch`] unless the cache was created for
    /// the same tables, quantization, and quality ceiling.
    pub fn with_shared_cache(
        tables: Arc<RecalibrationTables>,
        quantization: QuantizationTable,
        extractor: Box<dyn CovariateExtractor>,
        config: RecalibrationConfig,
        cache: Arc<RecalibrationCache>,
    ) -> Result<Self> {
        config.validate()?;
        let fingerprint =
            TableFingerprint::compute(&tables, &quantization, config.max_recalibrated_quality);
        if cache.fingerprint() != fingerprint {
            return Err(Error::CacheMismatch {
                expected: cache.fingerprint().to_string(),
                actual: fingerprint.to_string(),
            });
        }
        Self::assemble(tables, quantization, extractor, cache, config)
    }

    fn assemble(
        tables: Arc<RecalibrationTables>,
        quantization: QuantizationTable,
        extractor: Box<dyn CovariateExtractor>,
        cache: Arc<RecalibrationCache>,
        config: RecalibrationConfig,
    ) -> Result<Self> {
        if extractor.covariate_count() < 2 {
            return Err(Error::Config(
                "covariate extractor must produce read group and quality".to_string(),
            ));
        }
        log::info!(
            "recalibrator ready: table set {}, {} covariates, {} quantization levels",
            cache.fingerprint(),
            extractor.covariate_count(),
            quantization.levels()
        );
        Ok(Self {
            tables,
            quantization,
            extractor,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &RecalibrationConfig {
        &self.config
    }

    pub fn quantization(&self) -> &QuantizationTable {
        &self.quantization
    }

    pub fn tables(&self) -> &RecalibrationTables {
        &self.tables
    }

    /// Handle to the cache, for injection into another recalibrator.
    pub fn cache(&self) -> Arc<RecalibrationCache> {
        Arc::clone(&self.cache)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Recalibrate all three quality buffers of `read` in place.
    ///
    /// On error no buffer has been modified.
    pub fn recalibrate_read(&self, read: &mut Read) -> Result<()> {
        let len = read.len();
        if len > self.config.max_read_length {
            return Err(Error::ReadTooLong {
                name: read.name.clone(),
                length: len,
                max: self.config.max_read_length,
            });
        }

        let mut key_sets: [Vec<CovariateKey>; 3] = Default::default();
        for event in EventModel::ALL {
            key_sets[event.index()] = self.validated_keys(read, event)?;
        }

        let formula = RecalibrationFormula::new(&self.tables, self.config.max_recalibrated_quality);
        for event in EventModel::ALL {
            let keys = std::mem::take(&mut key_sets[event.index()]);
            let quals = read.qualities_mut(event);
            for (qual, key) in quals.iter_mut().zip(keys) {
                if *qual < self.config.min_usable_quality {
                    continue;
                }
                *qual = self
                    .cache
                    .get_or_compute(CacheKey { event, key }, |k| {
                        formula.recalibrate(&k.key, k.event, &self.quantization)
                    });
            }
        }
        Ok(())
    }

    /// Recalibrated quality for a single key, through the cache.
    ///
    /// Malformed keys are rejected before the cache is consulted.
    pub fn recalibrate_key(&self, event: EventModel, key: CovariateKey) -> Result<u8> {
        self.check_key(0, &key)?;
        let formula = RecalibrationFormula::new(&self.tables, self.config.max_recalibrated_quality);
        Ok(self.cache.get_or_compute(CacheKey { event, key }, |k| {
            formula.recalibrate(&k.key, k.event, &self.quantization)
        }))
    }

    fn validated_keys(&self, read: &Read, event: EventModel) -> Result<Vec<CovariateKey>> {
        let len = read.len();
        let quals = read.qualities(event).len();
        if quals != len {
            return Err(Error::QualityLengthMismatch {
                name: read.name.clone(),
                event,
                expected: len,
                actual: quals,
            });
        }

        let keys = self.extractor.extract(read, event)?;
        if keys.len() != len {
            return Err(Error::KeyCountMismatch {
                name: read.name.clone(),
                event,
                expected: len,
                actual: keys.len(),
            });
        }

        for (offset, key) in keys.iter().enumerate() {
            self.check_key(offset, key)?;
        }
        Ok(keys)
    }

    fn check_key(&self, offset: usize, key: &CovariateKey) -> Result<()> {
        let arity = self.extractor.covariate_count();
        if key.len() != arity {
            return Err(Error::KeyArity {
                offset,
                expected: arity,
                actual: key.len(),
            });
        }
        if key.read_group() < 0 {
            return Err(Error::MalformedKey {
                offset,
                reason: format!("negative read group {}", key.read_group()),
            });
        }
        if key.reported_quality() < 0 {
            return Err(Error::MalformedKey {
                offset,
                reason: format!("negative reported quality {}", key.reported_quality()),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
