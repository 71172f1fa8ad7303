//! The feature calculation engine
//!
//! `FeatureCalculator` ties the pieces together: it owns the worker
//! pool and the result cache, and runs feature sets over in-memory
//! frames (`calculate`, `batch_calculate`) or over a `DataSource` in
//! fixed-size batches (`calculate_streaming`).
//!
//! Row-wise work is chunked by `batch_size` and spread over the pool.
//! Any statistic feeding a transform or a `zscore()`-style call is
//! computed over the full (filtered) column before chunking, so the
//! chunk layout never changes a result.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use featurecalc_expr::{
    parse_expression, parse_predicate, predicate_stat_columns, stat_columns, EvalContext,
    Evaluator, Expr,
};
use featurecalc_io::{batches, Column, DataSource, Frame, IoResult};
use featurecalc_stats::Summary;

use crate::cache::{feature_key, frame_fingerprint, CacheStats, ResultCache};
use crate::config::CalcConfig;
use crate::error::{CalculationError, Result};
use crate::spec::{FeatureBody, FeatureSet, FeatureSpec};
use crate::transform::CompiledTransform;

/// Outcome of a streaming run
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamSummary {
    /// Rows read from the source
    pub rows_in: usize,
    /// Rows written after filtering
    pub rows_out: usize,
    /// Number of output batches handed to the sink
    pub batches: usize,
}

/// The feature calculation engine
pub struct FeatureCalculator {
    config: CalcConfig,
    pool: rayon::ThreadPool,
    cache: Option<ResultCache>,
}

impl FeatureCalculator {
    /// Create an engine from a configuration
    pub fn new(config: CalcConfig) -> Result<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers)
            .thread_name(|i| format!("featurecalc-{}", i))
            .build()
            .map_err(|e| {
                crate::config::ConfigError::Invalid(format!("failed to build worker pool: {}", e))
            })?;

        let cache = config
            .cache_enabled
            .then(|| ResultCache::new(&config.cache));

        tracing::debug!(
            "Feature calculator ready: {} workers, batch size {}, cache {}",
            config.max_workers,
            config.batch_size,
            if config.cache_enabled { "on" } else { "off" }
        );

        Ok(Self {
            config,
            pool,
            cache,
        })
    }

    /// Create an engine with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(CalcConfig::default())
    }

    /// Get the active configuration
    pub fn config(&self) -> &CalcConfig {
        &self.config
    }

    /// Get cache hit/miss counters, when caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    /// Compute a single feature over an in-memory frame
    pub fn calculate(&self, frame: &Frame, spec: &FeatureSpec) -> Result<Column> {
        spec.validate()?;
        let fingerprint = frame_fingerprint(frame);
        let mut stats = BTreeMap::new();
        let column = self.compute_feature(frame, spec, fingerprint, &mut stats)?;
        Ok((*column).clone())
    }

    /// Compute every feature of a set over an in-memory frame
    ///
    /// The optional row filter is applied first; features then see the
    /// filtered data, in spec order. Earlier features are visible to
    /// later ones. With `keep_input` the output carries the (filtered)
    /// input columns first.
    pub fn batch_calculate(&self, frame: &Frame, set: &FeatureSet) -> Result<Frame> {
        set.validate()?;

        let working = match &set.filter {
            Some(filter) => {
                let mask = self.filter_mask(frame, filter)?;
                let kept = mask.iter().filter(|&&m| m).count();
                tracing::debug!(
                    "Filter '{}' kept {} of {} rows",
                    filter,
                    kept,
                    frame.num_rows()
                );
                frame.filter_rows(&mask)
            }
            None => frame.clone(),
        };

        let mut fingerprint = frame_fingerprint(&working);
        let mut stats = BTreeMap::new();

        let mut output = Frame::new();
        if set.keep_input {
            for name in working.column_names() {
                let column = working.column(name).expect("names come from the frame");
                output.push_column(name.clone(), column.clone())?;
            }
        }

        // Later features may reference earlier ones, so computed
        // columns are appended to the working frame as we go. The
        // cache key must track the frame a feature actually reads,
        // which now includes its predecessors.
        let mut working = working;
        for spec in &set.features {
            let column = self.compute_feature(&working, spec, fingerprint, &mut stats)?;
            output.push_column(spec.name.clone(), (*column).clone())?;
            working.push_column(spec.name.clone(), (*column).clone())?;
            if self.cache.is_some() {
                fingerprint = frame_fingerprint(&working);
            }
        }

        tracing::info!(
            "Calculated {} features over {} rows",
            set.features.len(),
            output.num_rows()
        );
        Ok(output)
    }

    /// Compute a feature set over a `DataSource` in streaming batches
    ///
    /// Two phases: the first reads only the columns the filter and the
    /// per-column statistics need; the second walks `batch_size`-row
    /// batches and hands each output batch to `sink` without ever
    /// materializing the dataset. Output is identical to
    /// `batch_calculate` on the fully loaded frame.
    pub fn calculate_streaming<F>(
        &self,
        source: &dyn DataSource,
        set: &FeatureSet,
        mut sink: F,
    ) -> Result<StreamSummary>
    where
        F: FnMut(&Frame) -> IoResult<()>,
    {
        set.validate()?;
        let plan = StreamPlan::prepare(source, set)?;
        let total_rows = source.num_rows();

        tracing::info!(
            "Streaming {} features over {} rows of {} input in batches of {}",
            set.features.len(),
            total_rows,
            source.format_name(),
            self.config.batch_size
        );

        let mut summary = StreamSummary::default();
        for batch in batches(source, self.config.batch_size) {
            let batch = batch?;
            let batch_rows = batch.num_rows();

            let working = match &plan.mask {
                Some(mask) => {
                    let window = &mask[summary.rows_in..summary.rows_in + batch_rows];
                    batch.filter_rows(window)
                }
                None => batch,
            };
            summary.rows_in += batch_rows;

            if working.num_rows() == 0 {
                continue;
            }

            let mut output = Frame::new();
            if set.keep_input {
                for name in working.column_names() {
                    let column = working.column(name).expect("names come from the frame");
                    output.push_column(name.clone(), column.clone())?;
                }
            }

            let mut working = working;
            for spec in &set.features {
                let column = plan.compute_batch(&working, spec)?;
                output.push_column(spec.name.clone(), column.clone())?;
                working.push_column(spec.name.clone(), column)?;
            }

            summary.rows_out += output.num_rows();
            summary.batches += 1;
            sink(&output)?;
        }

        tracing::info!(
            "Streamed {} of {} rows in {} batches",
            summary.rows_out,
            summary.rows_in,
            summary.batches
        );
        Ok(summary)
    }

    /// Evaluate a filter over a full frame, chunked over the pool
    fn filter_mask(&self, frame: &Frame, filter: &str) -> Result<Vec<bool>> {
        let predicate = parse_predicate(filter)?;

        let mut needed = BTreeSet::new();
        predicate_stat_columns(&predicate, &mut needed);
        let mut stats = BTreeMap::new();
        ensure_stats(frame, &needed, &mut stats)?;

        let context = FrameContext {
            frame,
            stats: &stats,
        };
        let chunks = self.chunk_ranges(frame.num_rows());
        let mask: Vec<Vec<bool>> = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|&(start, end)| {
                    Evaluator::new(&context).evaluate_predicate_range(&predicate, start, end)
                })
                .collect::<std::result::Result<_, _>>()
        })?;
        Ok(mask.concat())
    }

    /// Compute one feature against a frame, consulting the cache
    fn compute_feature(
        &self,
        frame: &Frame,
        spec: &FeatureSpec,
        fingerprint: u64,
        stats: &mut BTreeMap<String, Summary>,
    ) -> Result<Arc<Column>> {
        let key = self.cache.is_some().then(|| {
            let spec_json = serde_json::to_string(spec).expect("specs serialize to JSON");
            feature_key(&spec_json, fingerprint)
        });

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(column) = cache.get(key) {
                tracing::debug!("Cache hit for feature '{}'", spec.name);
                return Ok(column);
            }
        }

        let column = Arc::new(self.evaluate_feature(frame, spec, stats)?);
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, Arc::clone(&column));
        }
        Ok(column)
    }

    /// Compute one feature against a frame, never touching the cache
    fn evaluate_feature(
        &self,
        frame: &Frame,
        spec: &FeatureSpec,
        stats: &mut BTreeMap<String, Summary>,
    ) -> Result<Column> {
        match &spec.body {
            FeatureBody::Expression { expr } => {
                let expr = parse_expression(expr)?;
                let mut needed = BTreeSet::new();
                stat_columns(&expr, &mut needed);
                ensure_stats(frame, &needed, stats)?;
                self.evaluate_expression(frame, &expr, stats)
            }
            FeatureBody::Transform {
                transform,
                source,
                params,
            } => {
                let values = numeric_column(frame, source)?;
                let compiled = CompiledTransform::compile(*transform, params, &values)?;
                Ok(apply_transform(&compiled, &values))
            }
        }
    }

    /// Evaluate a parsed expression over every row, chunked
    fn evaluate_expression(
        &self,
        frame: &Frame,
        expr: &Expr,
        stats: &BTreeMap<String, Summary>,
    ) -> Result<Column> {
        let context = FrameContext { frame, stats };
        let chunks = self.chunk_ranges(frame.num_rows());
        let values: Vec<Vec<f64>> = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|&(start, end)| Evaluator::new(&context).evaluate_range(expr, start, end))
                .collect::<std::result::Result<_, _>>()
        })?;
        Ok(Column::Float64(values.concat()))
    }

    fn chunk_ranges(&self, num_rows: usize) -> Vec<(usize, usize)> {
        let size = self.config.batch_size.max(1);
        (0..num_rows)
            .step_by(size)
            .map(|start| (start, (start + size).min(num_rows)))
            .collect()
    }
}

impl std::fmt::Debug for FeatureCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureCalculator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Evaluation context over a frame with precomputed column summaries
struct FrameContext<'a> {
    frame: &'a Frame,
    stats: &'a BTreeMap<String, Summary>,
}

impl EvalContext for FrameContext<'_> {
    fn column_value(&self, column: &str, row: usize) -> Option<f64> {
        self.frame.column(column)?.get_f64(row)
    }

    fn num_rows(&self) -> usize {
        self.frame.num_rows()
    }

    fn column_stats(&self, column: &str) -> Option<&Summary> {
        self.stats.get(column)
    }
}

/// Fill in summaries for any of `needed` not yet computed
fn ensure_stats(
    frame: &Frame,
    needed: &BTreeSet<String>,
    stats: &mut BTreeMap<String, Summary>,
) -> Result<()> {
    for name in needed {
        if stats.contains_key(name) {
            continue;
        }
        let values = numeric_column(frame, name)?;
        stats.insert(name.clone(), Summary::from_values(&values));
    }
    Ok(())
}

/// Read a column as f64 values, or fail with a calculation error
fn numeric_column(frame: &Frame, name: &str) -> Result<Vec<f64>> {
    let column = frame
        .column(name)
        .ok_or_else(|| CalculationError::UnknownColumn(name.to_string()))?;
    column.as_f64().ok_or_else(|| CalculationError::NotNumeric {
        column: name.to_string(),
        dtype: column.dtype().as_str(),
    })
}

fn apply_transform(transform: &CompiledTransform, values: &[f64]) -> Column {
    Column::Float64(values.iter().map(|&x| transform.apply(x)).collect())
}

/// Precomputed whole-column state for a streaming run
///
/// Every statistic and compiled transform a feature set needs is
/// resolved here, against full source columns, before the first batch
/// is read. Batches then only do row-wise work.
struct StreamPlan {
    mask: Option<Vec<bool>>,
    stats: BTreeMap<String, Summary>,
    expressions: BTreeMap<String, Expr>,
    transforms: BTreeMap<String, CompiledTransform>,
}

impl StreamPlan {
    fn prepare(source: &dyn DataSource, set: &FeatureSet) -> Result<Self> {
        let schema = source.schema()?;
        let source_columns: BTreeSet<&str> = schema.column_names().into_iter().collect();

        // Whole-column state can only come from source columns; a
        // feature whose statistics depend on another computed feature
        // would need the full output in memory.
        let mut needed_stats = BTreeSet::new();
        let filter = set
            .filter
            .as_deref()
            .map(parse_predicate)
            .transpose()?;
        if let Some(predicate) = &filter {
            predicate_stat_columns(predicate, &mut needed_stats);
        }
        let mut expressions = BTreeMap::new();
        for spec in &set.features {
            if let FeatureBody::Expression { expr } = &spec.body {
                let expr = parse_expression(expr)?;
                stat_columns(&expr, &mut needed_stats);
                expressions.insert(spec.name.clone(), expr);
            }
        }
        for name in &needed_stats {
            if !source_columns.contains(name.as_str()) {
                return Err(CalculationError::Streaming(format!(
                    "statistics for '{}' require a computed column; \
                     use batch calculation instead",
                    name
                )));
            }
        }

        // Filter first: transform statistics are taken over the rows
        // that survive it, exactly as in the in-memory path.
        let mask = match &filter {
            Some(predicate) => {
                let mut filter_columns = BTreeSet::new();
                predicate.collect_columns(&mut filter_columns);
                for name in &filter_columns {
                    if !source_columns.contains(name.as_str()) {
                        return Err(CalculationError::Streaming(format!(
                            "filter references computed column '{}'",
                            name
                        )));
                    }
                }

                let mut frame = Frame::new();
                for name in &filter_columns {
                    frame.push_column(name.clone(), source.read_column(name)?)?;
                }

                let mut filter_stats = BTreeMap::new();
                ensure_stats(&frame, &needed_stats_in(&frame, &needed_stats), &mut filter_stats)?;
                let context = FrameContext {
                    frame: &frame,
                    stats: &filter_stats,
                };
                Some(Evaluator::new(&context).evaluate_predicate(predicate)?)
            }
            None => None,
        };

        let mut stats = BTreeMap::new();
        for name in &needed_stats {
            let values = masked_column(source, name, mask.as_deref())?;
            stats.insert(name.clone(), Summary::from_values(&values));
        }

        let mut transforms = BTreeMap::new();
        for spec in &set.features {
            if let FeatureBody::Transform {
                transform,
                source: column,
                params,
            } = &spec.body
            {
                if !source_columns.contains(column.as_str()) {
                    return Err(CalculationError::Streaming(format!(
                        "transform '{}' reads computed column '{}'",
                        spec.name, column
                    )));
                }
                let values = masked_column(source, column, mask.as_deref())?;
                let compiled = CompiledTransform::compile(*transform, params, &values)?;
                transforms.insert(spec.name.clone(), compiled);
            }
        }

        Ok(Self {
            mask,
            stats,
            expressions,
            transforms,
        })
    }

    /// Compute one feature over a single (already filtered) batch
    fn compute_batch(&self, batch: &Frame, spec: &FeatureSpec) -> Result<Column> {
        match &spec.body {
            FeatureBody::Expression { .. } => {
                let expr = self
                    .expressions
                    .get(&spec.name)
                    .expect("every expression is parsed during planning");
                let context = FrameContext {
                    frame: batch,
                    stats: &self.stats,
                };
                let values = Evaluator::new(&context).evaluate(expr)?;
                Ok(Column::Float64(values))
            }
            FeatureBody::Transform { source, .. } => {
                let compiled = self
                    .transforms
                    .get(&spec.name)
                    .expect("every transform is compiled during planning");
                let values = numeric_column(batch, source)?;
                Ok(apply_transform(compiled, &values))
            }
        }
    }
}

/// Restrict a needed-stats set to the columns present in a frame
fn needed_stats_in(frame: &Frame, needed: &BTreeSet<String>) -> BTreeSet<String> {
    needed
        .iter()
        .filter(|name| frame.contains_column(name))
        .cloned()
        .collect()
}

/// Read a full column and drop the rows a mask excludes
fn masked_column(
    source: &dyn DataSource,
    name: &str,
    mask: Option<&[bool]>,
) -> Result<Vec<f64>> {
    let column = source.read_column(name)?;
    let column = match mask {
        Some(mask) => column.filter(mask),
        None => column,
    };
    column.as_f64().ok_or_else(|| CalculationError::NotNumeric {
        column: name.to_string(),
        dtype: column.dtype().as_str(),
    })
}
