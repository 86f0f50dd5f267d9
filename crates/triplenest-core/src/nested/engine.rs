//! Depth-first execution of a nested query.
//!
//! Every level streams its rows once. A change of the pivot value opens a new
//! group and enters the next level, bound with values of the current row, so
//! at most one cursor per level is open at any time.

use tracing::{debug, info, instrument, warn};

use crate::collector::ResultCollector;
use crate::config::{ExecutionConfig, FailurePolicy};
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;

use super::chain::NestedQuery;
use super::pivot::PivotStack;

/// Counters of a completed execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Rows read over all levels.
    pub rows: u64,
    /// Level invocations, skipped ones included.
    pub level_invocations: u64,
    /// Level invocations skipped under the lenient failure policy.
    pub levels_skipped: u64,
    /// Deepest number of simultaneously streaming levels.
    pub max_depth: usize,
}

impl NestedQuery {
    /// Execute the chain with the default configuration.
    ///
    /// `args` bind the input variables of level 0.
    pub fn execute<E, C, S>(
        &self,
        executor: &E,
        collector: &mut C,
        args: &[S],
    ) -> Result<ExecutionSummary>
    where
        E: QueryExecutor + ?Sized,
        C: ResultCollector + ?Sized,
        S: AsRef<str>,
    {
        self.execute_with_config(executor, collector, args, &ExecutionConfig::default())
    }

    /// Execute the chain.
    ///
    /// All execution state lives in this call, so a chain can be executed
    /// concurrently with independent executors and collectors.
    #[instrument(skip_all, fields(levels = self.len()))]
    pub fn execute_with_config<E, C, S>(
        &self,
        executor: &E,
        collector: &mut C,
        args: &[S],
        config: &ExecutionConfig,
    ) -> Result<ExecutionSummary>
    where
        E: QueryExecutor + ?Sized,
        C: ResultCollector + ?Sized,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let mut run = Run {
            chain: self,
            executor,
            collector,
            config,
            pivots: PivotStack::new(config.pivot_order),
            summary: ExecutionSummary::default(),
        };

        run.collector.begin()?;
        run.process_level(0, &args)?;
        run.collector.end()?;

        let summary = run.summary;
        info!(
            rows = summary.rows,
            invocations = summary.level_invocations,
            skipped = summary.levels_skipped,
            max_depth = summary.max_depth,
            "nested query completed"
        );
        Ok(summary)
    }
}

struct Run<'a, E: ?Sized, C: ?Sized> {
    chain: &'a NestedQuery,
    executor: &'a E,
    collector: &'a mut C,
    config: &'a ExecutionConfig,
    pivots: PivotStack,
    summary: ExecutionSummary,
}

impl<E, C> Run<'_, E, C>
where
    E: QueryExecutor + ?Sized,
    C: ResultCollector + ?Sized,
{
    fn process_level(&mut self, index: usize, args: &[String]) -> Result<()> {
        self.check_cancelled()?;

        let chain = self.chain;
        let executor = self.executor;
        let Some(level) = chain.level(index) else {
            return Err(Error::InvalidChain {
                level: index,
                reason: "level does not exist".to_string(),
            });
        };

        self.summary.level_invocations += 1;
        debug!(level = index, name = level.name(), args = ?args, "executing level");

        let mut cursor = match level.query().perform(executor, args) {
            Ok(cursor) => cursor,
            Err(err) if self.can_skip(index, &err) => {
                warn!(
                    level = index,
                    name = level.name(),
                    args = ?args,
                    error = %err,
                    "skipping level"
                );
                self.summary.levels_skipped += 1;
                return self.collector.level_error(index, level.name(), &err);
            }
            Err(err) => return Err(err),
        };

        self.collector.start_level(index, level.name(), args)?;
        self.pivots.enter();
        self.summary.max_depth = self.summary.max_depth.max(self.pivots.depth());

        let bindings = cursor.bindings().to_vec();
        let position = |name: &str| bindings.iter().position(|b| b == name);
        let pivot_at = position(level.pivot());
        let property = level
            .property_pivot()
            .map(|pp| (pp, position(&pp.property), position(&pp.remap_key)));
        let next = chain.level(index + 1);
        // Pivot changes enter the next level unless it takes the property
        // pivot's remapped binding and the row cannot bind all of its inputs.
        let descends = next.is_some_and(|next| {
            let inputs = next.query().in_variables();
            match level.property_pivot() {
                Some(pp) if inputs.contains(&pp.remap) => {
                    inputs.iter().all(|var| bindings.contains(var))
                }
                _ => true,
            }
        });

        while cursor.advance()? {
            self.check_cancelled()?;
            self.summary.rows += 1;

            let values = cursor.values();
            self.collector.values(values)?;

            let pivot_value = value_at(values, pivot_at, level.pivot(), index)?;
            if self.pivots.observe(index, pivot_value)? {
                self.collector.pivot(pivot_value)?;
                if let (true, Some(next)) = (descends, next) {
                    let next_args = bind_arguments(
                        next.query().in_variables(),
                        &bindings,
                        values,
                        None,
                        index + 1,
                    )?;
                    self.process_level(index + 1, &next_args)?;
                }
            }

            if let (Some((pp, property_at, remap_at)), Some(next)) = (property, next) {
                if value_at(values, property_at, &pp.property, index)? == pp.value {
                    let remapped = value_at(values, remap_at, &pp.remap_key, index)?;
                    let next_args = bind_arguments(
                        next.query().in_variables(),
                        &bindings,
                        values,
                        Some((pp.remap.as_str(), remapped)),
                        index + 1,
                    )?;
                    self.collector.start_property_pivot(&pp.value)?;
                    self.process_level(index + 1, &next_args)?;
                    self.collector.end_property_pivot(&pp.value)?;
                }
            }

            self.collector.collect(&bindings, values)?;
        }

        self.pivots.exit();
        self.collector.end_level(index)
    }

    fn can_skip(&self, index: usize, err: &Error) -> bool {
        self.config.failure_policy == FailurePolicy::Lenient
            && index > 0
            && matches!(err, Error::Execution(e) if e.is_rejection())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.config.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

fn value_at<'v>(
    values: &'v [String],
    at: Option<usize>,
    binding: &str,
    level: usize,
) -> Result<&'v str> {
    at.and_then(|i| values.get(i))
        .map(String::as_str)
        .ok_or_else(|| Error::BindingNotFound {
            binding: binding.to_string(),
            level,
        })
}

/// Resolve `variables` by name against a row. `extra` takes precedence over
/// the row's own bindings.
fn bind_arguments(
    variables: &[String],
    bindings: &[String],
    values: &[String],
    extra: Option<(&str, &str)>,
    level: usize,
) -> Result<Vec<String>> {
    variables
        .iter()
        .map(|var| {
            if let Some((name, value)) = extra {
                if name == var.as_str() {
                    return Ok(value.to_string());
                }
            }
            bindings
                .iter()
                .position(|b| b == var)
                .and_then(|i| values.get(i))
                .cloned()
                .ok_or_else(|| Error::UnboundVariable {
                    variable: var.clone(),
                    level,
                })
        })
        .collect()
}
