//! Batch resolution over a whole configuration.
//!
//! A [`MixinConfiguration`] is the explicit input of one configuration-build
//! cycle: the type catalog plus one ordered fact sequence per target.
//! Targets are independent, so they may be resolved in parallel; the report
//! is ordered by target regardless of scheduling.

use crate::cache::PlanCache;
use crate::catalog::TypeCatalog;
use crate::config::ResolverConfig;
use crate::context::build_context_with;
use crate::error::ResolutionError;
use crate::fact::Fact;
use crate::identity::TargetDescriptor;
use crate::plan::{CompositionPlan, PlanMergeError, PlanSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{info, warn};

pub const RESOLVE_CHECK_KIND: &str = "weave.resolve.report.v1";
pub const DEADLINE_EXCEEDED: &str = "batch.deadline_exceeded";

/// Catalog plus per-target fact sequences, each in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinConfiguration {
    pub catalog: TypeCatalog,
    pub targets: BTreeMap<TargetDescriptor, Vec<Fact>>,
}

impl MixinConfiguration {
    pub fn new(catalog: TypeCatalog) -> Self {
        Self {
            catalog,
            targets: BTreeMap::new(),
        }
    }

    /// Append a fact to the end of `target`'s sequence.
    pub fn push_fact(&mut self, target: TargetDescriptor, fact: impl Into<Fact>) {
        self.targets.entry(target).or_default().push(fact.into());
    }

    pub fn facts(&self, target: &TargetDescriptor) -> &[Fact] {
        self.targets.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// A configuration with only the given target.
    pub fn restrict_to(&self, target: &TargetDescriptor) -> Self {
        let mut targets = BTreeMap::new();
        if let Some(facts) = self.targets.get(target) {
            targets.insert(target.clone(), facts.clone());
        }
        Self {
            catalog: self.catalog.clone(),
            targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    Resolved { plan: CompositionPlan },
    Rejected { errors: Vec<ResolutionError> },

    /// Not scheduled before the batch deadline passed.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReport {
    pub target: TargetDescriptor,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub target_count: usize,
    pub resolved_count: usize,
    pub rejected_count: usize,
    pub deferred_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub check_kind: String,
    pub result: String,
    pub failure_classes: Vec<String>,
    pub warning_classes: Vec<String>,
    pub targets: Vec<TargetReport>,
    pub summary: BatchSummary,
}

impl BatchReport {
    fn from_targets(targets: Vec<TargetReport>) -> Self {
        let mut failure_classes = BTreeSet::new();
        let mut warning_classes = BTreeSet::new();
        let mut summary = BatchSummary {
            target_count: targets.len(),
            resolved_count: 0,
            rejected_count: 0,
            deferred_count: 0,
            error_count: 0,
            warning_count: 0,
        };

        for report in &targets {
            match &report.outcome {
                TargetOutcome::Resolved { plan } => {
                    summary.resolved_count += 1;
                    summary.warning_count += plan.warnings.len();
                    for warning in &plan.warnings {
                        warning_classes.insert(warning.warning_class().to_string());
                    }
                }
                TargetOutcome::Rejected { errors } => {
                    summary.rejected_count += 1;
                    summary.error_count += errors.len();
                    for err in errors {
                        failure_classes.insert(err.failure_class().to_string());
                    }
                }
                TargetOutcome::Deferred => {
                    summary.deferred_count += 1;
                    failure_classes.insert(DEADLINE_EXCEEDED.to_string());
                }
            }
        }

        let result = if failure_classes.is_empty() {
            "accepted".to_string()
        } else {
            "rejected".to_string()
        };
        Self {
            check_kind: RESOLVE_CHECK_KIND.to_string(),
            result,
            failure_classes: failure_classes.into_iter().collect(),
            warning_classes: warning_classes.into_iter().collect(),
            targets,
            summary,
        }
    }

    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }

    /// Plans of resolved targets, in target order.
    pub fn plans(&self) -> impl Iterator<Item = &CompositionPlan> {
        self.targets.iter().filter_map(|report| match &report.outcome {
            TargetOutcome::Resolved { plan } => Some(plan),
            _ => None,
        })
    }

    /// Every error, in target order.
    pub fn errors(&self) -> impl Iterator<Item = &ResolutionError> {
        self.targets
            .iter()
            .flat_map(|report| -> &[ResolutionError] {
                match &report.outcome {
                    TargetOutcome::Rejected { errors } => errors,
                    _ => &[],
                }
            })
    }

    pub fn plan_set(&self) -> Result<PlanSet, PlanMergeError> {
        PlanSet::from_plans(self.plans().cloned())
    }
}

/// Resolve every target of `configuration`.
pub fn resolve_batch(
    configuration: &MixinConfiguration,
    cache: &PlanCache,
    config: &ResolverConfig,
) -> BatchReport {
    let started = Instant::now();
    let deadline = config.batch.deadline();
    let targets: Vec<(&TargetDescriptor, &Vec<Fact>)> = configuration.targets.iter().collect();

    let resolve_one = |(target, facts): &(&TargetDescriptor, &Vec<Fact>)| -> TargetReport {
        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            return TargetReport {
                target: (*target).clone(),
                outcome: TargetOutcome::Deferred,
            };
        }
        let context = build_context_with((*target).clone(), facts, config);
        let outcome = match cache.get_or_resolve(&context, &configuration.catalog, config) {
            Ok(plan) => TargetOutcome::Resolved {
                plan: (*plan).clone(),
            },
            Err(errors) => TargetOutcome::Rejected { errors },
        };
        TargetReport {
            target: (*target).clone(),
            outcome,
        }
    };

    let reports: Vec<TargetReport> = if !config.batch.parallel {
        targets.iter().map(resolve_one).collect()
    } else if let Some(threads) = config.batch.threads {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| targets.par_iter().map(resolve_one).collect()),
            Err(err) => {
                warn!(threads, error = %err, "falling back to the global thread pool");
                targets.par_iter().map(resolve_one).collect()
            }
        }
    } else {
        targets.par_iter().map(resolve_one).collect()
    };

    let report = BatchReport::from_targets(reports);
    info!(
        targets = report.summary.target_count,
        resolved = report.summary.resolved_count,
        rejected = report.summary.rejected_count,
        deferred = report.summary.deferred_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch resolved"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::fact::MixinFact;
    use crate::identity::TypeRef;

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    fn target(name: &str) -> TargetDescriptor {
        TargetDescriptor::new(ty(name))
    }

    fn configuration() -> MixinConfiguration {
        let mut configuration = MixinConfiguration::new(TypeCatalog::new());
        for name in ["Order", "Invoice", "Customer"] {
            configuration.push_fact(target(name), MixinFact::builder(ty("M1")).build().unwrap());
        }
        configuration.push_fact(
            target("Invoice"),
            MixinFact::builder(ty("M2"))
                .depends_on(ty("M1"))
                .build()
                .unwrap(),
        );
        configuration.push_fact(
            target("Broken"),
            MixinFact::builder(ty("M1"))
                .depends_on(ty("Missing"))
                .build()
                .unwrap(),
        );
        configuration
    }

    fn outcomes(report: &BatchReport) -> Vec<(String, &'static str)> {
        report
            .targets
            .iter()
            .map(|r| {
                let outcome = match r.outcome {
                    TargetOutcome::Resolved { .. } => "resolved",
                    TargetOutcome::Rejected { .. } => "rejected",
                    TargetOutcome::Deferred => "deferred",
                };
                (r.target.to_string(), outcome)
            })
            .collect()
    }

    #[test]
    fn report_is_ordered_by_target_and_isolates_failures() {
        let report = resolve_batch(&configuration(), &PlanCache::new(), &ResolverConfig::default());
        assert_eq!(
            outcomes(&report),
            vec![
                ("Broken".to_string(), "rejected"),
                ("Customer".to_string(), "resolved"),
                ("Invoice".to_string(), "resolved"),
                ("Order".to_string(), "resolved"),
            ]
        );
        assert!(!report.accepted());
        assert_eq!(report.failure_classes, vec!["mixin.unsatisfied_dependency"]);
        assert_eq!(report.summary.resolved_count, 3);
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn sequential_and_parallel_runs_agree() {
        let sequential = ResolverConfig {
            batch: BatchConfig {
                parallel: false,
                ..BatchConfig::default()
            },
            ..ResolverConfig::default()
        };
        let pooled = ResolverConfig {
            batch: BatchConfig {
                threads: Some(2),
                ..BatchConfig::default()
            },
            ..ResolverConfig::default()
        };
        let a = resolve_batch(&configuration(), &PlanCache::new(), &sequential);
        let b = resolve_batch(&configuration(), &PlanCache::new(), &pooled);
        assert_eq!(a, b);
    }

    #[test]
    fn resolved_targets_are_cached() {
        let cache = PlanCache::new();
        let first = resolve_batch(&configuration(), &cache, &ResolverConfig::default());
        assert_eq!(cache.len(), 3);
        let second = resolve_batch(&configuration(), &cache, &ResolverConfig::default());
        assert_eq!(cache.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn passed_deadline_defers_every_target() {
        let config = ResolverConfig {
            batch: BatchConfig {
                deadline_ms: Some(0),
                ..BatchConfig::default()
            },
            ..ResolverConfig::default()
        };
        let report = resolve_batch(&configuration(), &PlanCache::new(), &config);
        assert_eq!(report.summary.deferred_count, 4);
        assert_eq!(report.failure_classes, vec![DEADLINE_EXCEEDED]);
        assert_eq!(report.plans().count(), 0);
    }

    #[test]
    fn plan_set_collects_resolved_targets() {
        let report = resolve_batch(&configuration(), &PlanCache::new(), &ResolverConfig::default());
        let plans = report.plan_set().unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(
            plans.get(&target("Invoice")).unwrap().call_chain(),
            "M2 -> M1 -> Invoice"
        );
    }
}
