//! JSONL plan store: one composition plan per line.
//!
//! Plans are rehydrated without re-resolving, so every loaded plan is
//! checked for a supported schema and a content hash that matches its own
//! content before it is trusted.

use crate::jsonl::{JsonlError, open_checked, read_records, write_atomic, write_records};
use std::io::BufRead;
use std::path::Path;
use tracing::debug;
use weave_kernel::{
    CompositionPlan, ContentHash, PLAN_SCHEMA, PlanConsumer, PlanMergeError, PlanSet,
    TargetDescriptor,
};

/// Read and check every plan in a stream.
pub fn read_plans(reader: impl BufRead) -> Result<PlanSet, PlanStoreError> {
    let mut plans = PlanSet::new();
    for (line_no, plan) in read_records::<CompositionPlan>(reader)? {
        if plan.schema != PLAN_SCHEMA {
            return Err(PlanStoreError::Schema {
                line: line_no,
                target: plan.target,
                found: plan.schema,
            });
        }
        let computed = plan.compute_hash();
        if computed != plan.content_hash {
            return Err(PlanStoreError::HashMismatch {
                line: line_no,
                target: plan.target,
                stored: plan.content_hash,
                computed,
            });
        }
        plans.insert(plan)?;
    }
    Ok(plans)
}

pub fn read_plans_from_path(path: impl AsRef<Path>) -> Result<PlanSet, PlanStoreError> {
    let path = path.as_ref();
    let plans = read_plans(open_checked(path)?)?;
    debug!(path = %path.display(), plans = plans.len(), "plan store loaded");
    Ok(plans)
}

/// Atomically replace the store at `path` with `plans`, in target order.
pub fn write_plans_to_path(path: impl AsRef<Path>, plans: &PlanSet) -> Result<(), JsonlError> {
    write_atomic(path.as_ref(), |writer| write_records(writer, plans.iter()))
}

/// A [`PlanConsumer`] that collects plans for one atomic write.
#[derive(Debug, Default)]
pub struct PlanStoreWriter {
    plans: PlanSet,
}

impl PlanStoreWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn finish(self, path: impl AsRef<Path>) -> Result<PlanSet, JsonlError> {
        write_plans_to_path(path, &self.plans)?;
        Ok(self.plans)
    }
}

impl PlanConsumer for PlanStoreWriter {
    type Handle = ContentHash;
    type Error = PlanMergeError;

    fn generate(&mut self, plan: &CompositionPlan) -> Result<ContentHash, PlanMergeError> {
        self.plans.insert(plan.clone())?;
        Ok(plan.content_hash.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanStoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error(transparent)]
    Merge(#[from] PlanMergeError),

    #[error("line {line}: plan for {target} has unsupported schema {found}")]
    Schema {
        line: usize,
        target: TargetDescriptor,
        found: u32,
    },

    #[error(
        "line {line}: plan for {target} has content hash {} but its content hashes to {}",
        .stored.short(),
        .computed.short()
    )]
    HashMismatch {
        line: usize,
        target: TargetDescriptor,
        stored: ContentHash,
        computed: ContentHash,
    },
}
