//! # weave-store
//!
//! Persistence for the resolver's inputs and outputs.
//!
//! This crate provides:
//! - JSONL fact streams (`type`, `mixin`, `complete_interface` records) read
//!   into a `MixinConfiguration`, and a `FactSource` over them
//! - a JSONL plan store with schema and content-hash checks on load
//! - the shared JSONL substrate (corruption checks, atomic replace)
//!
//! ## Data flow
//!
//! ```text
//! facts.jsonl ──► JsonlFactSource ──► resolve_batch ──► PlanStoreWriter ──► plans.jsonl
//! ```

pub mod facts;
pub mod jsonl;
pub mod plan_store;

pub use facts::{
    FactRecord, JsonlFactSource, configuration_records, read_configuration,
    read_configuration_from_path, write_configuration, write_configuration_to_path,
};
pub use jsonl::JsonlError;
pub use plan_store::{
    PlanStoreError, PlanStoreWriter, read_plans, read_plans_from_path, write_plans_to_path,
};
