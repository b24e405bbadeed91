//! # Weave Kernel
//!
//! Deterministic mixin composition: given declarative facts about which
//! mixins apply to a target type, compute the order in which those mixins
//! wrap the target (its call chain) or explain exactly why no such order
//! exists.
//!
//! The kernel performs no I/O and never reflects over real types. Facts and
//! type metadata arrive as plain values; plans leave as plain values.
//!
//! ## Architecture
//!
//! ```text
//! Fact sequence (per target)   ← MixinFact | CompleteInterfaceFact
//!     │
//! ClassContext                 ← suppression, merge, conflicts
//!     │
//! DependencyGraph              ← explicit, interface and definition edges
//!     │
//! resolve_order                ← Kahn, lowest declaration index first
//!     │
//! CompositionPlan              ← ordered mixins + content hash
//! ```
//!
//! [`resolve_batch`] runs the pipeline over every target of a
//! [`MixinConfiguration`], sharing a [`PlanCache`].

pub mod batch;
pub mod boundary;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod fact;
pub mod graph;
pub mod hash;
pub mod identity;
pub mod order;
pub mod plan;
pub mod resolve;
pub mod validate;

pub use batch::{
    BatchReport, BatchSummary, MixinConfiguration, TargetOutcome, TargetReport, resolve_batch,
};
pub use boundary::{FactSource, PlanConsumer, generate_all};
pub use cache::PlanCache;
pub use catalog::{CatalogError, GenericParam, TypeCatalog, TypeDecl, TypeKind};
pub use config::{BatchConfig, ConfigError, DEFAULT_CONFIG_PATH, ResolverConfig};
pub use context::{ClassContext, MixinConflict, MixinEntry, build_context, build_context_with};
pub use error::{Application, ResolutionError, ResolutionWarning, failure_class, warning_class};
pub use fact::{
    CompleteInterfaceFact, Fact, FactError, MemberVisibility, MixinFact, MixinFactBuilder,
    MixinKind,
};
pub use graph::{DependencyEdge, DependencyGraph, EdgeSource, build_graph};
pub use hash::ContentHash;
pub use identity::{TargetDescriptor, TypeArg, TypeRef, TypeRefParseError};
pub use order::{MixinCycle, resolve_order};
pub use plan::{
    CompositionPlan, PLAN_SCHEMA, PlanMergeError, PlanSet, PlannedMixin, ValidationStatus,
    assemble,
};
pub use resolve::{resolve_context, resolve_target};
pub use validate::{Validated, check_context, validate};
