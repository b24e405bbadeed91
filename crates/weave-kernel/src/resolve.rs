//! Per-target resolution pipeline.
//!
//! ```text
//! facts ─► build_context ─► validate (graph + order) ─► assemble ─► plan
//! ```
//!
//! Resolution fails closed: a target with any error gets every error and no
//! plan.

use crate::catalog::TypeCatalog;
use crate::config::ResolverConfig;
use crate::context::{ClassContext, build_context_with};
use crate::error::ResolutionError;
use crate::fact::Fact;
use crate::identity::TargetDescriptor;
use crate::plan::{CompositionPlan, assemble};
use crate::validate::validate;
use tracing::{debug, warn};

/// Resolve one target from its ordered fact sequence.
pub fn resolve_target(
    target: TargetDescriptor,
    facts: &[Fact],
    catalog: &TypeCatalog,
    config: &ResolverConfig,
) -> Result<CompositionPlan, Vec<ResolutionError>> {
    let context = build_context_with(target, facts, config);
    resolve_context(&context, catalog, config)
}

/// Resolve an already built context.
pub fn resolve_context(
    context: &ClassContext,
    catalog: &TypeCatalog,
    config: &ResolverConfig,
) -> Result<CompositionPlan, Vec<ResolutionError>> {
    match validate(context, catalog, config) {
        Ok(validated) => {
            let plan =
                assemble(context, &validated.order, catalog).with_warnings(validated.warnings);
            debug!(
                target_type = %plan.target,
                mixins = plan.mixins.len(),
                warnings = plan.warnings.len(),
                hash = %plan.content_hash.short(),
                "target resolved"
            );
            Ok(plan)
        }
        Err(errors) => {
            warn!(
                target_type = %context.target(),
                errors = errors.len(),
                first = %errors.first().map(ToString::to_string).unwrap_or_default(),
                "target rejected"
            );
            Err(errors)
        }
    }
}
