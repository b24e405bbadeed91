//! Collaborator boundaries.
//!
//! The resolver sits between a fact producer (which scans compiled
//! assemblies and emits facts) and a code generator (which turns plans into
//! composed types). Both are traits so either side can be swapped without
//! touching resolution.

use crate::batch::{BatchReport, MixinConfiguration};
use crate::plan::CompositionPlan;

/// Produces the facts and type metadata of one configuration-build cycle.
pub trait FactSource {
    type Error: std::error::Error;

    fn load(&self) -> Result<MixinConfiguration, Self::Error>;
}

/// Consumes valid plans, typically by generating a composed type per plan.
pub trait PlanConsumer {
    type Handle;
    type Error: std::error::Error;

    fn generate(&mut self, plan: &CompositionPlan) -> Result<Self::Handle, Self::Error>;
}

/// Hand every resolved plan of `report` to `consumer`, in target order.
///
/// Rejected and deferred targets are skipped; the consumer only ever sees
/// valid plans. Stops at the first consumer error.
pub fn generate_all<C: PlanConsumer>(
    report: &BatchReport,
    consumer: &mut C,
) -> Result<Vec<C::Handle>, C::Error> {
    report.plans().map(|plan| consumer.generate(plan)).collect()
}

impl FactSource for MixinConfiguration {
    type Error = std::convert::Infallible;

    fn load(&self) -> Result<MixinConfiguration, Self::Error> {
        Ok(self.clone())
    }
}
