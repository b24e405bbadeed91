//! Composition plans.
//!
//! A plan is the immutable result of resolving one target: the mixins in
//! call-chain order (index 0 outermost, last innermost, next to the
//! target's own implementation) plus the complete interfaces, stamped with
//! a content hash. Plans serialize losslessly so they can be persisted and
//! rehydrated without re-resolving.

use crate::catalog::TypeCatalog;
use crate::context::ClassContext;
use crate::error::ResolutionWarning;
use crate::fact::{MemberVisibility, MixinKind};
use crate::hash::ContentHash;
use crate::identity::{TargetDescriptor, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PLAN_SCHEMA: u32 = 1;

/// One mixin's slot in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMixin {
    pub mixin: TypeRef,
    pub kind: MixinKind,
    pub visibility: MemberVisibility,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TypeRef>,

    /// Interfaces the mixin introduces into the composed type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub introduced_interfaces: Vec<TypeRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Clean,
    WithWarnings,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPlan {
    pub schema: u32,
    pub target: TargetDescriptor,
    pub mixins: Vec<PlannedMixin>,
    #[serde(default)]
    pub complete_interfaces: Vec<TypeRef>,
    pub status: ValidationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ResolutionWarning>,
    pub content_hash: ContentHash,
}

impl CompositionPlan {
    /// Mixin identities, outermost first.
    pub fn mixin_order(&self) -> Vec<&TypeRef> {
        self.mixins.iter().map(|planned| &planned.mixin).collect()
    }

    /// The call chain rendered outermost to innermost, ending at the target.
    pub fn call_chain(&self) -> String {
        self.mixins
            .iter()
            .map(|planned| planned.mixin.to_string())
            .chain(std::iter::once(self.target.to_string()))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Replace the warnings and derive the status from them.
    pub fn with_warnings(mut self, warnings: Vec<ResolutionWarning>) -> Self {
        self.status = if warnings.is_empty() {
            ValidationStatus::Clean
        } else {
            ValidationStatus::WithWarnings
        };
        self.warnings = warnings;
        self
    }

    /// Recompute the content hash from the plan's own content.
    pub fn compute_hash(&self) -> ContentHash {
        plan_hash(
            &self.target,
            self.mixins.iter().map(|planned| &planned.mixin),
            &self.complete_interfaces,
        )
    }

    /// Whether the stamped hash matches the content.
    pub fn hash_matches(&self) -> bool {
        self.compute_hash() == self.content_hash
    }
}

fn plan_hash<'a>(
    target: &TargetDescriptor,
    mixins: impl IntoIterator<Item = &'a TypeRef>,
    complete_interfaces: &[TypeRef],
) -> ContentHash {
    ContentHash::builder()
        .field_int("schema", i64::from(PLAN_SCHEMA))
        .field_display("target", target)
        .field_list("mixins", mixins)
        .field_list("complete_interfaces", complete_interfaces)
        .finish()
}

/// Pair each ordered identity with its merged fact and stamp the plan.
///
/// Identities in `order` missing from `context` are skipped. Warnings are
/// taken from the context; use [`CompositionPlan::with_warnings`] to add
/// those found later.
pub fn assemble(
    context: &ClassContext,
    order: &[TypeRef],
    catalog: &TypeCatalog,
) -> CompositionPlan {
    let mixins: Vec<PlannedMixin> = order
        .iter()
        .filter_map(|ty| context.mixin(ty))
        .map(|entry| PlannedMixin {
            mixin: entry.mixin().clone(),
            kind: entry.fact.kind(),
            visibility: entry.fact.visibility(),
            dependencies: entry.fact.dependencies().to_vec(),
            introduced_interfaces: catalog.direct_interfaces(entry.mixin()),
        })
        .collect();
    let complete_interfaces: Vec<TypeRef> = context
        .complete_interfaces()
        .iter()
        .map(|complete| complete.interface.clone())
        .collect();
    let content_hash = plan_hash(
        context.target(),
        mixins.iter().map(|planned| &planned.mixin),
        &complete_interfaces,
    );

    CompositionPlan {
        schema: PLAN_SCHEMA,
        target: context.target().clone(),
        mixins,
        complete_interfaces,
        status: ValidationStatus::Clean,
        warnings: Vec::new(),
        content_hash,
    }
    .with_warnings(context.warnings().to_vec())
}

/// Plans keyed by target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSet {
    plans: BTreeMap<TargetDescriptor, CompositionPlan>,
}

impl PlanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect plans into a set, failing on the first conflict.
    pub fn from_plans(
        plans: impl IntoIterator<Item = CompositionPlan>,
    ) -> Result<Self, PlanMergeError> {
        let mut set = Self::new();
        for plan in plans {
            set.insert(plan)?;
        }
        Ok(set)
    }

    /// Add a plan. An identical plan for the same target is a no-op; a
    /// different one is a conflict and leaves the set unchanged.
    pub fn insert(&mut self, plan: CompositionPlan) -> Result<(), PlanMergeError> {
        match self.plans.get(&plan.target) {
            Some(existing) if existing == &plan => Ok(()),
            Some(existing) => Err(PlanMergeError::Conflict {
                target: plan.target.clone(),
                existing: existing.content_hash.clone(),
                incoming: plan.content_hash.clone(),
            }),
            None => {
                self.plans.insert(plan.target.clone(), plan);
                Ok(())
            }
        }
    }

    /// Merge another set into this one, stopping at the first conflict.
    pub fn merge(&mut self, other: PlanSet) -> Result<(), PlanMergeError> {
        for plan in other.plans.into_values() {
            self.insert(plan)?;
        }
        Ok(())
    }

    pub fn get(&self, target: &TargetDescriptor) -> Option<&CompositionPlan> {
        self.plans.get(target)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositionPlan> {
        self.plans.values()
    }
}

impl IntoIterator for PlanSet {
    type Item = CompositionPlan;
    type IntoIter = std::collections::btree_map::IntoValues<TargetDescriptor, CompositionPlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.plans.into_values()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanMergeError {
    #[error("conflicting plans for {target}: {} vs {}", .existing.short(), .incoming.short())]
    Conflict {
        target: TargetDescriptor,
        existing: ContentHash,
        incoming: ContentHash,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeDecl;
    use crate::context::build_context;
    use crate::fact::{CompleteInterfaceFact, Fact, MixinFact};

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    fn plan_for(target: &str, order: &[&str]) -> CompositionPlan {
        let mut facts: Vec<Fact> = order
            .iter()
            .map(|name| MixinFact::builder(ty(name)).build().unwrap().into())
            .collect();
        facts.push(CompleteInterfaceFact::new(ty("IAudit")).into());
        let context = build_context(TargetDescriptor::new(ty(target)), &facts);
        let order: Vec<TypeRef> = order.iter().map(|name| ty(name)).collect();
        let catalog = TypeCatalog::new().with(TypeDecl::class("M1").implementing(ty("IAudit")));
        assemble(&context, &order, &catalog)
    }

    #[test]
    fn call_chain_runs_outermost_to_target() {
        let plan = plan_for("Order", &["M2", "M1"]);
        insta::assert_snapshot!(plan.call_chain(), @"M2 -> M1 -> Order");
        assert_eq!(plan.mixins[1].introduced_interfaces, vec![ty("IAudit")]);
        assert_eq!(plan.status, ValidationStatus::Clean);
        assert!(plan.hash_matches());
    }

    #[test]
    fn hash_depends_on_order() {
        let a = plan_for("Order", &["M1", "M2"]);
        let b = plan_for("Order", &["M2", "M1"]);
        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash, plan_for("Order", &["M1", "M2"]).content_hash);
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = plan_for("Order", &["M2", "M1"]).with_warnings(vec![
            ResolutionWarning::UnusedSuppression {
                suppressor: ty("M2"),
                suppressed: ty("M0"),
            },
        ]);
        assert_eq!(plan.status, ValidationStatus::WithWarnings);
        let json = serde_json::to_string(&plan).unwrap();
        let back: CompositionPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn plan_set_merges_identical_and_rejects_conflicts() {
        let mut set = PlanSet::new();
        set.insert(plan_for("Order", &["M1"])).unwrap();
        set.insert(plan_for("Invoice", &["M1"])).unwrap();

        let mut other = PlanSet::new();
        other.insert(plan_for("Order", &["M1"])).unwrap();
        set.merge(other).unwrap();
        assert_eq!(set.len(), 2);

        let err = set.insert(plan_for("Order", &["M2"])).unwrap_err();
        assert!(err.to_string().starts_with("conflicting plans for Order"));
        assert_eq!(
            set.get(&TargetDescriptor::new(ty("Order"))).unwrap().mixins[0].mixin,
            ty("M1")
        );
    }

    #[test]
    fn plan_set_iterates_by_target() {
        let set = PlanSet::from_plans([plan_for("Order", &["M1"]), plan_for("Invoice", &["M1"])])
            .unwrap();
        let targets: Vec<String> = set
            .iter()
            .map(|plan| plan.target.to_string())
            .collect();
        assert_eq!(targets, vec!["Invoice", "Order"]);
    }

    #[test]
    fn introduced_interfaces_are_bound_to_mixin_arguments() {
        let catalog = TypeCatalog::new()
            .with(TypeDecl::interface("IRepository").with_param("T", Vec::new()))
            .with(
                TypeDecl::class("Repo")
                    .with_param("T", Vec::new())
                    .implementing(ty("IRepository<?T>")),
            );
        let facts: Vec<Fact> = vec![
            MixinFact::builder(ty("Repo<Order>"))
                .build()
                .unwrap()
                .into(),
        ];
        let context = build_context(TargetDescriptor::new(ty("Order")), &facts);
        let plan = assemble(&context, &[ty("Repo<Order>")], &catalog);
        assert_eq!(
            plan.mixins[0].introduced_interfaces,
            vec![ty("IRepository<Order>")]
        );
    }
}
