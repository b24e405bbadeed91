//! Class contexts: the effective mixin set of one target.
//!
//! Facts are folded left to right in declaration order. The caller owns
//! that order (base-class facts, then derived-class facts, then
//! assembly-wide facts); the builder trusts it and never re-sorts.
//!
//! ```text
//! [M1] [M2] [M3 suppresses M1] [M1]   ─►   M2, M3, M1
//!   0    1          2            3         (indices 1, 2, 3)
//! ```
//!
//! Suppression only looks backward. Two declarations of the same identity
//! with no suppression in between merge; a kind or visibility mismatch
//! between them is recorded as a conflict for the validator.

use crate::config::ResolverConfig;
use crate::error::{Application, ResolutionWarning};
use crate::fact::{CompleteInterfaceFact, Fact, MixinFact};
use crate::hash::ContentHash;
use crate::identity::{TargetDescriptor, TypeRef};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A surviving mixin declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinEntry {
    pub fact: MixinFact,

    /// Position of the first surviving declaration in the fact sequence.
    pub declaration_index: usize,
}

impl MixinEntry {
    pub fn mixin(&self) -> &TypeRef {
        self.fact.mixin()
    }

    pub fn application(&self) -> Application {
        Application {
            kind: self.fact.kind(),
            visibility: self.fact.visibility(),
        }
    }
}

/// Two declarations of one mixin that disagree on kind or visibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinConflict {
    pub mixin: TypeRef,
    pub first: Application,
    pub second: Application,
    pub first_index: usize,
    pub second_index: usize,
}

/// Accumulated, de-duplicated facts for exactly one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassContext {
    target: TargetDescriptor,
    mixins: Vec<MixinEntry>,
    complete_interfaces: Vec<CompleteInterfaceFact>,
    conflicts: Vec<MixinConflict>,
    warnings: Vec<ResolutionWarning>,
}

impl ClassContext {
    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    /// Surviving mixins, ordered by declaration index.
    pub fn mixins(&self) -> &[MixinEntry] {
        &self.mixins
    }

    pub fn mixin(&self, ty: &TypeRef) -> Option<&MixinEntry> {
        self.mixins.iter().find(|entry| entry.mixin() == ty)
    }

    pub fn complete_interfaces(&self) -> &[CompleteInterfaceFact] {
        &self.complete_interfaces
    }

    pub fn conflicts(&self) -> &[MixinConflict] {
        &self.conflicts
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.mixins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixins.is_empty()
    }

    /// Deterministic hash of the whole context.
    pub fn content_hash(&self) -> Result<ContentHash, serde_json::Error> {
        ContentHash::of_json(self)
    }
}

/// Build a context with default suppression rules.
pub fn build_context(target: TargetDescriptor, facts: &[Fact]) -> ClassContext {
    build_context_with(target, facts, &ResolverConfig::default())
}

/// Fold `facts` in order into the context of `target`.
pub fn build_context_with(
    target: TargetDescriptor,
    facts: &[Fact],
    config: &ResolverConfig,
) -> ClassContext {
    let mut context = ClassContext {
        target,
        mixins: Vec::new(),
        complete_interfaces: Vec::new(),
        conflicts: Vec::new(),
        warnings: Vec::new(),
    };

    for (index, fact) in facts.iter().enumerate() {
        match fact {
            Fact::Mixin(mixin) => {
                apply_suppressions(&mut context, mixin, config.suppress_generic_definitions);
                add_mixin(&mut context, mixin, index);
            }
            Fact::CompleteInterface(complete) => {
                if !context
                    .complete_interfaces
                    .iter()
                    .any(|known| known.interface == complete.interface)
                {
                    context.complete_interfaces.push(complete.clone());
                }
            }
        }
    }

    context
}

fn apply_suppressions(context: &mut ClassContext, fact: &MixinFact, by_definition: bool) {
    for suppressed in fact.suppresses() {
        let before = context.mixins.len();
        let mut removed = Vec::new();
        context.mixins.retain(|entry| {
            let hit = suppression_matches(suppressed, entry.mixin(), by_definition);
            if hit {
                removed.push(entry.mixin().clone());
            }
            !hit
        });

        if context.mixins.len() == before {
            trace!(
                target_type = %context.target,
                suppressor = %fact.mixin(),
                suppressed = %suppressed,
                "suppression matched nothing"
            );
            context.warnings.push(ResolutionWarning::UnusedSuppression {
                suppressor: fact.mixin().clone(),
                suppressed: suppressed.clone(),
            });
            continue;
        }

        for mixin in &removed {
            trace!(
                target_type = %context.target,
                suppressor = %fact.mixin(),
                removed = %mixin,
                "mixin suppressed"
            );
        }
        context
            .conflicts
            .retain(|conflict| !removed.contains(&conflict.mixin));
    }
}

fn add_mixin(context: &mut ClassContext, fact: &MixinFact, index: usize) {
    let Some(existing) = context
        .mixins
        .iter_mut()
        .find(|entry| entry.mixin() == fact.mixin())
    else {
        context.mixins.push(MixinEntry {
            fact: fact.clone(),
            declaration_index: index,
        });
        return;
    };

    let first = existing.application();
    let second = Application {
        kind: fact.kind(),
        visibility: fact.visibility(),
    };
    if first != second {
        context.conflicts.push(MixinConflict {
            mixin: fact.mixin().clone(),
            first,
            second,
            first_index: existing.declaration_index,
            second_index: index,
        });
    }
    trace!(
        target_type = %context.target,
        mixin = %fact.mixin(),
        first_index = existing.declaration_index,
        second_index = index,
        "merging duplicate mixin declaration"
    );
    existing.fact.absorb(fact);
}

fn suppression_matches(suppressed: &TypeRef, candidate: &TypeRef, by_definition: bool) -> bool {
    suppressed == candidate
        || (by_definition
            && suppressed.is_definition_ref()
            && suppressed.same_definition(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{MemberVisibility, MixinKind};

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    fn target() -> TargetDescriptor {
        TargetDescriptor::new(ty("T"))
    }

    fn mixin(name: &str) -> Fact {
        MixinFact::builder(ty(name)).build().unwrap().into()
    }

    fn suppressing(name: &str, suppressed: &str) -> Fact {
        MixinFact::builder(ty(name))
            .suppress(ty(suppressed))
            .build()
            .unwrap()
            .into()
    }

    fn names(context: &ClassContext) -> Vec<String> {
        context
            .mixins()
            .iter()
            .map(|entry| entry.mixin().to_string())
            .collect()
    }

    #[test]
    fn later_suppression_removes_earlier_mixin() {
        let context = build_context(
            target(),
            &[mixin("M1"), mixin("M2"), suppressing("M3", "M1")],
        );
        assert_eq!(names(&context), vec!["M2", "M3"]);
        assert!(context.warnings().is_empty());
    }

    #[test]
    fn suppression_never_looks_forward() {
        let context = build_context(target(), &[suppressing("M3", "M1"), mixin("M1")]);
        assert_eq!(names(&context), vec!["M3", "M1"]);
        assert_eq!(
            context.warnings(),
            &[ResolutionWarning::UnusedSuppression {
                suppressor: ty("M3"),
                suppressed: ty("M1"),
            }]
        );
    }

    #[test]
    fn redeclaration_after_suppression_re_adds_with_new_index() {
        let context = build_context(
            target(),
            &[mixin("M1"), mixin("M2"), suppressing("M3", "M1"), mixin("M1")],
        );
        assert_eq!(names(&context), vec!["M2", "M3", "M1"]);
        assert_eq!(context.mixin(&ty("M1")).unwrap().declaration_index, 3);
    }

    #[test]
    fn duplicate_declarations_merge_dependencies() {
        let first = MixinFact::builder(ty("M"))
            .depends_on(ty("A"))
            .build()
            .unwrap();
        let second = MixinFact::builder(ty("M"))
            .depends_on(ty("B"))
            .build()
            .unwrap();
        let context = build_context(target(), &[first.into(), mixin("A"), second.into()]);
        let merged = context.mixin(&ty("M")).unwrap();
        assert_eq!(merged.declaration_index, 0);
        assert_eq!(merged.fact.dependencies(), &[ty("A"), ty("B")]);
        assert!(context.conflicts().is_empty());
    }

    #[test]
    fn mismatched_visibility_is_recorded_not_resolved() {
        let public = MixinFact::builder(ty("M")).build().unwrap();
        let private = MixinFact::builder(ty("M"))
            .kind(MixinKind::Used)
            .visibility(MemberVisibility::Private)
            .build()
            .unwrap();
        let context = build_context(target(), &[public.into(), private.into()]);
        assert_eq!(context.len(), 1);
        let conflict = &context.conflicts()[0];
        assert_eq!(conflict.first.visibility, MemberVisibility::Public);
        assert_eq!(conflict.second.kind, MixinKind::Used);
        assert_eq!((conflict.first_index, conflict.second_index), (0, 1));
    }

    #[test]
    fn suppressing_a_conflicted_mixin_drops_the_conflict() {
        let private = MixinFact::builder(ty("M"))
            .visibility(MemberVisibility::Private)
            .build()
            .unwrap();
        let context = build_context(
            target(),
            &[mixin("M"), private.into(), suppressing("N", "M")],
        );
        assert!(context.conflicts().is_empty());
        assert_eq!(names(&context), vec!["N"]);
    }

    #[test]
    fn generic_definition_suppresses_closed_applications() {
        let facts = [
            mixin("Logger<Order>"),
            mixin("Logger<Invoice>"),
            mixin("Cache"),
            suppressing("Quiet", "Logger"),
        ];
        let context = build_context(target(), &facts);
        assert_eq!(names(&context), vec!["Cache", "Quiet"]);

        let config = ResolverConfig {
            suppress_generic_definitions: false,
            ..ResolverConfig::default()
        };
        let strict = build_context_with(target(), &facts, &config);
        assert_eq!(
            names(&strict),
            vec!["Logger<Order>", "Logger<Invoice>", "Cache", "Quiet"]
        );
    }

    #[test]
    fn complete_interfaces_are_deduplicated_in_order() {
        let facts = [
            CompleteInterfaceFact::new(ty("IB")).into(),
            CompleteInterfaceFact::new(ty("IA")).into(),
            CompleteInterfaceFact::new(ty("IB")).into(),
        ];
        let context = build_context(target(), &facts);
        let interfaces: Vec<String> = context
            .complete_interfaces()
            .iter()
            .map(|c| c.interface.to_string())
            .collect();
        assert_eq!(interfaces, vec!["IB", "IA"]);
    }

    #[test]
    fn equal_inputs_build_equal_contexts() {
        let facts = [mixin("M1"), suppressing("M2", "M0"), mixin("M1")];
        let a = build_context(target(), &facts);
        let b = build_context(target(), &facts);
        assert_eq!(a, b);
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn self_suppression_replaces_the_earlier_declaration() {
        let facts = [
            mixin("M1"),
            mixin("M2"),
            suppressing("M1", "M1"),
        ];
        let context = build_context(target(), &facts);
        assert_eq!(names(&context), vec!["M2", "M1"]);
        assert_eq!(context.mixin(&ty("M1")).unwrap().declaration_index, 2);
        assert!(context.mixin(&ty("M1")).unwrap().fact.suppresses().contains(&ty("M1")));
        assert!(context.warnings().is_empty());
    }
}
