//! Validation of a class context.
//!
//! Checks run in a fixed sequence and every problem is collected:
//!
//! 1. per mixin, in declaration order: conflicting applications, then
//!    generic arguments;
//! 2. complete interfaces, in declaration order;
//! 3. dependency issues found while building the graph;
//! 4. the dependency cycle, if ordering fails.
//!
//! A context passes only when all four produce nothing.

use crate::catalog::{TypeCatalog, interface_matches};
use crate::config::ResolverConfig;
use crate::context::{ClassContext, MixinEntry};
use crate::error::{ResolutionError, ResolutionWarning};
use crate::graph::{DependencyGraph, build_graph};
use crate::identity::{TypeArg, TypeRef};
use crate::order::resolve_order;
use std::collections::BTreeSet;

/// A context that passed validation.
#[derive(Debug, Clone)]
pub struct Validated {
    pub graph: DependencyGraph,

    /// Call-chain order, outermost first.
    pub order: Vec<TypeRef>,
    pub warnings: Vec<ResolutionWarning>,
}

/// Validate `context` and compute its mixin order.
pub fn validate(
    context: &ClassContext,
    catalog: &TypeCatalog,
    config: &ResolverConfig,
) -> Result<Validated, Vec<ResolutionError>> {
    let mut errors = check_context(context, catalog);

    let graph = build_graph(context, catalog, config);
    errors.extend(graph.issues().iter().cloned());

    let order = match resolve_order(&graph) {
        Ok(order) => Some(order),
        Err(cycle) => {
            errors.push(cycle.into());
            None
        }
    };

    match order {
        Some(order) if errors.is_empty() => {
            let mut warnings = context.warnings().to_vec();
            warnings.extend(graph.warnings().iter().cloned());
            Ok(Validated {
                graph,
                order,
                warnings,
            })
        }
        _ => Err(errors),
    }
}

/// Checks that need only the context and the catalog.
pub fn check_context(context: &ClassContext, catalog: &TypeCatalog) -> Vec<ResolutionError> {
    let mut errors = Vec::new();

    for entry in context.mixins() {
        for conflict in context
            .conflicts()
            .iter()
            .filter(|conflict| &conflict.mixin == entry.mixin())
        {
            errors.push(ResolutionError::ConflictingMixinApplication {
                target: context.target().clone(),
                mixin: conflict.mixin.clone(),
                first: conflict.first,
                second: conflict.second,
                first_index: conflict.first_index,
                second_index: conflict.second_index,
            });
        }
        if let Some(err) = check_generic_arguments(context, entry, catalog) {
            errors.push(err);
        }
    }

    for complete in context.complete_interfaces() {
        if let Some(reason) = complete_interface_problem(context, &complete.interface, catalog) {
            errors.push(ResolutionError::UnsatisfiableCompleteInterface {
                target: context.target().clone(),
                interface: complete.interface.clone(),
                reason,
            });
        }
    }

    errors
}

fn check_generic_arguments(
    context: &ClassContext,
    entry: &MixinEntry,
    catalog: &TypeCatalog,
) -> Option<ResolutionError> {
    let mixin = entry.mixin();
    let actual = mixin.arity();
    let invalid = |expected: usize, reason: String| ResolutionError::InvalidGenericArguments {
        target: context.target().clone(),
        mixin: mixin.clone(),
        expected,
        actual,
        reason,
    };

    let Some(decl) = catalog.get(mixin) else {
        if actual > 0 {
            return Some(invalid(
                0,
                format!("{} is not a known generic definition", mixin.name()),
            ));
        }
        return None;
    };

    let expected = decl.generic_params.len();
    if actual != expected {
        return Some(invalid(
            expected,
            format!("expected {expected} type argument(s), found {actual}"),
        ));
    }

    for (param, arg) in decl.generic_params.iter().zip(mixin.args()) {
        let TypeArg::Closed(arg) = arg else {
            continue;
        };
        for constraint in &param.constraints {
            if !interface_matches(arg, constraint) && !catalog.implements(arg, constraint) {
                return Some(invalid(
                    expected,
                    format!(
                        "argument {arg} for parameter {} does not implement {constraint}",
                        param.name
                    ),
                ));
            }
        }
    }
    None
}

fn complete_interface_problem(
    context: &ClassContext,
    interface: &TypeRef,
    catalog: &TypeCatalog,
) -> Option<String> {
    if !catalog.is_interface(interface) {
        return Some(format!("{interface} is not a known interface"));
    }

    let required = catalog.interface_members(interface);
    if required.is_empty() {
        return None;
    }

    let mut provided: BTreeSet<String> = catalog.provided_members(context.target().type_ref());
    for entry in context.mixins() {
        provided.extend(catalog.provided_members(entry.mixin()));
    }

    if required.iter().any(|member| provided.contains(member)) {
        return None;
    }
    Some(format!(
        "none of its members ({}) is provided by a mixin or the target",
        required.into_iter().collect::<Vec<_>>().join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeDecl;
    use crate::context::build_context;
    use crate::fact::{CompleteInterfaceFact, Fact, MemberVisibility, MixinFact};
    use crate::identity::TargetDescriptor;

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    fn target() -> TargetDescriptor {
        TargetDescriptor::new(ty("Order"))
    }

    fn mixin(name: &str) -> Fact {
        MixinFact::builder(ty(name)).build().unwrap().into()
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(TypeDecl::interface("IComparable"))
            .with(TypeDecl::interface("IFoo").with_member("Foo").with_member("Bar"))
            .with(TypeDecl::interface("IMarker"))
            .with(TypeDecl::class("GenericLogger").with_param("T", Vec::new()))
            .with(TypeDecl::class("Sorted").with_param("T", vec![ty("IComparable")]))
            .with(TypeDecl::class("Money").implementing(ty("IComparable")))
            .with(TypeDecl::class("Blob"))
            .with(TypeDecl::class("BarMixin").with_member("Bar"))
    }

    fn errors(facts: &[Fact]) -> Vec<ResolutionError> {
        let context = build_context(target(), facts);
        validate(&context, &catalog(), &ResolverConfig::default())
            .err()
            .unwrap_or_default()
    }

    #[test]
    fn arity_mismatch_is_invalid() {
        let errs = errors(&[mixin("GenericLogger<X, Y>")]);
        assert!(matches!(
            errs.as_slice(),
            [ResolutionError::InvalidGenericArguments {
                expected: 1,
                actual: 2,
                ..
            }]
        ));
    }

    #[test]
    fn open_arguments_only_check_arity() {
        assert!(errors(&[mixin("GenericLogger<?T>")]).is_empty());
    }

    #[test]
    fn unknown_generic_definition_with_arguments_is_invalid() {
        let errs = errors(&[mixin("Mystery<Order>")]);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().contains("not a known generic definition"));
    }

    #[test]
    fn constraint_violation_is_invalid() {
        assert!(errors(&[mixin("Sorted<Money>")]).is_empty());
        let errs = errors(&[mixin("Sorted<Blob>")]);
        insta::assert_snapshot!(
            errs[0].to_string(),
            @"Order: mixin Sorted<Blob> has invalid generic arguments: argument Blob for parameter T does not implement IComparable"
        );
    }

    #[test]
    fn complete_interface_needs_one_provided_member() {
        let complete: Fact = CompleteInterfaceFact::new(ty("IFoo")).into();
        let errs = errors(&[mixin("Audit"), complete.clone()]);
        assert!(matches!(
            errs.as_slice(),
            [ResolutionError::UnsatisfiableCompleteInterface { .. }]
        ));

        assert!(errors(&[mixin("BarMixin"), complete]).is_empty());
    }

    #[test]
    fn complete_interface_must_be_an_interface() {
        let errs = errors(&[CompleteInterfaceFact::new(ty("Blob")).into()]);
        assert!(errs[0].to_string().contains("not a known interface"));
    }

    #[test]
    fn memberless_interface_is_vacuously_complete() {
        assert!(errors(&[CompleteInterfaceFact::new(ty("IMarker")).into()]).is_empty());
    }

    #[test]
    fn all_problems_are_collected_in_order() {
        let private = MixinFact::builder(ty("M1"))
            .visibility(MemberVisibility::Private)
            .build()
            .unwrap();
        let m2 = MixinFact::builder(ty("M2"))
            .depends_on(ty("M3"))
            .depends_on(ty("Missing"))
            .build()
            .unwrap();
        let m3 = MixinFact::builder(ty("M3"))
            .depends_on(ty("M2"))
            .build()
            .unwrap();
        let errs = errors(&[
            mixin("M1"),
            private.into(),
            mixin("GenericLogger<A, B>"),
            m2.into(),
            m3.into(),
        ]);
        let classes: Vec<&str> = errs.iter().map(ResolutionError::failure_class).collect();
        assert_eq!(
            classes,
            vec![
                "mixin.conflicting_application",
                "mixin.invalid_generic_arguments",
                "mixin.unsatisfied_dependency",
                "mixin.cyclic_dependency",
            ]
        );
    }

    #[test]
    fn valid_context_carries_warnings() {
        let suppressing = MixinFact::builder(ty("M2"))
            .suppress(ty("Gone"))
            .build()
            .unwrap();
        let context = build_context(target(), &[mixin("M1"), suppressing.into()]);
        let validated = validate(&context, &catalog(), &ResolverConfig::default()).unwrap();
        assert_eq!(validated.order, vec![ty("M1"), ty("M2")]);
        assert_eq!(validated.warnings.len(), 1);
    }
}
