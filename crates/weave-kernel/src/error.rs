//! Resolution errors and warnings.
//!
//! Errors are values, not control flow: validation collects every problem
//! for a target before giving up, and a target with any error yields no
//! plan. Each variant carries enough identity (target, mixins, cycle path)
//! to render a diagnostic without re-deriving the context.

use crate::fact::{MemberVisibility, MixinKind};
use crate::identity::{TargetDescriptor, TypeRef};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod failure_class {
    pub const CONFLICTING_MIXIN_APPLICATION: &str = "mixin.conflicting_application";
    pub const INVALID_GENERIC_ARGUMENTS: &str = "mixin.invalid_generic_arguments";
    pub const UNSATISFIED_DEPENDENCY: &str = "mixin.unsatisfied_dependency";
    pub const AMBIGUOUS_DEPENDENCY: &str = "mixin.ambiguous_dependency";
    pub const CYCLIC_MIXIN_DEPENDENCY: &str = "mixin.cyclic_dependency";
    pub const UNSATISFIABLE_COMPLETE_INTERFACE: &str = "mixin.unsatisfiable_complete_interface";
}

pub mod warning_class {
    pub const UNUSED_SUPPRESSION: &str = "mixin.unused_suppression";
    pub const IGNORED_DEPENDENCY: &str = "mixin.ignored_dependency";
}

/// How a mixin was applied: the part of a declaration that must agree
/// across duplicate declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub kind: MixinKind,
    pub visibility: MemberVisibility,
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.visibility)
    }
}

/// A validation failure for one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "class", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ResolutionError {
    /// The same mixin was declared twice with different kind or visibility.
    #[error(
        "{target}: mixin {mixin} declared as {first} and again as {second} (declarations {first_index} and {second_index})"
    )]
    ConflictingMixinApplication {
        target: TargetDescriptor,
        mixin: TypeRef,
        first: Application,
        second: Application,
        first_index: usize,
        second_index: usize,
    },

    /// A generic mixin applied with the wrong argument count, or with an
    /// argument violating a parameter constraint.
    #[error("{target}: mixin {mixin} has invalid generic arguments: {reason}")]
    InvalidGenericArguments {
        target: TargetDescriptor,
        mixin: TypeRef,
        expected: usize,
        actual: usize,
        reason: String,
    },

    /// An explicit dependency that nothing in the context satisfies.
    #[error("{target}: mixin {mixin} depends on {dependency}, which nothing in the context provides")]
    UnsatisfiedDependency {
        target: TargetDescriptor,
        mixin: TypeRef,
        dependency: TypeRef,
    },

    /// An explicit dependency satisfied by more than one mixin.
    #[error(
        "{target}: mixin {mixin} depends on {dependency}, which is provided by several mixins: {}",
        join(.candidates)
    )]
    AmbiguousDependency {
        target: TargetDescriptor,
        mixin: TypeRef,
        dependency: TypeRef,
        candidates: Vec<TypeRef>,
    },

    /// The dependency graph contains a cycle; `cycle` lists one minimal
    /// cycle, each mixin depending on the next and the last on the first.
    #[error("{target}: cyclic mixin dependency: {}", render_cycle(.cycle))]
    CyclicMixinDependency {
        target: TargetDescriptor,
        cycle: Vec<TypeRef>,
    },

    /// A complete interface that no mixin or the target can cover.
    #[error("{target}: complete interface {interface} cannot be satisfied: {reason}")]
    UnsatisfiableCompleteInterface {
        target: TargetDescriptor,
        interface: TypeRef,
        reason: String,
    },
}

impl ResolutionError {
    pub fn failure_class(&self) -> &'static str {
        match self {
            Self::ConflictingMixinApplication { .. } => {
                failure_class::CONFLICTING_MIXIN_APPLICATION
            }
            Self::InvalidGenericArguments { .. } => failure_class::INVALID_GENERIC_ARGUMENTS,
            Self::UnsatisfiedDependency { .. } => failure_class::UNSATISFIED_DEPENDENCY,
            Self::AmbiguousDependency { .. } => failure_class::AMBIGUOUS_DEPENDENCY,
            Self::CyclicMixinDependency { .. } => failure_class::CYCLIC_MIXIN_DEPENDENCY,
            Self::UnsatisfiableCompleteInterface { .. } => {
                failure_class::UNSATISFIABLE_COMPLETE_INTERFACE
            }
        }
    }

    pub fn target(&self) -> &TargetDescriptor {
        match self {
            Self::ConflictingMixinApplication { target, .. }
            | Self::InvalidGenericArguments { target, .. }
            | Self::UnsatisfiedDependency { target, .. }
            | Self::AmbiguousDependency { target, .. }
            | Self::CyclicMixinDependency { target, .. }
            | Self::UnsatisfiableCompleteInterface { target, .. } => target,
        }
    }
}

/// A non-fatal observation made while resolving a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ResolutionWarning {
    /// A suppression that matched nothing declared before it.
    UnusedSuppression {
        suppressor: TypeRef,
        suppressed: TypeRef,
    },

    /// A dependency on something absent from the context, ignored because
    /// strict dependency checking is off.
    IgnoredDependency { mixin: TypeRef, dependency: TypeRef },
}

impl ResolutionWarning {
    pub fn warning_class(&self) -> &'static str {
        match self {
            Self::UnusedSuppression { .. } => warning_class::UNUSED_SUPPRESSION,
            Self::IgnoredDependency { .. } => warning_class::IGNORED_DEPENDENCY,
        }
    }
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnusedSuppression {
                suppressor,
                suppressed,
            } => write!(
                f,
                "{suppressor} suppresses {suppressed}, which was not declared before it"
            ),
            Self::IgnoredDependency { mixin, dependency } => {
                write!(f, "{mixin} depends on absent {dependency} (ignored)")
            }
        }
    }
}

fn join(types: &[TypeRef]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_cycle(cycle: &[TypeRef]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.to_string());
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    #[test]
    fn cycle_renders_closed_path() {
        let err = ResolutionError::CyclicMixinDependency {
            target: TargetDescriptor::new(ty("T")),
            cycle: vec![ty("M1"), ty("M2")],
        };
        insta::assert_snapshot!(err.to_string(), @"T: cyclic mixin dependency: M1 -> M2 -> M1");
        assert_eq!(err.failure_class(), failure_class::CYCLIC_MIXIN_DEPENDENCY);
    }

    #[test]
    fn errors_serialize_with_class_tag() {
        let err = ResolutionError::UnsatisfiedDependency {
            target: TargetDescriptor::new(ty("T")),
            mixin: ty("M1"),
            dependency: ty("ILogger"),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["class"], "unsatisfied_dependency");
        assert_eq!(value["dependency"], "ILogger");
        let back: ResolutionError = serde_json::from_value(value).unwrap();
        assert_eq!(back, err);
    }
}
