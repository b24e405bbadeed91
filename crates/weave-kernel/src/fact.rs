//! Fact model: declarative mixin application facts.
//!
//! Facts are produced by the scanning collaborator and folded, in
//! declaration order, into one [`ClassContext`](crate::context::ClassContext)
//! per target. A fact is immutable once built; the only way to build a
//! [`MixinFact`] (builder or deserialization) rejects a mixin that names
//! itself as a dependency, so self-edges never reach the dependency graph.

use crate::identity::TypeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How a mixin relates to its target.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MixinKind {
    /// Declared on the mixin: the mixin extends the target.
    #[default]
    Extending,

    /// Declared on the target: the target uses the mixin.
    Used,
}

/// Visibility of the members a mixin introduces into the composed type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MemberVisibility {
    #[default]
    Public,
    Private,
}

impl fmt::Display for MixinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extending => write!(f, "extending"),
            Self::Used => write!(f, "used"),
        }
    }
}

impl fmt::Display for MemberVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// One declared application of a mixin to a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "MixinFactRecord")]
pub struct MixinFact {
    mixin: TypeRef,
    kind: MixinKind,
    visibility: MemberVisibility,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<TypeRef>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    suppresses: BTreeSet<TypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
}

impl MixinFact {
    pub fn builder(mixin: TypeRef) -> MixinFactBuilder {
        MixinFactBuilder {
            mixin,
            kind: MixinKind::default(),
            visibility: MemberVisibility::default(),
            dependencies: Vec::new(),
            suppresses: BTreeSet::new(),
            origin: None,
        }
    }

    pub fn mixin(&self) -> &TypeRef {
        &self.mixin
    }

    pub fn kind(&self) -> MixinKind {
        self.kind
    }

    pub fn visibility(&self) -> MemberVisibility {
        self.visibility
    }

    /// Explicit dependencies, in declaration order, without duplicates.
    pub fn dependencies(&self) -> &[TypeRef] {
        &self.dependencies
    }

    pub fn suppresses(&self) -> &BTreeSet<TypeRef> {
        &self.suppresses
    }

    /// Provenance of the declaration, for diagnostics only.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Union another declaration of the same identity into this one.
    ///
    /// Kind, visibility, and origin of `self` are kept.
    pub(crate) fn absorb(&mut self, other: &MixinFact) {
        for dep in &other.dependencies {
            if !self.dependencies.contains(dep) {
                self.dependencies.push(dep.clone());
            }
        }
        self.suppresses.extend(other.suppresses.iter().cloned());
    }
}

/// Builder for [`MixinFact`].
#[derive(Debug, Clone)]
pub struct MixinFactBuilder {
    mixin: TypeRef,
    kind: MixinKind,
    visibility: MemberVisibility,
    dependencies: Vec<TypeRef>,
    suppresses: BTreeSet<TypeRef>,
    origin: Option<String>,
}

impl MixinFactBuilder {
    pub fn kind(mut self, kind: MixinKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn visibility(mut self, visibility: MemberVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn depends_on(mut self, dependency: TypeRef) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn suppress(mut self, suppressed: TypeRef) -> Self {
        self.suppresses.insert(suppressed);
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn build(self) -> Result<MixinFact, FactError> {
        if self.dependencies.contains(&self.mixin) {
            return Err(FactError::SelfDependency(self.mixin));
        }
        Ok(MixinFact {
            mixin: self.mixin,
            kind: self.kind,
            visibility: self.visibility,
            dependencies: self.dependencies,
            suppresses: self.suppresses,
            origin: self.origin,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MixinFactRecord {
    mixin: TypeRef,
    #[serde(default)]
    kind: MixinKind,
    #[serde(default)]
    visibility: MemberVisibility,
    #[serde(default)]
    dependencies: Vec<TypeRef>,
    #[serde(default)]
    suppresses: BTreeSet<TypeRef>,
    #[serde(default)]
    origin: Option<String>,
}

impl TryFrom<MixinFactRecord> for MixinFact {
    type Error = FactError;

    fn try_from(record: MixinFactRecord) -> Result<Self, Self::Error> {
        let mut builder = MixinFact::builder(record.mixin)
            .kind(record.kind)
            .visibility(record.visibility);
        for dep in record.dependencies {
            builder = builder.depends_on(dep);
        }
        for suppressed in record.suppresses {
            builder = builder.suppress(suppressed);
        }
        if let Some(origin) = record.origin {
            builder = builder.origin(origin);
        }
        builder.build()
    }
}

/// Declares an interface as fully satisfied by a target's mixins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteInterfaceFact {
    pub interface: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl CompleteInterfaceFact {
    pub fn new(interface: TypeRef) -> Self {
        Self {
            interface,
            origin: None,
        }
    }
}

/// One element of a per-target fact sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum Fact {
    Mixin(MixinFact),
    CompleteInterface(CompleteInterfaceFact),
}

impl From<MixinFact> for Fact {
    fn from(fact: MixinFact) -> Self {
        Fact::Mixin(fact)
    }
}

impl From<CompleteInterfaceFact> for Fact {
    fn from(fact: CompleteInterfaceFact) -> Self {
        Fact::CompleteInterface(fact)
    }
}

/// Errors raised while building a fact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    #[error("mixin {0} declares a dependency on itself")]
    SelfDependency(TypeRef),
}
