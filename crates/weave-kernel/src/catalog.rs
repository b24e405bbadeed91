//! Type catalog: externally supplied type metadata.
//!
//! The resolver never reflects over real types. Whatever the scanning
//! collaborator learned about the types involved (kind, generic parameters,
//! implemented interfaces, member names) arrives here as plain data and is
//! only ever read.

use crate::hash::ContentHash;
use crate::identity::{TypeArg, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
}

/// A generic parameter of a type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericParam {
    pub name: String,

    /// Interfaces every closed argument for this parameter must implement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<TypeRef>,
}

/// Bound on interface closure size; self-expanding generic interface
/// declarations would otherwise never close.
const MAX_INTERFACE_CLOSURE: usize = 256;

/// Metadata for one type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_params: Vec<GenericParam>,

    /// Implemented interfaces (classes) or base interfaces (interfaces).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<TypeRef>,

    /// Member names declared directly on this type.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub members: BTreeSet<String>,
}

impl TypeDecl {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Class,
            generic_params: Vec::new(),
            interfaces: Vec::new(),
            members: BTreeSet::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::class(name)
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, constraints: Vec<TypeRef>) -> Self {
        self.generic_params.push(GenericParam {
            name: name.into(),
            constraints,
        });
        self
    }

    pub fn implementing(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.insert(member.into());
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// Type metadata keyed by definition name.
///
/// Serialized as a map from name to declaration; a key that disagrees with
/// its declaration's `name` is rejected on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, TypeDecl>",
    into = "BTreeMap<String, TypeDecl>"
)]
pub struct TypeCatalog {
    decls: BTreeMap<String, TypeDecl>,
}

impl TryFrom<BTreeMap<String, TypeDecl>> for TypeCatalog {
    type Error = CatalogError;

    fn try_from(decls: BTreeMap<String, TypeDecl>) -> Result<Self, CatalogError> {
        if let Some((key, decl)) = decls.iter().find(|(key, decl)| **key != decl.name) {
            return Err(CatalogError::NameMismatch {
                key: key.clone(),
                name: decl.name.clone(),
            });
        }
        Ok(Self { decls })
    }
}

impl From<TypeCatalog> for BTreeMap<String, TypeDecl> {
    fn from(catalog: TypeCatalog) -> Self {
        catalog.decls
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog entry {key:?} declares type {name:?}")]
    NameMismatch { key: String, name: String },
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a declaration. Returns the previous one, if any.
    pub fn insert(&mut self, decl: TypeDecl) -> Option<TypeDecl> {
        self.decls.insert(decl.name.clone(), decl)
    }

    pub fn with(mut self, decl: TypeDecl) -> Self {
        self.insert(decl);
        self
    }

    pub fn get(&self, ty: &TypeRef) -> Option<&TypeDecl> {
        self.decls.get(ty.name())
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn is_interface(&self, ty: &TypeRef) -> bool {
        self.get(ty)
            .is_some_and(|decl| decl.kind == TypeKind::Interface)
    }

    /// Every interface `ty` implements, following base interfaces.
    ///
    /// Does not include `ty` itself unless interface declarations are cyclic.
    /// Interfaces of a generic application carry its arguments: if
    /// `Repo<?T>` declares `IRepository<?T>`, then `Repo<Order>` implements
    /// `IRepository<Order>`.
    pub fn all_interfaces(&self, ty: &TypeRef) -> BTreeSet<TypeRef> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<TypeRef> = self.direct_interfaces(ty).into();

        while let Some(next) = queue.pop_front() {
            if seen.len() >= MAX_INTERFACE_CLOSURE {
                break;
            }
            if !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.direct_interfaces(&next));
        }
        seen
    }

    /// Whether `ty` implements `interface`, directly or through base
    /// interfaces. A reference to a generic interface definition matches
    /// every application of it.
    pub fn implements(&self, ty: &TypeRef, interface: &TypeRef) -> bool {
        self.all_interfaces(ty)
            .iter()
            .any(|candidate| interface_matches(candidate, interface))
    }

    /// Members an interface requires, including inherited interface members.
    pub fn interface_members(&self, interface: &TypeRef) -> BTreeSet<String> {
        let mut members: BTreeSet<String> = self
            .get(interface)
            .map(|decl| decl.members.clone())
            .unwrap_or_default();
        for base in self.all_interfaces(interface) {
            if let Some(decl) = self.get(&base) {
                members.extend(decl.members.iter().cloned());
            }
        }
        members
    }

    /// Members a type provides: its own plus those of every interface it
    /// implements.
    pub fn provided_members(&self, ty: &TypeRef) -> BTreeSet<String> {
        let mut members: BTreeSet<String> = self
            .get(ty)
            .map(|decl| decl.members.clone())
            .unwrap_or_default();
        for interface in self.all_interfaces(ty) {
            if let Some(decl) = self.get(&interface) {
                members.extend(decl.members.iter().cloned());
            }
        }
        members
    }

    /// Interfaces declared directly on `ty`, with the declaration's
    /// generic parameters bound to `ty`'s arguments.
    pub fn direct_interfaces(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let Some(decl) = self.get(ty) else {
            return Vec::new();
        };
        if decl.generic_params.len() != ty.arity() {
            return decl.interfaces.clone();
        }
        let bindings: BTreeMap<&str, &TypeArg> = decl
            .generic_params
            .iter()
            .map(|param| param.name.as_str())
            .zip(ty.args())
            .collect();
        decl.interfaces
            .iter()
            .map(|interface| interface.substitute(&bindings))
            .collect()
    }

    /// Deterministic digest of the whole catalog.
    pub fn digest(&self) -> Result<ContentHash, serde_json::Error> {
        ContentHash::of_json(&self.decls)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.values()
    }
}

pub(crate) fn interface_matches(candidate: &TypeRef, wanted: &TypeRef) -> bool {
    candidate == wanted || (wanted.is_definition_ref() && candidate.same_definition(wanted))
}
