//! Dependency graph over the surviving mixins of one context.
//!
//! An edge `A -> B` means `B` must sit closer to the target's own
//! implementation than `A`: `A` calls through to `B`. Edges come from
//! explicit dependencies on present mixins, from dependencies on interfaces
//! (resolved to the single mixin implementing them), and from dependencies on
//! generic definitions (resolved to the single closed application present).
//!
//! Construction never aborts. Dependencies that cannot be turned into an edge
//! are collected as [`ResolutionError`]s (or warnings, for non-strict
//! configurations) and handed to validation.

use crate::catalog::{TypeCatalog, interface_matches};
use crate::config::ResolverConfig;
use crate::context::ClassContext;
use crate::error::{ResolutionError, ResolutionWarning};
use crate::identity::{TargetDescriptor, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Explicit,
    Interface,
    Definition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub from: TypeRef,
    pub to: TypeRef,
    pub source: EdgeSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    target: TargetDescriptor,
    nodes: Vec<TypeRef>,
    successors: Vec<Vec<usize>>,
    edges: Vec<DependencyEdge>,
    issues: Vec<ResolutionError>,
    warnings: Vec<ResolutionWarning>,
}

impl DependencyGraph {
    /// A graph with no issues, from nodes in declaration order and edges by
    /// node position.
    pub fn from_edges(
        target: TargetDescriptor,
        nodes: Vec<TypeRef>,
        edges: &[(usize, usize)],
    ) -> Self {
        let mut graph = Self::empty(target, nodes);
        for &(from, to) in edges {
            graph.add_edge(from, to, EdgeSource::Explicit);
        }
        graph
    }

    fn empty(target: TargetDescriptor, nodes: Vec<TypeRef>) -> Self {
        let successors = vec![Vec::new(); nodes.len()];
        Self {
            target,
            nodes,
            successors,
            edges: Vec::new(),
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, source: EdgeSource) {
        if from == to || from >= self.nodes.len() || to >= self.nodes.len() {
            return;
        }
        if self.successors[from].contains(&to) {
            return;
        }
        self.successors[from].push(to);
        self.edges.push(DependencyEdge {
            from: self.nodes[from].clone(),
            to: self.nodes[to].clone(),
            source,
        });
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    /// Mixins in declaration order; a node's position is its rank.
    pub fn nodes(&self) -> &[TypeRef] {
        &self.nodes
    }

    pub fn node_index(&self, ty: &TypeRef) -> Option<usize> {
        self.nodes.iter().position(|node| node == ty)
    }

    /// Positions of the nodes `node` depends on, in edge insertion order.
    pub fn successors(&self, node: usize) -> &[usize] {
        self.successors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn has_edge(&self, from: &TypeRef, to: &TypeRef) -> bool {
        self.edges
            .iter()
            .any(|edge| &edge.from == from && &edge.to == to)
    }

    /// Dependency problems found while building the graph.
    pub fn issues(&self) -> &[ResolutionError] {
        &self.issues
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

enum Lookup {
    Edge(usize, EdgeSource),
    Satisfied,
    Ambiguous(Vec<TypeRef>),
    Missing,
}

/// Build the dependency graph of `context`.
pub fn build_graph(
    context: &ClassContext,
    catalog: &TypeCatalog,
    config: &ResolverConfig,
) -> DependencyGraph {
    let target = context.target().clone();
    let nodes: Vec<TypeRef> = context
        .mixins()
        .iter()
        .map(|entry| entry.mixin().clone())
        .collect();
    let mut graph = DependencyGraph::empty(target, nodes);

    for (from, entry) in context.mixins().iter().enumerate() {
        for dependency in entry.fact.dependencies() {
            match lookup(&graph, from, dependency, catalog) {
                Lookup::Edge(to, source) => graph.add_edge(from, to, source),
                Lookup::Satisfied => {}
                Lookup::Ambiguous(candidates) => {
                    graph.issues.push(ResolutionError::AmbiguousDependency {
                        target: graph.target.clone(),
                        mixin: entry.mixin().clone(),
                        dependency: dependency.clone(),
                        candidates,
                    });
                }
                Lookup::Missing
                    if config.strict_dependencies || catalog.is_interface(dependency) =>
                {
                    graph.issues.push(ResolutionError::UnsatisfiedDependency {
                        target: graph.target.clone(),
                        mixin: entry.mixin().clone(),
                        dependency: dependency.clone(),
                    });
                }
                Lookup::Missing => {
                    graph.warnings.push(ResolutionWarning::IgnoredDependency {
                        mixin: entry.mixin().clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
    }

    debug!(
        target_type = %graph.target,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        issues = graph.issues.len(),
        "dependency graph built"
    );
    graph
}

fn lookup(
    graph: &DependencyGraph,
    from: usize,
    dependency: &TypeRef,
    catalog: &TypeCatalog,
) -> Lookup {
    if let Some(to) = graph.node_index(dependency) {
        return Lookup::Edge(to, EdgeSource::Explicit);
    }

    if catalog.is_interface(dependency) {
        let candidates: Vec<usize> = (0..graph.nodes.len())
            .filter(|&index| index != from)
            .filter(|&index| catalog.implements(&graph.nodes[index], dependency))
            .collect();
        return match candidates.as_slice() {
            [only] => Lookup::Edge(*only, EdgeSource::Interface),
            [] if target_implements(graph.target.type_ref(), dependency, catalog) => {
                Lookup::Satisfied
            }
            [] => Lookup::Missing,
            many => Lookup::Ambiguous(names(graph, many)),
        };
    }

    if dependency.is_definition_ref() {
        let candidates: Vec<usize> = (0..graph.nodes.len())
            .filter(|&index| index != from)
            .filter(|&index| graph.nodes[index].same_definition(dependency))
            .collect();
        return match candidates.as_slice() {
            [only] => Lookup::Edge(*only, EdgeSource::Definition),
            [] => Lookup::Missing,
            many => Lookup::Ambiguous(names(graph, many)),
        };
    }

    Lookup::Missing
}

fn target_implements(target: &TypeRef, interface: &TypeRef, catalog: &TypeCatalog) -> bool {
    interface_matches(target, interface) || catalog.implements(target, interface)
}

fn names(graph: &DependencyGraph, indices: &[usize]) -> Vec<TypeRef> {
    let unique: BTreeSet<usize> = indices.iter().copied().collect();
    unique
        .into_iter()
        .map(|index| graph.nodes[index].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeDecl;
    use crate::context::build_context;
    use crate::fact::{Fact, MixinFact};

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    fn target() -> TargetDescriptor {
        TargetDescriptor::new(ty("Order"))
    }

    fn mixin(name: &str, deps: &[&str]) -> Fact {
        deps.iter()
            .fold(MixinFact::builder(ty(name)), |builder, dep| {
                builder.depends_on(ty(dep))
            })
            .build()
            .unwrap()
            .into()
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(TypeDecl::interface("ILogger").with_member("Log"))
            .with(TypeDecl::interface("IClock").with_member("Now"))
            .with(TypeDecl::class("ConsoleLogger").implementing(ty("ILogger")))
            .with(TypeDecl::class("FileLogger").implementing(ty("ILogger")))
            .with(TypeDecl::class("Order").implementing(ty("IClock")))
    }

    fn graph_of(facts: &[Fact]) -> DependencyGraph {
        let context = build_context(target(), facts);
        build_graph(&context, &catalog(), &ResolverConfig::default())
    }

    #[test]
    fn explicit_dependency_on_present_mixin_is_an_edge() {
        let graph = graph_of(&[mixin("M1", &[]), mixin("M2", &["M1"])]);
        assert!(graph.has_edge(&ty("M2"), &ty("M1")));
        assert_eq!(graph.successors(1), &[0]);
        assert!(graph.issues().is_empty());
    }

    #[test]
    fn interface_dependency_resolves_to_single_implementer() {
        let graph = graph_of(&[mixin("Audit", &["ILogger"]), mixin("ConsoleLogger", &[])]);
        assert_eq!(
            graph.edges(),
            &[DependencyEdge {
                from: ty("Audit"),
                to: ty("ConsoleLogger"),
                source: EdgeSource::Interface,
            }]
        );
    }

    #[test]
    fn interface_with_several_implementers_is_ambiguous() {
        let graph = graph_of(&[
            mixin("FileLogger", &[]),
            mixin("Audit", &["ILogger"]),
            mixin("ConsoleLogger", &[]),
        ]);
        assert!(graph.edges().is_empty());
        match &graph.issues()[0] {
            ResolutionError::AmbiguousDependency { candidates, .. } => {
                assert_eq!(candidates, &vec![ty("FileLogger"), ty("ConsoleLogger")]);
            }
            other => panic!("unexpected issue: {other:?}"),
        }
    }

    #[test]
    fn interface_implemented_by_target_is_satisfied() {
        let graph = graph_of(&[mixin("Audit", &["IClock"])]);
        assert!(graph.issues().is_empty());
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn unimplemented_interface_is_unsatisfied() {
        let graph = graph_of(&[mixin("Audit", &["ILogger"])]);
        assert!(matches!(
            graph.issues(),
            [ResolutionError::UnsatisfiedDependency { dependency, .. }] if dependency == &ty("ILogger")
        ));
    }

    #[test]
    fn generic_definition_dependency_binds_single_application() {
        let graph = graph_of(&[mixin("Repo<Order>", &[]), mixin("Audit", &["Repo"])]);
        assert_eq!(graph.edges()[0].to, ty("Repo<Order>"));
        assert_eq!(graph.edges()[0].source, EdgeSource::Definition);

        let graph = graph_of(&[
            mixin("Repo<Order>", &[]),
            mixin("Repo<Invoice>", &[]),
            mixin("Audit", &["Repo"]),
        ]);
        assert!(matches!(
            graph.issues(),
            [ResolutionError::AmbiguousDependency { .. }]
        ));
    }

    #[test]
    fn absent_dependency_is_a_warning_when_not_strict() {
        let facts = [mixin("Audit", &["Missing"])];
        assert!(matches!(
            graph_of(&facts).issues(),
            [ResolutionError::UnsatisfiedDependency { .. }]
        ));

        let config = ResolverConfig {
            strict_dependencies: false,
            ..ResolverConfig::default()
        };
        let graph = build_graph(&build_context(target(), &facts), &catalog(), &config);
        assert!(graph.issues().is_empty());
        assert_eq!(
            graph.warnings(),
            &[ResolutionWarning::IgnoredDependency {
                mixin: ty("Audit"),
                dependency: ty("Missing"),
            }]
        );
    }

    #[test]
    fn explicit_and_implied_edges_are_unioned_once() {
        let graph = graph_of(&[
            mixin("ConsoleLogger", &[]),
            mixin("Audit", &["ConsoleLogger", "ILogger"]),
        ]);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].source, EdgeSource::Explicit);
    }

    #[test]
    fn closed_generic_interface_dependency_binds_to_generic_mixin() {
        let catalog = TypeCatalog::new()
            .with(TypeDecl::interface("IRepository").with_param("T", Vec::new()))
            .with(
                TypeDecl::class("Repo")
                    .with_param("T", Vec::new())
                    .implementing(ty("IRepository<?T>")),
            );
        let context = build_context(
            target(),
            &[
                mixin("Repo<Order>", &[]),
                mixin("Repo<Invoice>", &[]),
                mixin("Audit", &["IRepository<Order>"]),
            ],
        );
        let graph = build_graph(&context, &catalog, &ResolverConfig::default());
        assert!(graph.issues().is_empty(), "{:?}", graph.issues());
        assert_eq!(
            graph.edges(),
            &[DependencyEdge {
                from: ty("Audit"),
                to: ty("Repo<Order>"),
                source: EdgeSource::Interface,
            }]
        );
    }
}
