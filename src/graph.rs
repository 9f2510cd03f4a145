// src/graph.rs

//! Merged package graph for one (distribution, architecture) target
//!
//! Nodes are package names interned into an arena; each node optionally
//! carries the [`Package`] that won the version merge. Nodes without a
//! package are dangling: they were named as a dependency but never indexed.
//! Edges point from a package to its dependencies. An edge created from an
//! alternative group (`a | b | c`) is labelled with the interned group so the
//! resolver can recover the OR-semantics.

use crate::error::Result;
use crate::packages::{Dependency, Package};
use crate::repository::{IndexFetcher, PackageIndex};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

/// Index of a node in a [`PackageGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Index of an interned alternative group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(usize);

/// A "depends on" edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub target: NodeId,
    /// Alternative group this edge came from, if any
    pub group: Option<GroupId>,
}

#[derive(Debug)]
struct Node {
    name: String,
    package: Option<Package>,
    edges: Vec<Edge>,
}

/// Immutable dependency graph over the merged packages of one target
#[derive(Debug, Default)]
pub struct PackageGraph {
    nodes: Vec<Node>,
    ids: HashMap<String, NodeId>,
    groups: Vec<Vec<NodeId>>,
    group_ids: HashMap<Vec<NodeId>, GroupId>,
}

impl PackageGraph {
    pub fn builder() -> PackageGraphBuilder {
        PackageGraphBuilder::default()
    }

    /// Merge packages in precedence order and build the graph
    pub fn from_packages<I: IntoIterator<Item = Package>>(packages: I) -> Self {
        let mut builder = Self::builder();
        builder.add_packages(packages);
        builder.build()
    }

    /// Fetch every index of a target, in order, and build the merged graph
    pub fn load<F: IndexFetcher>(fetcher: &F, indexes: &[PackageIndex]) -> Result<Self> {
        let mut builder = Self::builder();
        for index in indexes {
            builder.add_packages(fetcher.fetch(index)?);
        }
        Ok(builder.build())
    }

    /// Number of nodes, dangling ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes carrying a package
    pub fn package_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.package.is_some()).count()
    }

    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }

    /// Whether a node exists for this name, with or without a package
    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// The package attached to a name, if it was indexed
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.id(name).and_then(|id| self.package(id))
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn package(&self, id: NodeId) -> Option<&Package> {
        self.nodes[id.0].package.as_ref()
    }

    pub fn edges(&self, id: NodeId) -> &[Edge] {
        &self.nodes[id.0].edges
    }

    /// Members of an alternative group, in declared order
    pub fn group(&self, id: GroupId) -> &[NodeId] {
        &self.groups[id.0]
    }

    /// Names of an alternative group's members
    pub fn group_names(&self, id: GroupId) -> Vec<&str> {
        self.group(id).iter().map(|&n| self.name(n)).collect()
    }

    fn intern(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            package: None,
            edges: Vec::new(),
        });
        self.ids.insert(name.to_string(), id);
        id
    }

    fn intern_group(&mut self, names: &[String]) -> GroupId {
        let members: Vec<NodeId> = names.iter().map(|name| self.intern(name)).collect();
        if let Some(&id) = self.group_ids.get(&members) {
            return id;
        }

        let id = GroupId(self.groups.len());
        self.groups.push(members.clone());
        self.group_ids.insert(members, id);
        id
    }

    /// Add an edge; a repeated edge keeps one entry and takes the newer group label
    fn add_edge(&mut self, from: NodeId, to: NodeId, group: Option<GroupId>) {
        let edges = &mut self.nodes[from.0].edges;
        match edges.iter_mut().find(|edge| edge.target == to) {
            Some(edge) => {
                if group.is_some() {
                    edge.group = group;
                }
            }
            None => edges.push(Edge { target: to, group }),
        }
    }
}

/// Accumulates packages from successive indexes, keeping the latest version per name
#[derive(Debug, Default)]
pub struct PackageGraphBuilder {
    packages: Vec<Package>,
    positions: HashMap<String, usize>,
}

impl PackageGraphBuilder {
    /// Offer a package to the merge
    ///
    /// It replaces an earlier package of the same name only when its version
    /// is strictly greater; on ties the earlier channel wins.
    pub fn add_package(&mut self, package: Package) {
        match self.positions.get(&package.name) {
            Some(&position) => {
                let kept = &mut self.packages[position];
                if package.compare_version(kept) == Ordering::Greater {
                    debug!(
                        "{}: {:?} supersedes {:?}",
                        package.name, package.version, kept.version
                    );
                    *kept = package;
                }
            }
            None => {
                self.positions.insert(package.name.clone(), self.packages.len());
                self.packages.push(package);
            }
        }
    }

    pub fn add_packages<I: IntoIterator<Item = Package>>(&mut self, packages: I) {
        for package in packages {
            self.add_package(package);
        }
    }

    pub fn build(self) -> PackageGraph {
        let mut graph = PackageGraph::default();

        for package in self.packages {
            let id = graph.intern(&package.name);
            for dependency in &package.dependencies {
                match dependency {
                    Dependency::Single(name) => {
                        let target = graph.intern(name);
                        graph.add_edge(id, target, None);
                    }
                    Dependency::Alternatives(names) => {
                        let group = graph.intern_group(names);
                        for name in names {
                            let target = graph.intern(name);
                            graph.add_edge(id, target, Some(group));
                        }
                    }
                }
            }
            graph.nodes[id.0].package = Some(package);
        }

        info!(
            "Built package graph: {} packages, {} nodes, {} alternative groups",
            graph.package_count(),
            graph.len(),
            graph.groups.len()
        );
        graph
    }
}
