// src/resolver.rs

//! Transitive dependency resolution over a [`PackageGraph`]
//!
//! Resolution of one root package works on a private node set, the root plus
//! everything reachable from it, so the shared graph can be resolved any
//! number of times. The steps are:
//!
//! 1. take the root's forward closure as the working set
//! 2. drop excluded packages; whatever was only reachable through them
//!    becomes unreachable
//! 3. decide every alternative group at once against the working set as it
//!    stands, then prune the losing candidates
//! 4. walk the closure again; every node reached must carry a package
//!
//! There is no backtracking. One version per name, one candidate per group.

use crate::graph::{GroupId, NodeId, PackageGraph};
use crate::packages::Package;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;
use tracing::{debug, warn};

/// Failures resolving a single package
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The requested package has no indexed record
    #[error("Package '{0}' not found")]
    PackageNotFound(String),

    /// A package in the pruned closure has no indexed record
    #[error("Package '{package}' not found (dependency of '{dependency_of}')")]
    DependencyNotFound {
        package: String,
        dependency_of: String,
    },
}

/// A resolved root package and its dependency closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub package: Package,

    /// Every package the root needs, sorted by name
    pub dependencies: Vec<Package>,
}

/// Resolves packages against a shared graph with fixed exclusions and priorities
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    graph: &'a PackageGraph,
    exclude_packages: &'a [String],
    package_priorities: &'a [Vec<String>],
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a PackageGraph) -> Self {
        Self {
            graph,
            exclude_packages: &[],
            package_priorities: &[],
        }
    }

    /// Package names removed from every closure, with whatever only they pull in
    pub fn exclude(mut self, exclude_packages: &'a [String]) -> Self {
        self.exclude_packages = exclude_packages;
        self
    }

    /// Preference lists overriding the declared order of alternative groups
    pub fn priorities(mut self, package_priorities: &'a [Vec<String>]) -> Self {
        self.package_priorities = package_priorities;
        self
    }

    /// Resolve one package to itself plus its pruned dependency closure
    pub fn resolve(&self, package_name: &str) -> Result<Resolution, ResolveError> {
        debug!(
            "resolving {} (exclude={:?} priorities={:?})",
            package_name, self.exclude_packages, self.package_priorities
        );

        let (root, package) = self
            .graph
            .id(package_name)
            .and_then(|id| self.graph.package(id).map(|package| (id, package)))
            .ok_or_else(|| ResolveError::PackageNotFound(package_name.to_string()))?;

        let mut working: BTreeSet<NodeId> = self.reachable(root, None).into_keys().collect();
        working.insert(root);

        self.remove_excluded(root, &mut working);
        self.resolve_alternatives(root, &mut working);

        let dependencies = self.collect_dependencies(root, &working)?;
        debug!("{}: {} dependencies", package_name, dependencies.len());

        Ok(Resolution {
            package: package.clone(),
            dependencies,
        })
    }

    /// Nodes reachable from `root` (root excluded), mapped to their BFS parent
    ///
    /// With `within`, only nodes in that set are traversed.
    fn reachable(
        &self,
        root: NodeId,
        within: Option<&BTreeSet<NodeId>>,
    ) -> BTreeMap<NodeId, NodeId> {
        let mut parents = BTreeMap::new();
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            for edge in self.graph.edges(node) {
                let target = edge.target;
                if target == root || parents.contains_key(&target) {
                    continue;
                }
                if within.is_some_and(|set| !set.contains(&target)) {
                    continue;
                }
                parents.insert(target, node);
                queue.push_back(target);
            }
        }

        parents
    }

    fn remove_excluded(&self, root: NodeId, working: &mut BTreeSet<NodeId>) {
        for name in self.exclude_packages {
            let Some(id) = self.graph.id(name) else {
                continue;
            };
            if id == root {
                warn!("not excluding '{}': it is the package being resolved", name);
                continue;
            }
            if working.remove(&id) {
                debug!("excluding package: {}", name);
            }
        }
    }

    /// Candidate order for an alternative edge: the first priority list naming
    /// the edge's target, else the group's declared order
    fn candidate_order(&self, target: NodeId, group: GroupId) -> Vec<NodeId> {
        let name = self.graph.name(target);
        match self
            .package_priorities
            .iter()
            .find(|list| list.iter().any(|p| p == name))
        {
            Some(list) => list.iter().filter_map(|p| self.graph.id(p)).collect(),
            None => self.graph.group(group).to_vec(),
        }
    }

    fn resolve_alternatives(&self, root: NodeId, working: &mut BTreeSet<NodeId>) {
        let mut chosen: BTreeMap<NodeId, GroupId> = BTreeMap::new();
        let mut scheduled: BTreeMap<NodeId, GroupId> = BTreeMap::new();

        for &source in working.iter() {
            for edge in self.graph.edges(source) {
                let Some(group) = edge.group else {
                    continue;
                };
                if !working.contains(&edge.target) {
                    continue;
                }

                let mut best: Option<NodeId> = None;
                for candidate in self.candidate_order(edge.target, group) {
                    if best.is_some() {
                        scheduled.entry(candidate).or_insert(group);
                    } else if working.contains(&candidate) {
                        best = Some(candidate);
                        chosen.entry(candidate).or_insert(group);
                    }
                }
            }
        }

        for (node, pruned_by) in scheduled {
            if !working.contains(&node) {
                continue;
            }

            let name = self.graph.name(node);
            if let Some(&chosen_by) = chosen.get(&node) {
                warn!(
                    "'{}' was chosen from {:?} but loses in {:?}; pruning it",
                    name,
                    self.graph.group_names(chosen_by),
                    self.graph.group_names(pruned_by)
                );
            }
            if node == root {
                continue;
            }

            debug!("pruning alternative: {}", name);
            working.remove(&node);
        }
    }

    fn collect_dependencies(
        &self,
        root: NodeId,
        working: &BTreeSet<NodeId>,
    ) -> Result<Vec<Package>, ResolveError> {
        let parents = self.reachable(root, Some(working));
        let root_name = self.graph.name(root);

        let mut dependencies = Vec::with_capacity(parents.len());
        for &node in parents.keys() {
            let package = self.graph.package(node).ok_or_else(|| {
                ResolveError::DependencyNotFound {
                    package: self.graph.name(node).to_string(),
                    dependency_of: root_name.to_string(),
                }
            })?;

            if tracing::enabled!(tracing::Level::DEBUG) {
                debug!("{}", self.path_to(node, &parents).join(" -> "));
            }
            dependencies.push(package.clone());
        }

        dependencies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(dependencies)
    }

    /// Shortest path from the root to `node`, as names
    fn path_to(&self, node: NodeId, parents: &BTreeMap<NodeId, NodeId>) -> Vec<&str> {
        let mut path = vec![self.graph.name(node)];
        let mut current = node;
        while let Some(&parent) = parents.get(&current) {
            path.push(self.graph.name(parent));
            current = parent;
        }
        path.reverse();
        path
    }
}
