//! Statement identity resolution across interface inheritance.
//!
//! A call arrives as (interface, method, declaring interface). The
//! candidate id `interface.method` is tried first; failing that, the walk
//! recurses depth-first over the interface's registered super-interfaces,
//! restricted to those that reach the declaring interface, and the first
//! registered id wins. Diamond hierarchies with conflicting statements are
//! resolved by that first-match rule, not detected. The graph is an open
//! string registry, so the walk tracks visited interfaces and treats a
//! revisit as a dead end rather than recursing into a cycle.

use std::collections::{HashMap, HashSet};

use crate::statement::StatementRegistry;

/// Precomputed interface-supertype graph.
///
/// Interfaces are plain names; registration order is preserved because the
/// depth-first walk visits super-interfaces in declaration order.
#[derive(Default)]
pub struct InterfaceGraph {
    supers: HashMap<String, Vec<String>>,
}

impl InterfaceGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interface with its direct super-interfaces.
    pub fn register<I, S>(&mut self, name: impl Into<String>, supers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supers
            .insert(name.into(), supers.into_iter().map(Into::into).collect());
    }

    /// Direct super-interfaces of `name`, in declaration order.
    #[must_use]
    pub fn supers_of(&self, name: &str) -> &[String] {
        self.supers.get(name).map_or(&[], Vec::as_slice)
    }

    /// Whether `sub` is `ancestor` or transitively extends it.
    #[must_use]
    pub fn extends(&self, sub: &str, ancestor: &str) -> bool {
        let mut visited = HashSet::new();
        self.extends_from(sub, ancestor, &mut visited)
    }

    fn extends_from<'g>(
        &'g self,
        sub: &'g str,
        ancestor: &str,
        visited: &mut HashSet<&'g str>,
    ) -> bool {
        if sub == ancestor {
            return true;
        }
        if !visited.insert(sub) {
            return false;
        }
        self.supers_of(sub)
            .iter()
            .any(|parent| self.extends_from(parent, ancestor, visited))
    }
}

/// Resolves (interface, method, declaring interface) to a statement id.
pub struct StatementResolver {
    graph: InterfaceGraph,
}

impl StatementResolver {
    /// A resolver over the given interface graph.
    #[must_use]
    pub fn new(graph: InterfaceGraph) -> Self {
        Self { graph }
    }

    /// The underlying interface graph.
    #[must_use]
    pub fn graph(&self) -> &InterfaceGraph {
        &self.graph
    }

    /// Resolve to the id of a registered statement, if any.
    #[must_use]
    pub fn resolve(
        &self,
        registry: &StatementRegistry,
        interface: &str,
        method: &str,
        declaring: &str,
    ) -> Option<String> {
        let mut visited = HashSet::new();
        self.resolve_from(registry, interface, method, declaring, &mut visited)
    }

    fn resolve_from<'g>(
        &'g self,
        registry: &StatementRegistry,
        interface: &'g str,
        method: &str,
        declaring: &str,
        visited: &mut HashSet<&'g str>,
    ) -> Option<String> {
        if !visited.insert(interface) {
            return None;
        }
        let candidate = format!("{interface}.{method}");
        if registry.contains(&candidate) {
            return Some(candidate);
        }
        if interface == declaring {
            return None;
        }
        for parent in self.graph.supers_of(interface) {
            if !self.graph.extends(parent, declaring) {
                continue;
            }
            if let Some(found) = self.resolve_from(registry, parent, method, declaring, visited) {
                return Some(found);
            }
        }
        None
    }
}
