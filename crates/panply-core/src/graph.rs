// ── Dependency graph ──
//
// Creation order is a topological sort of the objects themselves. An
// object waits for every object of a kind it `depends_on` and for every
// object it names by reference, including objects of its own kind. Ready
// objects are taken by kind order, then by declaration order.

use std::collections::{BTreeSet, HashSet};

use strum::IntoEnumIterator;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{ConfigObject, ObjectKind, ObjectRef, Reference};

/// Kahn's algorithm over `nodes`, taking the earliest ready node first.
///
/// Dependencies on nodes outside `nodes` are ignored. On a cycle, returns
/// the nodes that could not be ordered.
pub fn topo_sort<K, F, I>(nodes: &[K], deps: F) -> Result<Vec<K>, Vec<K>>
where
    K: Copy + PartialEq,
    F: Fn(K) -> I,
    I: IntoIterator<Item = K>,
{
    let edges: Vec<Vec<usize>> = nodes
        .iter()
        .map(|&n| {
            deps(n)
                .into_iter()
                .filter_map(|d| nodes.iter().position(|&m| m == d))
                .collect()
        })
        .collect();

    let mut placed = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());

    while order.len() < nodes.len() {
        let ready = (0..nodes.len())
            .find(|&i| !placed[i] && edges[i].iter().all(|&d| placed[d] || d == i));
        let Some(i) = ready else {
            let stuck = (0..nodes.len())
                .filter(|&i| !placed[i])
                .map(|i| nodes[i])
                .collect();
            return Err(stuck);
        };
        placed[i] = true;
        order.push(nodes[i]);
    }

    Ok(order)
}

/// Order of every registered kind under the `depends_on` relation.
pub fn kind_order() -> Result<Vec<ObjectKind>, CoreError> {
    let kinds: Vec<ObjectKind> = ObjectKind::iter().collect();
    topo_sort(&kinds, |k| k.depends_on().iter().copied()).map_err(|stuck| {
        let names: Vec<String> = stuck.iter().map(ToString::to_string).collect();
        CoreError::validation(format!(
            "dependency cycle between kinds: {}",
            names.join(", ")
        ))
    })
}

/// Deterministic creation plan for a set of top-level objects.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<ObjectRef>,
}

impl DependencyGraph {
    /// Order `objects` for creation.
    ///
    /// Rejects contained kinds at the root and duplicate names per kind.
    /// With `strict`, every name reference must resolve to an object (or
    /// child) in `objects`.
    pub fn build(objects: &[ConfigObject], strict: bool) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for object in objects {
            let object_ref = object.object_ref();
            if !object.kind().is_top_level() {
                return Err(CoreError::validation(format!(
                    "{object_ref} must be staged under its parent, not at the root"
                )));
            }
            if !seen.insert(object_ref.clone()) {
                return Err(CoreError::validation(format!(
                    "duplicate {object_ref} at the root scope"
                )));
            }
        }

        if strict {
            check_references(objects)?;
        } else {
            for reference in unresolved_references(objects) {
                debug!(
                    from = %reference.from,
                    target = %reference.target,
                    "reference left for the device to resolve"
                );
            }
        }

        let kinds = kind_order()?;
        let rank = |kind: ObjectKind| kinds.iter().position(|&k| k == kind).unwrap_or(usize::MAX);

        let mut nodes: Vec<usize> = (0..objects.len()).collect();
        nodes.sort_by_key(|&i| (rank(objects[i].kind()), i));

        // A reference to a child orders against the object that carries it.
        let owner_of = |target: &ObjectRef| {
            objects.iter().position(|o| {
                o.object_ref() == *target || o.children().iter().any(|c| c.object_ref() == *target)
            })
        };
        let deps: Vec<Vec<usize>> = objects
            .iter()
            .enumerate()
            .map(|(i, object)| {
                let by_kind = objects
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| object.kind().depends_on().contains(&other.kind()))
                    .map(|(j, _)| j);
                let by_name = object
                    .references()
                    .into_iter()
                    .filter_map(|r| owner_of(&r.target));
                by_kind.chain(by_name).filter(|&j| j != i).collect()
            })
            .collect();

        let sorted = topo_sort(&nodes, |i| deps[i].iter().copied()).map_err(|stuck| {
            let names: Vec<String> = stuck
                .iter()
                .map(|&i| objects[i].object_ref().to_string())
                .collect();
            CoreError::validation(format!(
                "dependency cycle between objects: {}",
                names.join(", ")
            ))
        })?;

        let order = sorted.into_iter().map(|i| objects[i].object_ref()).collect();
        Ok(Self { order })
    }

    /// Top-level objects in creation order.
    pub fn order(&self) -> &[ObjectRef] {
        &self.order
    }

    pub fn position(&self, object: &ObjectRef) -> Option<usize> {
        self.order.iter().position(|o| o == object)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn provided_names(objects: &[ConfigObject]) -> BTreeSet<ObjectRef> {
    objects
        .iter()
        .flat_map(|o| {
            std::iter::once(o.object_ref())
                .chain(o.children().into_iter().map(|c| c.object_ref()))
        })
        .collect()
}

fn unresolved_references(objects: &[ConfigObject]) -> Vec<Reference> {
    let provided = provided_names(objects);
    objects
        .iter()
        .flat_map(ConfigObject::references)
        .filter(|r| !provided.contains(&r.target))
        .collect()
}

/// Fail on the first name reference that nothing in `objects` provides.
pub fn check_references(objects: &[ConfigObject]) -> Result<(), CoreError> {
    match unresolved_references(objects).into_iter().next() {
        Some(r) => Err(CoreError::validation(format!(
            "{} references unknown {} via {}",
            r.from, r.target, r.field
        ))),
        None => Ok(()),
    }
}
