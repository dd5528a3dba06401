//! Vertex partitioning by coordination sequence.
//!
//! Vertices with different coordination sequences can never be exchanged by
//! a graph automorphism, so the classes built here bound the candidate
//! search. Symmetry orbits are merged first to avoid recomputing identical
//! sequences.

use crate::core::graph::PeriodicGraph3D;
use crate::engine::symmetry::Symmetries;
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;
use tracing::debug;

/// The sorted coordination-sequence classes of a graph.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Vertex classes, sorted by `(|class| · degree, sequence)`.
    pub classes: Vec<Vec<usize>>,
    /// Class index of every vertex.
    pub class_of: Vec<usize>,
    /// Per class: one representative per symmetry orbit, ascending.
    pub reprs: Vec<Vec<usize>>,
    /// Per class: the shared coordination sequence.
    pub sequences: Vec<Vec<usize>>,
}

/// Partitions the vertices of `graph` into equivalence classes by
/// coordination sequence of the given shell depth, refined by the detected
/// symmetries.
///
/// Every vertex must have degree at least 2; degree-1 vertices are the
/// caller's to prune.
pub fn partition_by_coordination_sequence(
    graph: &PeriodicGraph3D,
    symmetries: &Symmetries,
    depth: usize,
) -> Partition {
    let n = graph.nv();
    debug_assert!(
        (0..n).all(|v| graph.degree(v) >= 2),
        "degree-1 vertices must be pruned before partitioning"
    );

    let mut uf = UnionFind::<usize>::new(n);
    for op in &symmetries.ops {
        for (i, &j) in op.perm.iter().enumerate() {
            uf.union(i, j);
        }
    }

    let mut orbits: HashMap<usize, Vec<usize>> = HashMap::new();
    for v in 0..n {
        orbits.entry(uf.find_mut(v)).or_default().push(v);
    }

    // one coordination sequence per orbit representative
    let mut grouped: HashMap<Vec<usize>, (Vec<usize>, Vec<usize>)> = HashMap::new();
    for orbit in orbits.into_values() {
        let rep = orbit[0];
        let seq = graph.coordination_sequence(rep, depth);
        let slot = grouped.entry(seq).or_default();
        slot.0.extend(orbit);
        slot.1.push(rep);
    }

    let mut classes: Vec<(Vec<usize>, Vec<usize>, Vec<usize>)> = grouped
        .into_iter()
        .map(|(seq, (mut members, mut reprs))| {
            members.sort_unstable();
            reprs.sort_unstable();
            (seq, members, reprs)
        })
        .collect();
    classes.sort_by(|a, b| {
        let ka = a.1.len() * a.0.first().copied().unwrap_or(0);
        let kb = b.1.len() * b.0.first().copied().unwrap_or(0);
        ka.cmp(&kb).then_with(|| a.0.cmp(&b.0))
    });

    let mut class_of = vec![0usize; n];
    for (c, (_, members, _)) in classes.iter().enumerate() {
        for &v in members {
            class_of[v] = c;
        }
    }
    debug!(classes = classes.len(), "partition by coordination sequence");

    let mut out = Partition {
        classes: Vec::with_capacity(classes.len()),
        class_of,
        reprs: Vec::with_capacity(classes.len()),
        sequences: Vec::with_capacity(classes.len()),
    };
    for (seq, members, reprs) in classes {
        out.classes.push(members);
        out.reprs.push(reprs);
        out.sequences.push(seq);
    }
    out
}
