//! The genome workflow: from a crystal net to its canonical identifier.
//!
//! `topological_genome` orchestrates the engine stages (stability check,
//! primitive-cell reduction, symmetry detection, partitioning, candidate
//! enumeration, minimal-key scan and offset-basis normalization) and
//! serializes the winning edge list. `recognize` looks the result up in an
//! archive of named topologies.

use crate::core::graph::PeriodicGraph3D;
use crate::core::io::archive::Archive;
use crate::core::models::net::CrystalNet;
use crate::engine::basis::{find_basis, GenomeEdge};
use crate::engine::candidates::find_candidates;
use crate::engine::config::Options;
use crate::engine::equilibrium::net_from_graph;
use crate::engine::error::GenomeError;
use crate::engine::key::{candidate_key, sentinel_key, KeyEdge};
use crate::engine::partition::partition_by_coordination_sequence;
use crate::engine::symmetry::find_symmetries;
use crate::engine::translations::minimize;
use nalgebra::Vector3;
use num_bigint::BigInt;
use tracing::{debug, info, instrument};

/// Outcome of an archive lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognized {
    /// The genome is a known topology.
    Known(String),
    /// The genome is absent from the archive; the canonical string is
    /// returned instead.
    Unknown(String),
}

/// Serializes a canonical edge list as the genome string
/// `"3 s1 d1 ox oy oz s2 d2 ..."` with 1-based vertex numbers.
pub fn serialize_genome(edges: &[GenomeEdge]) -> String {
    let mut out = String::from("3");
    for (s, d, o) in edges {
        out.push_str(&format!(" {} {} {} {} {}", s + 1, d + 1, o.x, o.y, o.z));
    }
    out
}

/// Computes the canonical edge list of a valid crystal net.
///
/// # Errors
///
/// All the fatal kinds of [`GenomeError`]: unstable nets, nets that do not
/// span three dimensions, denominator overflows and internal invariant
/// violations.
#[instrument(skip_all, name = "topological_key")]
pub fn topological_key(
    net: CrystalNet,
    options: &Options,
) -> Result<Vec<GenomeEdge>, GenomeError> {
    if net.nv() == 0 {
        return Err(GenomeError::InvalidInput("the net has no vertices".into()));
    }
    if let Some(v) = (0..net.nv()).find(|&v| net.graph.degree(v) < 2) {
        return Err(GenomeError::InvalidInput(format!(
            "vertex {} has degree {}, nets need degree at least 2",
            v + 1,
            net.graph.degree(v)
        )));
    }
    if let Some(max) = options.max_denominator {
        let denom = net.max_denominator();
        if denom > BigInt::from(max) {
            return Err(GenomeError::WidthOverflow {
                denom,
                max: BigInt::from(max),
            });
        }
    }
    if net.has_colliding_vertices() {
        return Err(GenomeError::UnstableNet);
    }

    let net = if options.minimize {
        minimize(net)?
    } else {
        net
    };

    let symmetries = find_symmetries(&net);
    let partition =
        partition_by_coordination_sequence(&net.graph, &symmetries, options.cseq_depth);
    let candidates = find_candidates(&net, &symmetries, &partition)?;

    let mut best: Vec<KeyEdge> = sentinel_key();
    let mut found = false;
    for cand in &candidates {
        if let Some((_, edges)) = candidate_key(&net, cand, &best)? {
            best = edges;
            found = true;
        }
    }
    if !found {
        return Err(GenomeError::Internal(
            "no candidate produced a key".into(),
        ));
    }

    let (_, edges) = find_basis(&best)?;
    debug!(edges = edges.len(), "canonical key computed");
    Ok(edges)
}

/// Computes the canonical genome string of a valid crystal net.
pub fn topological_genome(net: CrystalNet, options: &Options) -> Result<String, GenomeError> {
    Ok(serialize_genome(&topological_key(net, options)?))
}

/// Computes the genome of a bare periodic graph: prunes dangling vertices,
/// splices degree-2 bridges, solves the equilibrium placement and runs the
/// canonical-key pipeline with uniform vertex labels.
pub fn genome_of_graph(
    graph: PeriodicGraph3D,
    options: &Options,
) -> Result<String, GenomeError> {
    let graph = normalize_graph(graph)?;
    let types = vec!["X".to_string(); graph.nv()];
    let net = net_from_graph(graph, types)?;
    topological_genome(net, options)
}

/// Looks a net up in the archive.
pub fn recognize(
    graph: PeriodicGraph3D,
    archive: &Archive,
    options: &Options,
) -> Result<Recognized, GenomeError> {
    let genome = genome_of_graph(graph, options)?;
    match archive.lookup(&genome) {
        Some(name) => {
            info!(name, "topology recognized");
            Ok(Recognized::Known(name.to_string()))
        }
        None => Ok(Recognized::Unknown(genome)),
    }
}

/// Removes vertices of degree 0 and 1 and splices degree-2 bridges until
/// every remaining vertex has degree at least 3.
///
/// Bridges subdivide edges without changing the topology; inputs whose
/// vertices are all pruned away are rejected.
pub fn normalize_graph(mut graph: PeriodicGraph3D) -> Result<PeriodicGraph3D, GenomeError> {
    loop {
        if graph.nv() == 0 {
            return Err(GenomeError::InvalidInput(
                "nothing is left of the net after pruning".into(),
            ));
        }
        if let Some(v) = (0..graph.nv()).find(|&v| graph.degree(v) <= 1) {
            graph = without_vertex(&graph, v, None)?;
            continue;
        }
        if let Some(v) = (0..graph.nv()).find(|&v| graph.degree(v) == 2) {
            let (a, b) = {
                let nb = graph.neighbours(v);
                (nb[0], nb[1])
            };
            if a.dst == v || b.dst == v {
                return Err(GenomeError::InvalidInput(
                    "degree-2 vertex bonded to its own translate".into(),
                ));
            }
            // replace a-v-b with the direct edge a-b
            let bridge = (a.dst, b.dst, b.ofs - a.ofs);
            if bridge.0 == bridge.1 && bridge.2 == Vector3::zeros() {
                return Err(GenomeError::InvalidInput(
                    "degree-2 bridge collapses to a zero-offset loop".into(),
                ));
            }
            graph = without_vertex(&graph, v, Some(bridge))?;
            continue;
        }
        return Ok(graph);
    }
}

/// Rebuilds the graph without vertex `v`, optionally adding one extra edge
/// (given in the old numbering).
fn without_vertex(
    graph: &PeriodicGraph3D,
    v: usize,
    extra: Option<(usize, usize, Vector3<i64>)>,
) -> Result<PeriodicGraph3D, GenomeError> {
    let map = |i: usize| if i > v { i - 1 } else { i };
    let mut out = PeriodicGraph3D::new(graph.nv() - 1);
    for (s, d, o) in graph.edges() {
        if s != v && d != v {
            out.add_edge(map(s), map(d), o);
        }
    }
    if let Some((s, d, o)) = extra {
        debug_assert!(s != v && d != v);
        // a parallel edge may already exist, which collapses the bridge
        out.add_edge(map(s), map(d), o);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arithmetic::{mat_from_columns, rat, rvec};
    use crate::core::io::archive::Archive;
    use crate::engine::translations::{check_valid_translation, possible_translations, reduce_with_matrix};

    const PCU: &str = "3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1";
    const DIA: &str = "3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1";
    const DIA_GENOME: &str = "3 1 2 0 0 0 1 2 0 0 1 1 2 0 1 0 1 2 1 0 0";

    fn graph(s: &str) -> PeriodicGraph3D {
        s.parse().unwrap()
    }

    fn genome(s: &str) -> Result<String, GenomeError> {
        genome_of_graph(graph(s), &Options::default())
    }

    #[test]
    fn primitive_cubic_genome_is_its_own_input() {
        assert_eq!(genome(PCU).unwrap(), PCU);
    }

    #[test]
    fn diamond_genome_is_canonical() {
        assert_eq!(genome(DIA).unwrap(), DIA_GENOME);
    }

    #[test]
    fn doubled_cell_minimizes_to_the_cubic_genome() {
        let doubled = "3 1 2 0 0 0 1 2 -1 0 0 1 1 0 1 0 1 1 0 0 1 2 2 0 1 0 2 2 0 0 1";
        assert_eq!(genome(doubled).unwrap(), PCU);
    }

    #[test]
    fn genome_is_independent_of_orientation_and_origin() {
        // dia written in the inverted cell basis: all offsets negated
        let inverted = "3 1 2 0 0 0 1 2 -1 0 0 1 2 0 -1 0 1 2 0 0 -1";
        assert_eq!(genome(inverted).unwrap(), DIA_GENOME);
    }

    #[test]
    fn genome_is_invariant_under_unimodular_rebasing() {
        let types = vec!["X".to_string(); 2];
        let net = net_from_graph(graph(DIA), types).unwrap();
        let m = mat_from_columns(
            &rvec(rat(1), rat(0), rat(0)),
            &rvec(rat(1), rat(1), rat(0)),
            &rvec(rat(-1), rat(0), rat(1)),
        );
        let rebased = reduce_with_matrix(&net, &m).unwrap();
        assert_eq!(
            topological_genome(rebased, &Options::default()).unwrap(),
            DIA_GENOME
        );
    }

    #[test]
    fn no_translation_survives_minimization() {
        let doubled: PeriodicGraph3D =
            "3 1 2 0 0 0 1 2 -1 0 0 1 1 0 1 0 1 1 0 0 1 2 2 0 1 0 2 2 0 0 1"
                .parse()
                .unwrap();
        let net = net_from_graph(doubled, vec!["X".into(), "X".into()]).unwrap();
        let reduced = crate::engine::translations::minimize(net).unwrap();
        assert!(possible_translations(&reduced)
            .iter()
            .all(|t| check_valid_translation(&reduced, t, None).is_none()));
    }

    #[test]
    fn genome_round_trips_through_its_string_form() {
        let first = genome(DIA).unwrap();
        let again = genome_of_graph(first.parse().unwrap(), &Options::default()).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn unstable_net_is_refused() {
        let twins = "3 1 2 1 0 0 1 2 -1 0 0 1 2 0 1 0 1 2 0 -1 0 1 2 0 0 1 1 2 0 0 -1";
        assert!(matches!(genome(twins), Err(GenomeError::UnstableNet)));
    }

    #[test]
    fn layered_net_is_refused_as_not_three_dimensional() {
        let layer = "3 1 1 1 0 0 1 1 0 1 0";
        assert!(matches!(
            genome(layer),
            Err(GenomeError::NotThreeDimensional { rank: 2 })
        ));
    }

    #[test]
    fn bridge_vertices_are_spliced_away() {
        // pcu with one subdivided x edge reduces to pcu itself
        let subdivided = "3 1 2 0 0 0 1 2 -1 0 0 1 1 0 1 0 1 1 0 0 1";
        assert_eq!(genome(subdivided).unwrap(), PCU);
    }

    #[test]
    fn dangling_vertices_are_pruned() {
        // pcu with a pendant vertex attached
        let pendant = "3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1 1 2 0 0 0";
        assert_eq!(genome(pendant).unwrap(), PCU);
    }

    #[test]
    fn recognition_hits_the_seed_archive() {
        let archive = Archive::builtin("seed").unwrap();
        let options = Options::default();
        assert_eq!(
            recognize(graph(PCU), &archive, &options).unwrap(),
            Recognized::Known("pcu".into())
        );
        assert_eq!(
            recognize(graph(DIA), &archive, &options).unwrap(),
            Recognized::Known("dia".into())
        );
        let unknown = "3 1 1 2 0 0 1 1 0 1 0 1 1 0 0 1 1 1 1 1 0";
        match recognize(graph(unknown), &archive, &options).unwrap() {
            Recognized::Unknown(genome) => assert!(genome.starts_with("3 ")),
            other => panic!("expected an unknown topology, got {other:?}"),
        }
    }

    #[test]
    fn disabling_minimization_keeps_the_oversized_cell() {
        let doubled: PeriodicGraph3D =
            "3 1 2 0 0 0 1 2 -1 0 0 1 1 0 1 0 1 1 0 0 1 2 2 0 1 0 2 2 0 0 1"
                .parse()
                .unwrap();
        let net = net_from_graph(doubled, vec!["X".into(), "X".into()]).unwrap();
        let options = Options {
            minimize: false,
            ..Options::default()
        };
        let genome = topological_genome(net, &options).unwrap();
        // two vertices survive, so the genome cannot be the one-vertex pcu key
        assert_ne!(genome, PCU);
        assert!(genome.contains(" 2 "));
    }
}
