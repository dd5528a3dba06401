//! Deterministic breadth-oriented relabelling of a net in a candidate basis.
//!
//! Starting from the candidate vertex, cover vertices are visited in the
//! order of their coordinates in the candidate basis; the emitted edge list,
//! compared lexicographically, is the candidate's key. A run aborts as soon
//! as it provably cannot beat the best key seen so far.

use crate::core::arithmetic::{
    cmp_rvec, inv3, mat_vec, rvec_add, rvec_neg, rvec_of, rvec_sub, rvec_to_ivec, rvec_zero,
    IVec, RVec,
};
use crate::core::models::net::CrystalNet;
use crate::engine::candidates::Candidate;
use crate::engine::error::GenomeError;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One emitted edge: endpoints in the new numbering, offset in the
/// candidate basis. Offsets stay rational until `find_basis` rewrites the
/// winning list to integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEdge {
    pub src: usize,
    pub dst: usize,
    pub ofs: RVec,
}

impl Ord for KeyEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.src
            .cmp(&other.src)
            .then(self.dst.cmp(&other.dst))
            .then_with(|| cmp_rvec(&self.ofs, &other.ofs))
    }
}

impl PartialOrd for KeyEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Initial "best" that any real run improves on.
pub fn sentinel_key() -> Vec<KeyEdge> {
    vec![KeyEdge {
        src: usize::MAX,
        dst: usize::MAX,
        ofs: rvec_zero(),
    }]
}

fn push_edge(
    edges: &mut Vec<KeyEdge>,
    improved: &mut bool,
    best: &[KeyEdge],
    e: KeyEdge,
) -> bool {
    edges.push(e);
    if *improved {
        return true;
    }
    let i = edges.len() - 1;
    if i >= best.len() {
        return false;
    }
    match edges[i].cmp(&best[i]) {
        Ordering::Greater => false,
        Ordering::Less => {
            *improved = true;
            true
        }
        Ordering::Equal => true,
    }
}

/// Relabels the net from `cand` and returns `(vmap, edges)` iff the emitted
/// edge list is strictly smaller than `best`.
///
/// `vmap[i]` is the original vertex behind new index `i`. Every undirected
/// quotient edge appears exactly once: towards a later index as seen from
/// the earlier one, and self-edges with their lexicographically positive
/// offset.
pub fn candidate_key(
    net: &CrystalNet,
    cand: &Candidate,
    best: &[KeyEdge],
) -> Result<Option<(Vec<usize>, Vec<KeyEdge>)>, GenomeError> {
    let n = net.nv();
    let ib = inv3(&cand.basis)
        .ok_or_else(|| GenomeError::Internal("singular candidate basis".into()))?;
    let origin = &net.pos[cand.vertex];

    let mut vmap: Vec<usize> = vec![cand.vertex];
    let mut newpos: Vec<RVec> = vec![rvec_zero()];
    // integer anchor of each relabelled vertex in the old basis
    let mut anchors: Vec<IVec> = vec![IVec::zeros()];
    let mut rev: HashMap<usize, usize> = HashMap::from([(cand.vertex, 0)]);
    let mut edges: Vec<KeyEdge> = Vec::with_capacity(net.graph.ne());
    let mut improved = false;

    let mut t = 0;
    while t < vmap.len() {
        let vt = vmap[t];
        let anchor = anchors[t];
        let mut around: Vec<(RVec, usize)> = net
            .graph
            .neighbours(vt)
            .iter()
            .map(|e| {
                let vec = rvec_sub(
                    &rvec_add(&net.pos[e.dst], &rvec_of(&(e.ofs + anchor))),
                    origin,
                );
                (mat_vec(&ib, &vec), e.dst)
            })
            .collect();
        around.sort_by(|a, b| cmp_rvec(&a.0, &b.0).then(a.1.cmp(&b.1)));
        // group all copies of one old vertex together while keeping the
        // positional order
        let mut occurrence: HashMap<usize, usize> = HashMap::new();
        for (_, w) in &around {
            let next = occurrence.len();
            occurrence.entry(*w).or_insert(next);
        }
        around.sort_by(|a, b| {
            occurrence[&a.1]
                .cmp(&occurrence[&b.1])
                .then_with(|| cmp_rvec(&a.0, &b.0))
        });

        for (c, w) in around {
            let keep = match rev.get(&w).copied() {
                None => {
                    let h = vmap.len();
                    vmap.push(w);
                    rev.insert(w, h);
                    let back = rvec_sub(
                        &rvec_add(&mat_vec(&cand.basis, &c), origin),
                        &net.pos[w],
                    );
                    let anchor_h = rvec_to_ivec(&back).ok_or_else(|| {
                        GenomeError::Internal(
                            "non-integral anchor for a relabelled vertex".into(),
                        )
                    })?;
                    anchors.push(anchor_h);
                    newpos.push(c.clone());
                    push_edge(
                        &mut edges,
                        &mut improved,
                        best,
                        KeyEdge {
                            src: t,
                            dst: h,
                            ofs: rvec_zero(),
                        },
                    )
                }
                Some(j) => {
                    let rofs = rvec_sub(&c, &newpos[j]);
                    if j > t {
                        push_edge(
                            &mut edges,
                            &mut improved,
                            best,
                            KeyEdge {
                                src: t,
                                dst: j,
                                ofs: rofs,
                            },
                        )
                    } else if j == t && cmp_rvec(&rofs, &rvec_zero()) == Ordering::Less {
                        push_edge(
                            &mut edges,
                            &mut improved,
                            best,
                            KeyEdge {
                                src: t,
                                dst: t,
                                ofs: rvec_neg(&rofs),
                            },
                        )
                    } else {
                        // the reverse half was, or will be, emitted from the
                        // smaller index
                        true
                    }
                }
            };
            if !keep {
                return Ok(None);
            }
        }
        t += 1;
    }

    if vmap.len() != n {
        return Err(GenomeError::Internal(
            "candidate traversal did not reach every vertex".into(),
        ));
    }
    debug_assert!(
        {
            let mut sorted = edges.clone();
            sorted.sort();
            sorted.windows(2).all(|w| w[0] != w[1])
        },
        "key edges must be unique"
    );
    Ok(improved.then_some((vmap, edges)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arithmetic::{rat, rvec};
    use crate::core::graph::PeriodicGraph3D;
    use crate::engine::candidates::find_candidates;
    use crate::engine::equilibrium::net_from_graph;
    use crate::engine::partition::partition_by_coordination_sequence;
    use crate::engine::symmetry::find_symmetries;

    fn pcu_setup() -> (CrystalNet, Vec<Candidate>) {
        let graph: PeriodicGraph3D = "3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1".parse().unwrap();
        let net = net_from_graph(graph, vec!["X".into()]).unwrap();
        let syms = find_symmetries(&net);
        let parts = partition_by_coordination_sequence(&net.graph, &syms, 10);
        let cands = find_candidates(&net, &syms, &parts).unwrap();
        (net, cands)
    }

    #[test]
    fn cubic_key_lists_the_three_axes_in_descending_order() {
        let (net, cands) = pcu_setup();
        let best = sentinel_key();
        let (vmap, edges) = candidate_key(&net, &cands[0], &best).unwrap().unwrap();
        assert_eq!(vmap, vec![0]);
        let expect = vec![
            KeyEdge { src: 0, dst: 0, ofs: rvec(rat(1), rat(0), rat(0)) },
            KeyEdge { src: 0, dst: 0, ofs: rvec(rat(0), rat(1), rat(0)) },
            KeyEdge { src: 0, dst: 0, ofs: rvec(rat(0), rat(0), rat(1)) },
        ];
        assert_eq!(edges, expect);
    }

    #[test]
    fn equal_key_is_not_an_improvement() {
        let (net, cands) = pcu_setup();
        let best = sentinel_key();
        let (_, edges) = candidate_key(&net, &cands[0], &best).unwrap().unwrap();
        assert!(candidate_key(&net, &cands[0], &edges).unwrap().is_none());
    }

    #[test]
    fn worse_prefix_aborts_early() {
        let (net, cands) = pcu_setup();
        let better = vec![KeyEdge {
            src: 0,
            dst: 0,
            ofs: rvec(rat(0), rat(0), rat(1)),
        }];
        assert!(candidate_key(&net, &cands[0], &better).unwrap().is_none());
    }
}
