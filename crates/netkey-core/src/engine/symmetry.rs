//! Point-symmetry detection for an embedded periodic graph.
//!
//! A symmetry is an integer transform `R ∈ GL₃(ℤ)` together with a vertex
//! permutation `π` such that `R·pos[i] ≡ pos[π(i)] (mod 1)` and every edge
//! `(s, d, o)` maps to the edge `(π(s), π(d), R·o + S_d − S_s)`, where
//! `S_i = R·pos[i] − pos[π(i)]` is the integer rebinning shift. Because
//! positions are unique and `pos[0] = 0`, every symmetry fixes vertex 0, so
//! the search is anchored on the star of vertex 0.

use crate::core::arithmetic::{
    det3_i, inv3, mat_from_columns, mat_mul, mat_vec, rmat_of, rmat_to_imat, rvec_add, rvec_of,
    rvec_sub, IMat, IVec, RVec, Rat,
};
use crate::core::models::net::CrystalNet;
use nalgebra::Vector3;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One detected symmetry of the embedded net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetryOp {
    /// Integer transform acting on fractional coordinates and offsets.
    pub rot: IMat,
    /// Vertex permutation, `perm[i]` is the image of vertex `i`.
    pub perm: Vec<usize>,
}

/// The full set of detected symmetries, identity included.
#[derive(Debug, Clone, Default)]
pub struct Symmetries {
    pub ops: Vec<SymmetryOp>,
    /// True when some operation reverses orientation (`det R = -1`).
    pub has_mirror: bool,
}

impl Symmetries {
    /// Operations whose permutation fixes `u`.
    pub fn stabilizer(&self, u: usize) -> impl Iterator<Item = &SymmetryOp> {
        self.ops.iter().filter(move |op| op.perm[u] == u)
    }

    fn identity(n: usize) -> Self {
        Self {
            ops: vec![SymmetryOp {
                rot: IMat::identity(),
                perm: (0..n).collect(),
            }],
            has_mirror: false,
        }
    }
}

struct StarVector {
    vec: RVec,
    shell: usize,
    end_degree: usize,
}

/// Splits a fractional position into its `[0,1)³` part and integer floor.
fn wrap(p: &RVec) -> ([Rat; 3], IVec) {
    let mut frac = [Rat::from_integer(0.into()), Rat::from_integer(0.into()), Rat::from_integer(0.into())];
    let mut floor = Vector3::zeros();
    for c in 0..3 {
        let fl = p[c].floor().to_integer();
        floor[c] = i64::try_from(fl.clone()).expect("position floor exceeds i64");
        frac[c] = &p[c] - Rat::from_integer(fl);
    }
    (frac, floor)
}

fn position_key(p: &RVec) -> [Rat; 3] {
    [p[0].clone(), p[1].clone(), p[2].clone()]
}

/// Vectors from vertex 0 to nearby cover vertices, shell by shell, until
/// they span all three dimensions (or the shell cap is hit for degenerate
/// nets).
fn star_vectors(net: &CrystalNet) -> Vec<StarVector> {
    const SHELL_CAP: usize = 10;
    let graph = &net.graph;
    let mut out: Vec<StarVector> = Vec::new();
    let mut basis: Vec<RVec> = Vec::new();
    let mut visited: HashSet<(usize, [i64; 3])> = HashSet::from([(0, [0, 0, 0])]);
    let mut frontier: Vec<(usize, IVec)> = vec![(0, Vector3::zeros())];
    for shell in 1..=SHELL_CAP {
        let mut next = Vec::new();
        for (v, at) in frontier.drain(..) {
            for e in graph.neighbours(v) {
                let ofs = at + e.ofs;
                if visited.insert((e.dst, [ofs.x, ofs.y, ofs.z])) {
                    let vec = rvec_sub(
                        &rvec_add(&net.pos[e.dst], &rvec_of(&ofs)),
                        &net.pos[0],
                    );
                    if rank_with(&basis, &vec) > basis.len() {
                        basis.push(vec.clone());
                    }
                    out.push(StarVector {
                        vec,
                        shell,
                        end_degree: graph.degree(e.dst),
                    });
                    next.push((e.dst, ofs));
                }
            }
        }
        frontier = next;
        if basis.len() == 3 {
            break;
        }
    }
    out
}

/// Rank over ℚ of `basis ∪ {v}`, assuming `basis` is already independent.
fn rank_with(basis: &[RVec], v: &RVec) -> usize {
    use crate::core::arithmetic::det3;
    match basis.len() {
        0 => {
            if v.iter().all(|c| c == &Rat::from_integer(0.into())) {
                0
            } else {
                1
            }
        }
        1 => {
            // parallel test via all 2×2 minors
            let a = &basis[0];
            let cross_zero = (0..3).all(|i| {
                let j = (i + 1) % 3;
                &a[i] * &v[j] == &a[j] * &v[i]
            });
            if cross_zero {
                1
            } else {
                2
            }
        }
        2 => {
            let m = mat_from_columns(&basis[0], &basis[1], v);
            if det3(&m) == Rat::from_integer(0.into()) {
                2
            } else {
                3
            }
        }
        _ => 3,
    }
}

/// Detects all point symmetries of the net.
pub fn find_symmetries(net: &CrystalNet) -> Symmetries {
    let n = net.nv();
    if n == 0 {
        return Symmetries::default();
    }

    let stars = star_vectors(net);
    let mut reference: Vec<usize> = Vec::new();
    let mut ref_basis: Vec<RVec> = Vec::new();
    for (i, s) in stars.iter().enumerate() {
        if rank_with(&ref_basis, &s.vec) > ref_basis.len() {
            ref_basis.push(s.vec.clone());
            reference.push(i);
            if reference.len() == 3 {
                break;
            }
        }
    }
    if reference.len() < 3 {
        // degenerate embedding, the net is not 3-periodic; candidates will
        // report the dimensionality failure
        return Symmetries::identity(n);
    }

    let s_mat = mat_from_columns(
        &stars[reference[0]].vec,
        &stars[reference[1]].vec,
        &stars[reference[2]].vec,
    );
    let s_inv = inv3(&s_mat).expect("reference star triple is independent");

    let index = position_index(net);

    let compatible = |r: usize, i: usize| -> bool {
        stars[i].shell == stars[reference[r]].shell
            && stars[i].end_degree == stars[reference[r]].end_degree
    };

    let mut seen: HashSet<([i64; 9], Vec<usize>)> = HashSet::new();
    let mut ops: Vec<SymmetryOp> = Vec::new();
    let mut has_mirror = false;

    for i1 in (0..stars.len()).filter(|&i| compatible(0, i)) {
        for i2 in (0..stars.len()).filter(|&i| i != i1 && compatible(1, i)) {
            for i3 in (0..stars.len()).filter(|&i| i != i1 && i != i2 && compatible(2, i)) {
                let t_mat = mat_from_columns(&stars[i1].vec, &stars[i2].vec, &stars[i3].vec);
                let r_rat = mat_mul(&t_mat, &s_inv);
                let Some(rot) = rmat_to_imat(&r_rat) else {
                    continue;
                };
                if det3_i(&rot).abs() != 1 {
                    continue;
                }
                let Some(op) = check_symmetry(net, &rot, &index) else {
                    continue;
                };
                let flat = [
                    rot[(0, 0)],
                    rot[(0, 1)],
                    rot[(0, 2)],
                    rot[(1, 0)],
                    rot[(1, 1)],
                    rot[(1, 2)],
                    rot[(2, 0)],
                    rot[(2, 1)],
                    rot[(2, 2)],
                ];
                if seen.insert((flat, op.perm.clone())) {
                    if det3_i(&op.rot) == -1 {
                        has_mirror = true;
                    }
                    ops.push(op);
                }
            }
        }
    }

    debug!(count = ops.len(), has_mirror, "symmetry detection finished");
    Symmetries { ops, has_mirror }
}

/// Validates a candidate rotation against all positions and edges, returning
/// the induced vertex permutation on success.
fn check_symmetry(
    net: &CrystalNet,
    rot: &IMat,
    index: &HashMap<[Rat; 3], usize>,
) -> Option<SymmetryOp> {
    let (perm, _) = induced_map(net, Some(rot), None, index, false)?;
    Some(SymmetryOp { rot: *rot, perm })
}

/// Maps every vertex through `x ↦ R·x + t` and rebins into the origin cell.
///
/// Returns the induced permutation and per-vertex integer shifts iff the
/// image reproduces the identical (optionally label-checked) periodic graph.
/// Shared by symmetry detection and translation validation.
pub(crate) fn induced_map(
    net: &CrystalNet,
    rot: Option<&IMat>,
    t: Option<&RVec>,
    index: &HashMap<[Rat; 3], usize>,
    check_types: bool,
) -> Option<(Vec<usize>, Vec<IVec>)> {
    let n = net.nv();
    let r_rat = rot.map(rmat_of);
    let mut perm = vec![0usize; n];
    let mut shift = vec![Vector3::<i64>::zeros(); n];
    for i in 0..n {
        let mut image = match &r_rat {
            Some(r) => mat_vec(r, &net.pos[i]),
            None => net.pos[i].clone(),
        };
        if let Some(t) = t {
            image = rvec_add(&image, t);
        }
        let (frac, floor) = wrap(&image);
        let &j = index.get(&frac)?;
        if check_types && net.types[i] != net.types[j] {
            return None;
        }
        perm[i] = j;
        shift[i] = floor;
    }
    for (s, d, o) in net.graph.edges() {
        let rotated = match rot {
            Some(r) => r * o,
            None => o,
        };
        let mapped = rotated + shift[d] - shift[s];
        if !net.graph.has_edge(perm[s], perm[d], mapped) {
            return None;
        }
    }
    Some((perm, shift))
}

/// Position-to-vertex lookup table for a normalized net.
pub(crate) fn position_index(net: &CrystalNet) -> HashMap<[Rat; 3], usize> {
    net.pos
        .iter()
        .enumerate()
        .map(|(i, p)| (position_key(p), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::equilibrium::net_from_graph;

    fn net_of(s: &str) -> CrystalNet {
        let graph: crate::core::graph::PeriodicGraph3D = s.parse().unwrap();
        let types = vec!["X".to_string(); graph.nv()];
        net_from_graph(graph, types).unwrap()
    }

    #[test]
    fn cubic_net_has_the_full_signed_permutation_group() {
        let net = net_of("3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1");
        let syms = find_symmetries(&net);
        assert_eq!(syms.ops.len(), 48);
        assert!(syms.has_mirror);
        assert!(syms.ops.iter().all(|op| op.perm == vec![0]));
    }

    #[test]
    fn diamond_net_permutes_the_three_offset_neighbours() {
        let net = net_of("3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1");
        let syms = find_symmetries(&net);
        // integral point operations can only permute the three unit-offset
        // neighbours of vertex 0; the zero-offset one stays fixed
        assert_eq!(syms.ops.len(), 6);
        assert!(syms.has_mirror);
        // no operation can exchange the two vertices: only vertex 0 sits on
        // a lattice point
        assert!(syms.ops.iter().all(|op| op.perm == vec![0, 1]));
    }

    #[test]
    fn every_detected_operation_preserves_the_edge_set() {
        let net = net_of("3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1");
        let syms = find_symmetries(&net);
        for op in &syms.ops {
            let mut shift = Vec::new();
            let r_rat = rmat_of(&op.rot);
            for i in 0..net.nv() {
                let image = mat_vec(&r_rat, &net.pos[i]);
                let (frac, floor) = wrap(&image);
                assert_eq!(position_key(&net.pos[op.perm[i]]), frac);
                shift.push(floor);
            }
            for (s, d, o) in net.graph.edges() {
                let mapped = op.rot * o + shift[d] - shift[s];
                assert!(net.graph.has_edge(op.perm[s], op.perm[d], mapped));
            }
        }
    }

    #[test]
    fn stabilizer_of_the_anchor_is_the_whole_group() {
        let net = net_of("3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1");
        let syms = find_symmetries(&net);
        assert_eq!(syms.stabilizer(0).count(), syms.ops.len());
    }
}
