//! Candidate lattice translations and primitive-cell reduction.
//!
//! A net handed in by input collaborators may describe its topology in a
//! cell larger than the translational primitive one. [`minimize`] finds the
//! extra translations, quotients the net by the enlarged translation lattice
//! and repeats until none remain.

use crate::core::arithmetic::{
    cmp_rvec, det3, inv3, mat_from_columns, mat_vec, rat, rmat_to_imat, rvec, rvec_add, rvec_of,
    rvec_sub, rvec_to_ivec, rvec_zero, IMat, IVec, RMat, RVec, Rat,
};
use crate::core::models::net::CrystalNet;
use crate::engine::error::GenomeError;
use crate::engine::symmetry::{induced_map, position_index};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Candidate translations `pos[k] − pos[0]` whose coordinate denominators
/// stay within the natural bound `nv`, sorted by
/// `(zero-coordinate count, leading non-zero index, denominator)`.
pub fn possible_translations(net: &CrystalNet) -> Vec<RVec> {
    let n = net.nv();
    let bound = BigInt::from(n);
    let mut out: Vec<(usize, usize, BigInt, RVec)> = Vec::new();
    for k in 1..n {
        let t = rvec_sub(&net.pos[k], &net.pos[0]);
        if t.iter().any(|c| c.denom() > &bound) {
            continue;
        }
        let zeros = t.iter().filter(|c| c.is_zero()).count();
        let lead = (0..3).find(|&c| !t[c].is_zero()).unwrap_or(3);
        let mut denom = BigInt::one();
        for c in t.iter() {
            denom = denom.lcm(c.denom());
        }
        out.push((zeros, lead, denom, t));
    }
    out.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| cmp_rvec(&a.3, &b.3))
    });
    out.into_iter().map(|(_, _, _, t)| t).collect()
}

/// The vertex permutation induced by translating every vertex by `t`
/// (optionally composed with the rotation `rot`), or `None` when the
/// translated net is not the identical labelled periodic graph.
pub fn check_valid_translation(
    net: &CrystalNet,
    t: &RVec,
    rot: Option<&IMat>,
) -> Option<Vec<usize>> {
    let index = position_index(net);
    induced_map(net, rot, Some(t), &index, true).map(|(perm, _)| perm)
}

/// Reduces the net to its translational primitive cell.
///
/// Loops while any valid non-trivial translation exists: a minimal-volume
/// lattice-enlarging matrix is assembled from valid translations plus axis
/// fallbacks and the net is quotiented by it. Every round strictly shrinks
/// the vertex count, so the loop terminates.
#[instrument(skip_all, name = "minimize")]
pub fn minimize(mut net: CrystalNet) -> Result<CrystalNet, GenomeError> {
    loop {
        let index = position_index(&net);
        let valid: Vec<RVec> = possible_translations(&net)
            .into_iter()
            .filter(|t| induced_map(&net, None, Some(t), &index, true).is_some())
            .collect();
        if valid.is_empty() {
            debug!(vertices = net.nv(), "net is primitive");
            return Ok(net);
        }

        let mut cols = valid;
        cols.push(rvec(rat(1), rat(0), rat(0)));
        cols.push(rvec(rat(0), rat(1), rat(0)));
        cols.push(rvec(rat(0), rat(0), rat(1)));

        let mut best: Option<(Rat, RMat)> = None;
        for i in 0..cols.len() {
            for j in i + 1..cols.len() {
                for k in j + 1..cols.len() {
                    let m = mat_from_columns(&cols[i], &cols[j], &cols[k]);
                    let det = det3(&m);
                    if det.is_zero() {
                        continue;
                    }
                    let m = if det.is_negative() {
                        mat_from_columns(&cols[i], &cols[k], &cols[j])
                    } else {
                        m
                    };
                    // lattice-enlarging: the old lattice must be a sublattice
                    // of the new one, i.e. M⁻¹ is integer
                    let Some(minv) = inv3(&m) else { continue };
                    if rmat_to_imat(&minv).is_none() {
                        continue;
                    }
                    let vol = det.abs();
                    if best.as_ref().map_or(true, |(b, _)| &vol < b) {
                        best = Some((vol, m));
                    }
                }
            }
        }

        let Some((vol, m)) = best else {
            return Err(GenomeError::Internal(
                "valid translations exist but no reduction matrix was found".into(),
            ));
        };
        if vol >= Rat::one() {
            return Err(GenomeError::Internal(
                "reduction matrix does not shrink the cell".into(),
            ));
        }

        let before = net.nv();
        net = reduce_with_matrix(&net, &m)?;
        debug!(from = before, to = net.nv(), "reduced by translation lattice");
        if net.nv() >= before {
            return Err(GenomeError::Internal(
                "primitive-cell reduction did not shrink the net".into(),
            ));
        }
    }
}

/// Quotients the net by the enlarged translation lattice spanned by the
/// columns of `m`, returning a new net expressed in that basis.
///
/// # Errors
///
/// Returns [`GenomeError::UnstableNet`] when vertices that are not related
/// by the quotient lattice collide, and [`GenomeError::Internal`] on a
/// singular matrix.
pub fn reduce_with_matrix(net: &CrystalNet, m: &RMat) -> Result<CrystalNet, GenomeError> {
    let minv = inv3(m)
        .ok_or_else(|| GenomeError::Internal("reduction matrix is singular".into()))?;
    let n = net.nv();

    let mut rep_of: Vec<usize> = vec![0; n];
    let mut delta: Vec<IVec> = Vec::with_capacity(n);
    let mut groups: HashMap<[Rat; 3], usize> = HashMap::new();
    let mut new_pos: Vec<RVec> = Vec::new();
    let mut new_types: Vec<String> = Vec::new();
    for i in 0..n {
        let q = mat_vec(&minv, &net.pos[i]);
        let mut frac = rvec_zero();
        let mut floor = nalgebra::Vector3::zeros();
        for c in 0..3 {
            let fl = q[c].floor().to_integer();
            floor[c] = i64::try_from(fl.clone())
                .map_err(|_| GenomeError::Internal("reduced position floor overflow".into()))?;
            frac[c] = &q[c] - Rat::from_integer(fl);
        }
        let key = [frac[0].clone(), frac[1].clone(), frac[2].clone()];
        let rep = *groups.entry(key).or_insert_with(|| {
            new_pos.push(frac.clone());
            new_types.push(net.types[i].clone());
            new_pos.len() - 1
        });
        if net.types[i] != new_types[rep] {
            return Err(GenomeError::UnstableNet);
        }
        rep_of[i] = rep;
        delta.push(floor);
    }

    let new_n = new_pos.len();
    // every translation orbit must have the same size
    if new_n == 0 || n % new_n != 0 {
        return Err(GenomeError::UnstableNet);
    }
    let mut orbit_sizes = vec![0usize; new_n];
    for &r in &rep_of {
        orbit_sizes[r] += 1;
    }
    if orbit_sizes.iter().any(|&s| s != n / new_n) {
        return Err(GenomeError::UnstableNet);
    }

    let mut graph = crate::core::graph::PeriodicGraph3D::new(new_n);
    for (s, d, o) in net.graph.edges() {
        let q = rvec_add(&mat_vec(&minv, &rvec_of(&o)), &rvec_of(&(delta[d] - delta[s])));
        let ofs = rvec_to_ivec(&q).ok_or_else(|| {
            GenomeError::Internal("edge offset is not integral in the reduced basis".into())
        })?;
        if rep_of[s] == rep_of[d] && ofs == nalgebra::Vector3::zeros() {
            return Err(GenomeError::Internal(
                "reduction produced a zero-offset self-loop".into(),
            ));
        }
        graph.add_edge(rep_of[s], rep_of[d], ofs);
    }

    let cell = net.cell.rebased(m)?;
    Ok(CrystalNet::new(cell, new_types, new_pos, graph)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::PeriodicGraph3D;
    use crate::engine::equilibrium::net_from_graph;
    use crate::core::arithmetic::ratio;

    fn net_of(s: &str) -> CrystalNet {
        let graph: PeriodicGraph3D = s.parse().unwrap();
        let types = vec!["X".to_string(); graph.nv()];
        net_from_graph(graph, types).unwrap()
    }

    fn doubled_pcu() -> CrystalNet {
        net_of("3 1 2 0 0 0 1 2 -1 0 0 1 1 0 1 0 1 1 0 0 1 2 2 0 1 0 2 2 0 0 1")
    }

    #[test]
    fn doubled_cell_offers_the_half_translation() {
        let net = doubled_pcu();
        let ts = possible_translations(&net);
        assert_eq!(ts, vec![rvec(ratio(1, 2), rat(0), rat(0))]);
        let perm = check_valid_translation(&net, &ts[0], None).unwrap();
        assert_eq!(perm, vec![1, 0]);
    }

    #[test]
    fn invalid_translation_is_rejected() {
        let net = net_of("3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1");
        // the dia half-difference is no translation of the net
        let t = rvec(ratio(1, 4), ratio(1, 4), ratio(1, 4));
        assert!(check_valid_translation(&net, &t, None).is_none());
    }

    #[test]
    fn minimize_collapses_the_doubled_cell_to_pcu() {
        let net = minimize(doubled_pcu()).unwrap();
        assert_eq!(net.nv(), 1);
        let pcu: PeriodicGraph3D = "3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1".parse().unwrap();
        assert_eq!(net.graph, pcu);
        assert_eq!(net.cell.det(), ratio(1, 2));
    }

    #[test]
    fn minimize_is_a_no_op_on_a_primitive_net() {
        let net = net_of("3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1");
        let reduced = minimize(net.clone()).unwrap();
        assert_eq!(reduced, net);
    }

    #[test]
    fn tripled_cell_reduces_in_one_pass() {
        let net = net_of(
            "3 1 2 0 0 0 2 3 0 0 0 3 1 1 0 0 1 1 0 1 0 2 2 0 1 0 3 3 0 1 0 1 1 0 0 1 2 2 0 0 1 3 3 0 0 1",
        );
        assert_eq!(net.nv(), 3);
        let reduced = minimize(net).unwrap();
        assert_eq!(reduced.nv(), 1);
        let pcu: PeriodicGraph3D = "3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1".parse().unwrap();
        assert_eq!(reduced.graph, pcu);
    }

    #[test]
    fn unimodular_reduction_only_rebases() {
        let net = net_of("3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1");
        let m = mat_from_columns(
            &rvec(rat(1), rat(0), rat(0)),
            &rvec(rat(1), rat(1), rat(0)),
            &rvec(rat(0), rat(0), rat(1)),
        );
        let rebased = reduce_with_matrix(&net, &m).unwrap();
        assert_eq!(rebased.nv(), net.nv());
        assert_eq!(rebased.graph.ne(), net.graph.ne());
        assert_eq!(rebased.cell.det(), net.cell.det());
    }
}
