//! Equilibrium (barycentric) placement of net vertices.
//!
//! Every vertex is placed at the exact average of its neighbours, taking the
//! periodic offsets into account, with vertex 0 pinned at the origin. This
//! is a linear system over the graph Laplacian whose 3-dimensional null
//! space is removed by the pinning; it is solved in exact rationals.

use crate::core::arithmetic::{rvec_add, rvec_of, rvec_scale, rvec_sub, rvec_zero, RVec, Rat};
use crate::core::graph::PeriodicGraph3D;
use crate::core::models::cell::Cell;
use crate::core::models::net::CrystalNet;
use crate::engine::error::GenomeError;
use num_traits::{One, Zero};
use tracing::debug;

/// Solves for the equilibrium positions of all vertices, `pos[0] = 0`.
///
/// # Errors
///
/// Returns [`GenomeError::InvalidInput`] when the graph is empty or not
/// connected (the Laplacian system is singular in that case).
pub fn equilibrium_positions(graph: &PeriodicGraph3D) -> Result<Vec<RVec>, GenomeError> {
    let n = graph.nv();
    if n == 0 {
        return Err(GenomeError::InvalidInput("the net has no vertices".into()));
    }
    if n == 1 {
        return Ok(vec![rvec_zero()]);
    }

    // Laplacian rows for vertices 1..n, with vertex 0 eliminated:
    //   deg(v)·pos[v] − Σ_{(w,o)∈N(v)} pos[w] = Σ_{(w,o)∈N(v)} o
    let m = n - 1;
    let mut a: Vec<Vec<Rat>> = vec![vec![Rat::zero(); m]; m];
    let mut b: Vec<RVec> = vec![rvec_zero(); m];
    for v in 1..n {
        let r = v - 1;
        a[r][r] = Rat::from_integer(graph.degree(v).into());
        for e in graph.neighbours(v) {
            if e.dst > 0 {
                a[r][e.dst - 1] -= Rat::one();
            }
            b[r] = rvec_add(&b[r], &rvec_of(&e.ofs));
        }
    }

    // forward elimination with exact pivots
    for col in 0..m {
        let pivot = (col..m)
            .find(|&r| !a[r][col].is_zero())
            .ok_or_else(|| GenomeError::InvalidInput("the net graph is not connected".into()))?;
        a.swap(col, pivot);
        b.swap(col, pivot);
        let pivot_row = a[col].clone();
        let pivot_rhs = b[col].clone();
        for r in col + 1..m {
            if a[r][col].is_zero() {
                continue;
            }
            let f = &a[r][col] / &pivot_row[col];
            for c in col..m {
                let next = &a[r][c] - &f * &pivot_row[c];
                a[r][c] = next;
            }
            b[r] = rvec_sub(&b[r], &rvec_scale(&pivot_rhs, &f));
        }
    }

    // back substitution
    let mut x: Vec<RVec> = vec![rvec_zero(); m];
    for col in (0..m).rev() {
        let mut acc = b[col].clone();
        for c in col + 1..m {
            acc = rvec_sub(&acc, &rvec_scale(&x[c], &a[col][c]));
        }
        let inv = Rat::one() / &a[col][col];
        x[col] = rvec_scale(&acc, &inv);
    }

    let mut pos = Vec::with_capacity(n);
    pos.push(rvec_zero());
    pos.extend(x);
    debug!(vertices = n, "equilibrium placement solved");
    Ok(pos)
}

/// Builds a normalized [`CrystalNet`] from a bare periodic graph by solving
/// for its equilibrium placement in the reference cell.
///
/// # Errors
///
/// Returns [`GenomeError::UnstableNet`] when two vertices end up at the same
/// equilibrium position.
pub fn net_from_graph(
    graph: PeriodicGraph3D,
    types: Vec<String>,
) -> Result<CrystalNet, GenomeError> {
    let pos = equilibrium_positions(&graph)?;
    let net = CrystalNet::new(Cell::reference(), types, pos, graph)?;
    if net.has_colliding_vertices() {
        return Err(GenomeError::UnstableNet);
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arithmetic::{ratio, rvec};

    fn labelled(graph: &PeriodicGraph3D) -> Vec<String> {
        vec!["X".to_string(); graph.nv()]
    }

    #[test]
    fn single_vertex_sits_at_the_origin() {
        let g: PeriodicGraph3D = "3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1".parse().unwrap();
        assert_eq!(equilibrium_positions(&g).unwrap(), vec![rvec_zero()]);
    }

    #[test]
    fn diamond_vertex_lands_on_quarter_coordinates() {
        let g: PeriodicGraph3D = "3 1 2 0 0 0 1 2 1 0 0 1 2 0 1 0 1 2 0 0 1".parse().unwrap();
        let net = net_from_graph(g.clone(), labelled(&g)).unwrap();
        assert_eq!(net.pos[0], rvec_zero());
        assert_eq!(net.pos[1], rvec(ratio(1, 4), ratio(1, 4), ratio(1, 4)));
    }

    #[test]
    fn doubled_cell_places_twin_at_one_half() {
        let g: PeriodicGraph3D =
            "3 1 2 0 0 0 1 2 -1 0 0 1 1 0 1 0 1 1 0 0 1 2 2 0 1 0 2 2 0 0 1"
                .parse()
                .unwrap();
        let net = net_from_graph(g.clone(), labelled(&g)).unwrap();
        assert_eq!(net.pos[0], rvec_zero());
        assert_eq!(net.pos[1], rvec(ratio(1, 2), ratio(0, 1), ratio(0, 1)));
    }

    #[test]
    fn coincident_positions_are_rejected_as_unstable() {
        // two vertices bonded through opposite cells only: both equilibrate
        // at the origin
        let g: PeriodicGraph3D = "3 1 2 1 0 0 1 2 -1 0 0 1 2 0 1 0 1 2 0 -1 0 1 2 0 0 1 1 2 0 0 -1"
            .parse()
            .unwrap();
        let err = net_from_graph(g.clone(), labelled(&g)).unwrap_err();
        assert!(matches!(err, GenomeError::UnstableNet));
    }

    #[test]
    fn disconnected_graph_is_reported_invalid() {
        let mut g = PeriodicGraph3D::new(2);
        g.add_edge(0, 0, nalgebra::Vector3::new(1, 0, 0));
        g.add_edge(1, 1, nalgebra::Vector3::new(1, 0, 0));
        let err = equilibrium_positions(&g).unwrap_err();
        assert!(matches!(err, GenomeError::InvalidInput(_)));
    }
}
