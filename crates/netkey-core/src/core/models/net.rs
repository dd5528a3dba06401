use crate::core::arithmetic::{cmp_rvec, rvec_add, rvec_of, rvec_sub, IVec, RVec, Rat};
use crate::core::graph::{PeriodicEdge, PeriodicGraph3D};
use crate::core::models::cell::Cell;
use nalgebra::Vector3;
use num_bigint::BigInt;
use num_traits::One;
use thiserror::Error;

/// Error type for a net whose normalization leaves the representable range.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("edge offset overflows the integer range during rebinning")]
    OffsetOverflow,
}

/// A crystal net: unit cell, vertex labels, exact equilibrium positions and
/// the quotient periodic graph.
///
/// Invariants, maintained by [`CrystalNet::new`]:
/// - every position lies in `[0, 1)³`,
/// - vertices are sorted lexicographically by position,
/// - for every edge `(s, d, o)` the vector `pos[d] + o - pos[s]` is the
///   exact translation between the equilibrium endpoints.
///
/// A net is never mutated in place; basis changes and quotients build a new
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrystalNet {
    pub cell: Cell,
    pub types: Vec<String>,
    pub pos: Vec<RVec>,
    pub graph: PeriodicGraph3D,
}

impl CrystalNet {
    /// Builds a net from raw positions, rebinning every vertex into the
    /// origin cell and renumbering vertices in lexicographic position order.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::OffsetOverflow`] when rebinning pushes an edge
    /// offset outside `i64`.
    pub fn new(
        cell: Cell,
        types: Vec<String>,
        pos: Vec<RVec>,
        graph: PeriodicGraph3D,
    ) -> Result<Self, NetError> {
        let n = graph.nv();
        assert_eq!(pos.len(), n, "one position per vertex");
        assert_eq!(types.len(), n, "one label per vertex");

        let mut floors: Vec<IVec> = Vec::with_capacity(n);
        let mut wrapped: Vec<RVec> = Vec::with_capacity(n);
        for p in &pos {
            let mut f = Vector3::zeros();
            let mut w = p.clone();
            for c in 0..3 {
                let fl = p[c].floor().to_integer();
                f[c] = i64::try_from(fl.clone()).map_err(|_| NetError::OffsetOverflow)?;
                w[c] = &p[c] - Rat::from_integer(fl);
            }
            floors.push(f);
            wrapped.push(w);
        }

        // renumber so that positions come out sorted
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| cmp_rvec(&wrapped[a], &wrapped[b]).then(a.cmp(&b)));
        let mut old_to_new = vec![0usize; n];
        for (new, &old) in order.iter().enumerate() {
            old_to_new[old] = new;
        }

        let mut out = PeriodicGraph3D::new(n);
        for (s, d, o) in graph.edges() {
            let mut adj = Vector3::zeros();
            for c in 0..3 {
                adj[c] = o[c]
                    .checked_add(floors[d][c])
                    .and_then(|t| t.checked_sub(floors[s][c]))
                    .ok_or(NetError::OffsetOverflow)?;
            }
            out.add_edge(old_to_new[s], old_to_new[d], adj);
        }

        let types = order.iter().map(|&i| types[i].clone()).collect();
        let pos = order.iter().map(|&i| wrapped[i].clone()).collect();
        Ok(Self {
            cell,
            types,
            pos,
            graph: out,
        })
    }

    pub fn nv(&self) -> usize {
        self.graph.nv()
    }

    /// Exact vector from the equilibrium position of `src` to the endpoint
    /// of the half-edge `e`.
    pub fn edge_vector(&self, src: usize, e: &PeriodicEdge) -> RVec {
        rvec_sub(&rvec_add(&self.pos[e.dst], &rvec_of(&e.ofs)), &self.pos[src])
    }

    /// Largest denominator appearing in any position coordinate.
    pub fn max_denominator(&self) -> BigInt {
        let mut max = BigInt::one();
        for p in &self.pos {
            for c in p.iter() {
                if c.denom() > &max {
                    max = c.denom().clone();
                }
            }
        }
        max
    }

    /// True when two vertices share an equilibrium position.
    pub fn has_colliding_vertices(&self) -> bool {
        // positions are sorted, collisions are adjacent
        self.pos.windows(2).any(|w| w[0] == w[1])
    }
}
