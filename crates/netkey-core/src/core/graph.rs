//! Directed half-edge representation of a 3-periodic graph.
//!
//! A vertex lives in every unit cell; an edge `(src, dst, ofs)` connects
//! `src` in the origin cell to `dst` in the cell at integer offset `ofs`.
//! The edge set is kept closed under the involution
//! `(s, d, o) <-> (d, s, -o)` by construction: every mutation goes through
//! [`PeriodicGraph3D::add_edge`] / [`PeriodicGraph3D::remove_edge`].

use crate::core::arithmetic::{cmp_ivec, hnf_rows, BVec, IVec};
use nalgebra::Vector3;
use num_bigint::BigInt;
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One outgoing half-edge: the destination vertex and the cell offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicEdge {
    pub dst: usize,
    pub ofs: IVec,
}

impl PeriodicEdge {
    fn key(&self) -> (usize, [i64; 3]) {
        (self.dst, [self.ofs.x, self.ofs.y, self.ofs.z])
    }
}

/// Error type for failed parsing of a periodic-net string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseNetError {
    #[error("empty net string")]
    Empty,
    #[error("unsupported periodicity {0}, only 3-periodic nets are accepted")]
    Dimension(String),
    #[error("invalid token {0:?}")]
    Token(String),
    #[error("truncated edge record, expected `src dst ox oy oz`")]
    Truncated,
    #[error("vertex numbers are 1-based, found 0")]
    VertexZero,
    #[error("self-loop with zero offset on vertex {0}")]
    ZeroLoop(usize),
    #[error("duplicate edge {0} {1} {2} {3} {4}")]
    Duplicate(usize, usize, i64, i64, i64),
}

/// A finite quotient of a 3-periodic graph.
///
/// Vertices are `0..n` internally and 1-based in the serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicGraph3D {
    neigh: Vec<Vec<PeriodicEdge>>,
}

impl PeriodicGraph3D {
    pub fn new(n: usize) -> Self {
        Self {
            neigh: vec![Vec::new(); n],
        }
    }

    pub fn nv(&self) -> usize {
        self.neigh.len()
    }

    /// Total number of undirected edges in the quotient.
    pub fn ne(&self) -> usize {
        let halves: usize = self.neigh.iter().map(Vec::len).sum();
        halves / 2
    }

    pub fn degree(&self, v: usize) -> usize {
        self.neigh[v].len()
    }

    /// Outgoing half-edges of `v`, sorted by `(dst, ofs)`.
    pub fn neighbours(&self, v: usize) -> &[PeriodicEdge] {
        &self.neigh[v]
    }

    pub fn has_edge(&self, src: usize, dst: usize, ofs: IVec) -> bool {
        let probe = PeriodicEdge { dst, ofs };
        self.neigh[src]
            .binary_search_by(|e| e.key().cmp(&probe.key()))
            .is_ok()
    }

    /// Inserts the edge and its reverse half. Returns `false` when the edge
    /// was already present. A self-loop with zero offset is rejected.
    pub fn add_edge(&mut self, src: usize, dst: usize, ofs: IVec) -> bool {
        assert!(
            src != dst || ofs != Vector3::zeros(),
            "self-loop with zero offset"
        );
        if self.has_edge(src, dst, ofs) {
            return false;
        }
        Self::insert_half(&mut self.neigh[src], PeriodicEdge { dst, ofs });
        Self::insert_half(&mut self.neigh[dst], PeriodicEdge { dst: src, ofs: -ofs });
        true
    }

    pub fn remove_edge(&mut self, src: usize, dst: usize, ofs: IVec) -> bool {
        let fwd = Self::remove_half(&mut self.neigh[src], PeriodicEdge { dst, ofs });
        if fwd {
            let removed =
                Self::remove_half(&mut self.neigh[dst], PeriodicEdge { dst: src, ofs: -ofs });
            debug_assert!(removed, "edge set lost reversal closure");
        }
        fwd
    }

    fn insert_half(list: &mut Vec<PeriodicEdge>, e: PeriodicEdge) {
        match list.binary_search_by(|x| x.key().cmp(&e.key())) {
            Ok(_) => {}
            Err(i) => list.insert(i, e),
        }
    }

    fn remove_half(list: &mut Vec<PeriodicEdge>, e: PeriodicEdge) -> bool {
        match list.binary_search_by(|x| x.key().cmp(&e.key())) {
            Ok(i) => {
                list.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Canonical directed representatives: `src < dst`, or `src == dst` with
    /// a lexicographically positive offset.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, IVec)> + '_ {
        self.neigh.iter().enumerate().flat_map(|(src, list)| {
            list.iter().filter_map(move |e| {
                let keep = src < e.dst
                    || (src == e.dst && cmp_ivec(&e.ofs, &Vector3::zeros()) == Ordering::Greater);
                keep.then_some((src, e.dst, e.ofs))
            })
        })
    }

    /// Upper bound on the offset magnitude reachable in one hop, at least 1.
    pub fn graph_width(&self) -> i64 {
        self.neigh
            .iter()
            .flatten()
            .map(|e| e.ofs.x.abs().max(e.ofs.y.abs()).max(e.ofs.z.abs()))
            .max()
            .unwrap_or(1)
            .max(1)
    }

    /// Sizes of the 1..=depth shells around `v` in the universal cover.
    ///
    /// Cover vertices are `(vertex, offset)` pairs; when the offset range is
    /// small enough a dense visited grid sized from [`Self::graph_width`] is
    /// used, otherwise a hash set.
    pub fn coordination_sequence(&self, v: usize, depth: usize) -> Vec<usize> {
        let n = self.nv();
        let width = self.graph_width();
        let reach = width
            .checked_mul(depth as i64)
            .unwrap_or(i64::MAX / 4);
        let side = reach.checked_mul(2).and_then(|s| s.checked_add(1));
        let dense_cells = side
            .and_then(|s| s.checked_pow(3))
            .and_then(|c| c.checked_mul(n as i64));
        let mut visited: Shelled = match dense_cells {
            Some(cells) if cells <= 32_000_000 => {
                Shelled::Dense(vec![false; cells as usize], reach, side.unwrap(), n)
            }
            _ => Shelled::Sparse(HashSet::new()),
        };

        let mut seq = Vec::with_capacity(depth);
        let mut frontier = vec![(v, Vector3::<i64>::zeros())];
        visited.insert(v, Vector3::zeros());
        for _ in 0..depth {
            let mut next = Vec::new();
            for (u, at) in frontier.drain(..) {
                for e in self.neighbours(u) {
                    let ofs = at + e.ofs;
                    if visited.insert(e.dst, ofs) {
                        next.push((e.dst, ofs));
                    }
                }
            }
            seq.push(next.len());
            frontier = next;
        }
        seq
    }

    /// Rank over the rationals of the offset lattice spanned by the cycle
    /// space of the component containing vertex 0.
    pub fn dimensionality(&self) -> usize {
        if self.nv() == 0 {
            return 0;
        }
        let mut anchor: Vec<Option<IVec>> = vec![None; self.nv()];
        anchor[0] = Some(Vector3::zeros());
        let mut queue = VecDeque::from([0usize]);
        let mut cycles: Vec<BVec> = Vec::new();
        while let Some(u) = queue.pop_front() {
            let at = anchor[u].unwrap();
            for e in self.neighbours(u) {
                let pos = at + e.ofs;
                match anchor[e.dst] {
                    None => {
                        anchor[e.dst] = Some(pos);
                        queue.push_back(e.dst);
                    }
                    Some(prev) => {
                        let cyc = pos - prev;
                        if cyc != Vector3::zeros() {
                            cycles.push([
                                BigInt::from(cyc.x),
                                BigInt::from(cyc.y),
                                BigInt::from(cyc.z),
                            ]);
                        }
                    }
                }
            }
        }
        hnf_rows(&cycles).len()
    }

    pub fn is_connected(&self) -> bool {
        if self.nv() == 0 {
            return true;
        }
        let mut seen = vec![false; self.nv()];
        seen[0] = true;
        let mut queue = VecDeque::from([0usize]);
        let mut count = 1;
        while let Some(u) = queue.pop_front() {
            for e in self.neighbours(u) {
                if !seen[e.dst] {
                    seen[e.dst] = true;
                    count += 1;
                    queue.push_back(e.dst);
                }
            }
        }
        count == self.nv()
    }

    /// Rebuilds the graph with vertex `i` renamed to `map[i]`.
    pub fn relabel(&self, map: &[usize]) -> Self {
        assert_eq!(map.len(), self.nv());
        let mut out = Self::new(self.nv());
        for (src, dst, ofs) in self.edges() {
            out.add_edge(map[src], map[dst], ofs);
        }
        out
    }
}

enum Shelled {
    Dense(Vec<bool>, i64, i64, usize),
    Sparse(HashSet<(usize, [i64; 3])>),
}

impl Shelled {
    fn insert(&mut self, v: usize, ofs: IVec) -> bool {
        match self {
            Shelled::Dense(grid, reach, side, n) => {
                let (r, s) = (*reach, *side);
                debug_assert!(ofs.iter().all(|c| c.abs() <= r));
                let idx = (((ofs.x + r) * s + (ofs.y + r)) * s + (ofs.z + r)) as usize * *n + v;
                let fresh = !grid[idx];
                grid[idx] = true;
                fresh
            }
            Shelled::Sparse(set) => set.insert((v, [ofs.x, ofs.y, ofs.z])),
        }
    }
}

impl FromStr for PeriodicGraph3D {
    type Err = ParseNetError;

    /// Parses the whitespace-separated form `"3 s1 d1 ox oy oz s2 d2 ..."`
    /// with 1-based vertex numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let dim = tokens.next().ok_or(ParseNetError::Empty)?;
        if dim != "3" {
            return Err(ParseNetError::Dimension(dim.to_string()));
        }
        let mut records: Vec<(usize, usize, IVec)> = Vec::new();
        let mut nmax = 0usize;
        loop {
            let Some(first) = tokens.next() else { break };
            let take = |tok: Option<&str>| -> Result<i64, ParseNetError> {
                let tok = tok.ok_or(ParseNetError::Truncated)?;
                tok.parse::<i64>()
                    .map_err(|_| ParseNetError::Token(tok.to_string()))
            };
            let src = take(Some(first))?;
            let dst = take(tokens.next())?;
            let ox = take(tokens.next())?;
            let oy = take(tokens.next())?;
            let oz = take(tokens.next())?;
            if src <= 0 || dst <= 0 {
                return Err(ParseNetError::VertexZero);
            }
            let (src, dst) = (src as usize - 1, dst as usize - 1);
            nmax = nmax.max(src + 1).max(dst + 1);
            records.push((src, dst, Vector3::new(ox, oy, oz)));
        }
        let mut graph = PeriodicGraph3D::new(nmax);
        for (src, dst, ofs) in records {
            if src == dst && ofs == Vector3::zeros() {
                return Err(ParseNetError::ZeroLoop(src + 1));
            }
            if !graph.add_edge(src, dst, ofs) {
                return Err(ParseNetError::Duplicate(
                    src + 1,
                    dst + 1,
                    ofs.x,
                    ofs.y,
                    ofs.z,
                ));
            }
        }
        Ok(graph)
    }
}

impl fmt::Display for PeriodicGraph3D {
    /// Serializes the canonical directed representatives sorted by
    /// `(src, dst, ofs)`. The genome driver serializes its own edge order;
    /// this form is for diagnostics and stable round-trips of plain graphs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "3")?;
        for (src, dst, ofs) in self.edges() {
            write!(f, " {} {} {} {} {}", src + 1, dst + 1, ofs.x, ofs.y, ofs.z)?;
        }
        Ok(())
    }
}
