//! Normalization of the winning edge list to integer offsets.
//!
//! The offsets emitted by the key search are exact rationals in the
//! candidate basis. This stage computes a canonical basis of the lattice
//! they generate and rewrites every offset as a short integer vector in it.

use crate::core::arithmetic::{
    cmp_rvec, common_denominator, det3, hnf_express, hnf_rows, inv3, is_lex_positive,
    mat_from_columns, mat_vec, rvec_neg, rvec_to_ivec, BVec, IVec, RMat, RVec, Rat,
};
use crate::engine::error::GenomeError;
use crate::engine::key::KeyEdge;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Canonical integer edge of the final genome.
pub type GenomeEdge = (usize, usize, IVec);

fn scale_to_integer(v: &RVec, l: &BigInt) -> BVec {
    let l = Rat::from_integer(l.clone());
    [
        (&v[0] * &l).to_integer(),
        (&v[1] * &l).to_integer(),
        (&v[2] * &l).to_integer(),
    ]
}

/// Computes the offset-lattice basis of the minimal edge list and rewrites
/// the edges in it.
///
/// Offsets are sign-normalized, deduplicated and scanned in descending
/// order; the first triple that spans the whole offset lattice becomes the
/// basis (the lattice's Hermite normal form completes it when no offset
/// triple does). The determinant is made positive by negating the last
/// basis vector.
///
/// # Errors
///
/// Returns [`GenomeError::NotThreeDimensional`] when the offsets span less
/// than three dimensions.
pub fn find_basis(edges: &[KeyEdge]) -> Result<(RMat, Vec<GenomeEdge>), GenomeError> {
    let mut offsets: Vec<RVec> = Vec::new();
    for e in edges {
        if e.ofs.iter().all(|c| c.is_zero()) {
            continue;
        }
        let norm = if is_lex_positive(&e.ofs) {
            e.ofs.clone()
        } else {
            rvec_neg(&e.ofs)
        };
        offsets.push(norm);
    }
    offsets.sort_by(|a, b| cmp_rvec(b, a));
    offsets.dedup();
    if offsets.is_empty() {
        return Err(GenomeError::NotThreeDimensional { rank: 0 });
    }

    let l = common_denominator(offsets.iter());
    let scaled: Vec<BVec> = offsets.iter().map(|v| scale_to_integer(v, &l)).collect();
    let full = hnf_rows(&scaled);
    if full.len() < 3 {
        return Err(GenomeError::NotThreeDimensional { rank: full.len() });
    }

    // the largest offsets that span the whole lattice become the basis
    let spans = |i: usize, j: usize, k: usize| -> bool {
        let sub = hnf_rows(&[scaled[i].clone(), scaled[j].clone(), scaled[k].clone()]);
        sub.len() == 3 && scaled.iter().all(|o| hnf_express(&sub, o).is_some())
    };
    let mut chosen: Option<[RVec; 3]> = None;
    'outer: for i in 0..scaled.len() {
        for j in i + 1..scaled.len() {
            for k in j + 1..scaled.len() {
                if spans(i, j, k) {
                    chosen = Some([offsets[i].clone(), offsets[j].clone(), offsets[k].clone()]);
                    break 'outer;
                }
            }
        }
    }
    let cols = chosen.unwrap_or_else(|| {
        let back = |row: &BVec| -> RVec {
            RVec::from_iterator(row.iter().map(|c| Rat::new(c.clone(), l.clone())))
        };
        [back(&full[0]), back(&full[1]), back(&full[2])]
    });

    let mut basis = mat_from_columns(&cols[0], &cols[1], &cols[2]);
    if det3(&basis).is_negative() {
        basis = mat_from_columns(&cols[0], &cols[1], &rvec_neg(&cols[2]));
    }
    let inv = inv3(&basis)
        .ok_or_else(|| GenomeError::Internal("offset basis is singular".into()))?;

    let mut rewritten = Vec::with_capacity(edges.len());
    for e in edges {
        let o = rvec_to_ivec(&mat_vec(&inv, &e.ofs)).ok_or_else(|| {
            GenomeError::Internal("edge offset is not integral in the offset basis".into())
        })?;
        rewritten.push((e.src, e.dst, o));
    }
    Ok((basis, rewritten))
}
