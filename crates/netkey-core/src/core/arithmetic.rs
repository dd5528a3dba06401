//! Exact arithmetic primitives shared by the whole engine.
//!
//! Positions and basis matrices are arbitrary-precision rationals
//! (`Ratio<BigInt>`); lattice offsets are `i64` vectors. Repeated basis
//! changes widen denominators, so nothing here ever rounds.

use nalgebra::{Matrix3, Vector3};
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::Ratio;
use num_traits::{One, Signed, Zero};
use std::cmp::Ordering;

/// Exact rational scalar used for positions and candidate bases.
pub type Rat = Ratio<BigInt>;
/// Rational 3-vector.
pub type RVec = Vector3<Rat>;
/// Rational 3×3 matrix, columns are basis vectors.
pub type RMat = Matrix3<Rat>;
/// Integer lattice offset.
pub type IVec = Vector3<i64>;
/// Integer 3×3 matrix.
pub type IMat = Matrix3<i64>;

pub fn rat(n: i64) -> Rat {
    Ratio::from_integer(BigInt::from(n))
}

pub fn ratio(num: i64, den: i64) -> Rat {
    Ratio::new(BigInt::from(num), BigInt::from(den))
}

pub fn rvec_zero() -> RVec {
    Vector3::new(Rat::zero(), Rat::zero(), Rat::zero())
}

pub fn rvec(x: Rat, y: Rat, z: Rat) -> RVec {
    Vector3::new(x, y, z)
}

pub fn rvec_of(ofs: &IVec) -> RVec {
    Vector3::new(rat(ofs.x), rat(ofs.y), rat(ofs.z))
}

/// Exact conversion back to an integer vector; `None` when any coordinate
/// has a non-unit denominator or exceeds `i64`.
pub fn rvec_to_ivec(v: &RVec) -> Option<IVec> {
    let mut out = [0i64; 3];
    for (i, c) in v.iter().enumerate() {
        if !c.denom().is_one() {
            return None;
        }
        out[i] = i64::try_from(c.numer().clone()).ok()?;
    }
    Some(Vector3::new(out[0], out[1], out[2]))
}

pub fn rvec_add(a: &RVec, b: &RVec) -> RVec {
    Vector3::new(&a.x + &b.x, &a.y + &b.y, &a.z + &b.z)
}

pub fn rvec_sub(a: &RVec, b: &RVec) -> RVec {
    Vector3::new(&a.x - &b.x, &a.y - &b.y, &a.z - &b.z)
}

pub fn rvec_scale(a: &RVec, s: &Rat) -> RVec {
    Vector3::new(&a.x * s, &a.y * s, &a.z * s)
}

pub fn rvec_neg(a: &RVec) -> RVec {
    Vector3::new(-a.x.clone(), -a.y.clone(), -a.z.clone())
}

pub fn cmp_rvec(a: &RVec, b: &RVec) -> Ordering {
    a.x.cmp(&b.x)
        .then_with(|| a.y.cmp(&b.y))
        .then_with(|| a.z.cmp(&b.z))
}

pub fn cmp_ivec(a: &IVec, b: &IVec) -> Ordering {
    a.x.cmp(&b.x)
        .then_with(|| a.y.cmp(&b.y))
        .then_with(|| a.z.cmp(&b.z))
}

/// First non-zero coordinate is strictly positive.
pub fn is_lex_positive(v: &RVec) -> bool {
    for c in v.iter() {
        match c.cmp(&Rat::zero()) {
            Ordering::Greater => return true,
            Ordering::Less => return false,
            Ordering::Equal => {}
        }
    }
    false
}

pub fn mat_vec(m: &RMat, v: &RVec) -> RVec {
    let mut out = rvec_zero();
    for i in 0..3 {
        let mut acc = Rat::zero();
        for j in 0..3 {
            acc += &m[(i, j)] * &v[j];
        }
        out[i] = acc;
    }
    out
}

pub fn mat_mul(a: &RMat, b: &RMat) -> RMat {
    let mut out = RMat::from_element(Rat::zero());
    for i in 0..3 {
        for j in 0..3 {
            let mut acc = Rat::zero();
            for k in 0..3 {
                acc += &a[(i, k)] * &b[(k, j)];
            }
            out[(i, j)] = acc;
        }
    }
    out
}

pub fn mat_from_columns(c0: &RVec, c1: &RVec, c2: &RVec) -> RMat {
    let mut m = RMat::from_element(Rat::zero());
    for i in 0..3 {
        m[(i, 0)] = c0[i].clone();
        m[(i, 1)] = c1[i].clone();
        m[(i, 2)] = c2[i].clone();
    }
    m
}

pub fn det3(m: &RMat) -> Rat {
    let a = &m[(0, 0)] * (&m[(1, 1)] * &m[(2, 2)] - &m[(1, 2)] * &m[(2, 1)]);
    let b = &m[(0, 1)] * (&m[(1, 0)] * &m[(2, 2)] - &m[(1, 2)] * &m[(2, 0)]);
    let c = &m[(0, 2)] * (&m[(1, 0)] * &m[(2, 1)] - &m[(1, 1)] * &m[(2, 0)]);
    a - b + c
}

pub fn det3_i(m: &IMat) -> i64 {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// Adjugate-based exact inverse; `None` on a singular matrix.
pub fn inv3(m: &RMat) -> Option<RMat> {
    let det = det3(m);
    if det.is_zero() {
        return None;
    }
    let mut adj = RMat::from_element(Rat::zero());
    for i in 0..3 {
        for j in 0..3 {
            let (r0, r1) = match i {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            let (c0, c1) = match j {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            let minor = &m[(r0, c0)] * &m[(r1, c1)] - &m[(r0, c1)] * &m[(r1, c0)];
            let sign = if (i + j) % 2 == 0 {
                minor
            } else {
                -minor
            };
            // adjugate is the transposed cofactor matrix
            adj[(j, i)] = sign;
        }
    }
    for i in 0..3 {
        for j in 0..3 {
            let scaled = &adj[(i, j)] / &det;
            adj[(i, j)] = scaled;
        }
    }
    Some(adj)
}

pub fn rmat_of(m: &IMat) -> RMat {
    let mut out = RMat::from_element(Rat::zero());
    for i in 0..3 {
        for j in 0..3 {
            out[(i, j)] = rat(m[(i, j)]);
        }
    }
    out
}

/// Exact conversion to an integer matrix; `None` when any entry has a
/// non-unit denominator or exceeds `i64`.
pub fn rmat_to_imat(m: &RMat) -> Option<IMat> {
    let mut out = IMat::zeros();
    for i in 0..3 {
        for j in 0..3 {
            let c = &m[(i, j)];
            if !c.denom().is_one() {
                return None;
            }
            out[(i, j)] = i64::try_from(c.numer().clone()).ok()?;
        }
    }
    Some(out)
}

/// Least common multiple of every coordinate denominator.
pub fn common_denominator<'a>(vecs: impl IntoIterator<Item = &'a RVec>) -> BigInt {
    let mut l = BigInt::one();
    for v in vecs {
        for c in v.iter() {
            l = l.lcm(c.denom());
        }
    }
    l
}

/// Integer 3-vector with arbitrary precision, used while building offset
/// lattice bases.
pub type BVec = [BigInt; 3];

pub fn bvec_is_zero(v: &BVec) -> bool {
    v.iter().all(|c| c.is_zero())
}

/// Row-style Hermite normal form of the lattice generated by `rows`.
///
/// Returns the non-zero echelon rows: pivots positive, entries above a pivot
/// reduced into `[0, pivot)`. The result is a canonical basis of the
/// generated lattice (at most three rows).
pub fn hnf_rows(rows: &[BVec]) -> Vec<BVec> {
    let mut m: Vec<BVec> = rows.iter().filter(|r| !bvec_is_zero(r)).cloned().collect();
    let mut basis: Vec<BVec> = Vec::new();
    let mut col = 0usize;
    while col < 3 && !m.is_empty() {
        // combine rows until a single one carries this column
        loop {
            let mut nz: Vec<usize> = (0..m.len()).filter(|&i| !m[i][col].is_zero()).collect();
            if nz.len() <= 1 {
                break;
            }
            nz.sort_by(|&a, &b| m[a][col].abs().cmp(&m[b][col].abs()));
            let (small, big) = (nz[0], nz[1]);
            let q = &m[big][col] / &m[small][col];
            for k in 0..3 {
                let next = &m[big][k] - &q * &m[small][k];
                m[big][k] = next;
            }
            if bvec_is_zero(&m[big]) {
                m.remove(big);
            }
        }
        if let Some(i) = (0..m.len()).find(|&i| !m[i][col].is_zero()) {
            let mut pivot = m.remove(i);
            if pivot[col].is_negative() {
                for c in pivot.iter_mut() {
                    *c = -std::mem::take(c);
                }
            }
            // reduce earlier basis rows against the new pivot
            for row in basis.iter_mut() {
                let q = row[col].div_floor(&pivot[col]);
                if !q.is_zero() {
                    for k in 0..3 {
                        let next = &row[k] - &q * &pivot[k];
                        row[k] = next;
                    }
                }
            }
            basis.push(pivot);
        }
        col += 1;
    }
    basis
}

/// Expresses `v` in the echelon basis returned by [`hnf_rows`].
///
/// `None` when `v` is not in the generated lattice.
pub fn hnf_express(basis: &[BVec], v: &BVec) -> Option<Vec<BigInt>> {
    let mut rem = v.clone();
    let mut coords = Vec::with_capacity(basis.len());
    for b in basis {
        let col = (0..3).find(|&c| !b[c].is_zero()).expect("zero basis row");
        let (q, r) = rem[col].div_rem(&b[col]);
        if !r.is_zero() {
            return None;
        }
        for k in 0..3 {
            let next = &rem[k] - &q * &b[k];
            rem[k] = next;
        }
        coords.push(q);
    }
    if bvec_is_zero(&rem) {
        Some(coords)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(x: i64, y: i64, z: i64) -> BVec {
        [BigInt::from(x), BigInt::from(y), BigInt::from(z)]
    }

    #[test]
    fn inverse_roundtrips() {
        let m = mat_from_columns(
            &rvec(ratio(1, 4), ratio(1, 4), ratio(1, 4)),
            &rvec(ratio(5, 4), ratio(1, 4), ratio(1, 4)),
            &rvec(ratio(1, 4), ratio(5, 4), ratio(1, 4)),
        );
        let inv = inv3(&m).unwrap();
        let id = mat_mul(&m, &inv);
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { Rat::one() } else { Rat::zero() };
                assert_eq!(id[(i, j)], expect);
            }
        }
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = mat_from_columns(
            &rvec(rat(1), rat(0), rat(0)),
            &rvec(rat(2), rat(0), rat(0)),
            &rvec(rat(0), rat(0), rat(1)),
        );
        assert!(inv3(&m).is_none());
    }

    #[test]
    fn lex_comparison_orders_coordinates_in_sequence() {
        let a = rvec(rat(0), rat(1), rat(-5));
        let b = rvec(rat(0), rat(1), rat(-4));
        assert_eq!(cmp_rvec(&a, &b), Ordering::Less);
        assert!(is_lex_positive(&rvec(rat(0), ratio(1, 7), rat(-3))));
        assert!(!is_lex_positive(&rvec(rat(0), rat(0), rat(0))));
        assert!(!is_lex_positive(&rvec(rat(0), ratio(-1, 2), rat(9))));
    }

    #[test]
    fn hnf_of_axis_vectors_is_identity() {
        let basis = hnf_rows(&[bv(1, 0, 0), bv(0, 1, 0), bv(0, 0, 1)]);
        assert_eq!(basis, vec![bv(1, 0, 0), bv(0, 1, 0), bv(0, 0, 1)]);
    }

    #[test]
    fn hnf_detects_sublattice_membership() {
        let basis = hnf_rows(&[bv(2, 0, 0), bv(0, 3, 0), bv(0, 0, 1)]);
        assert!(hnf_express(&basis, &bv(4, 3, 5)).is_some());
        assert!(hnf_express(&basis, &bv(1, 0, 0)).is_none());
        assert!(hnf_express(&basis, &bv(0, 2, 0)).is_none());
    }

    #[test]
    fn hnf_rank_deficient_input_keeps_rank() {
        let basis = hnf_rows(&[bv(1, 1, 0), bv(2, 2, 0), bv(-3, -3, 0)]);
        assert_eq!(basis.len(), 1);
        assert_eq!(basis[0], bv(1, 1, 0));
    }

    #[test]
    fn common_denominator_takes_lcm() {
        let a = rvec(ratio(1, 4), rat(0), ratio(1, 6));
        let b = rvec(ratio(1, 7), rat(1), rat(0));
        assert_eq!(common_denominator([&a, &b]), BigInt::from(84));
    }
}
