use crate::core::arithmetic::{det3, mat_mul, rat, RMat, Rat};
use num_traits::Zero;
use thiserror::Error;

/// Error type for an invalid unit cell.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cell matrix is singular")]
pub struct SingularCellError;

/// Unit cell of a crystal: a 3×3 matrix of exact rationals whose columns
/// are the Cartesian directions of the three lattice vectors.
///
/// The determinant is non-zero by construction. The only mutation a cell
/// ever undergoes is a basis change, which multiplies on the right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    mat: RMat,
}

impl Cell {
    /// Creates a cell from its lattice matrix.
    ///
    /// # Errors
    ///
    /// Returns [`SingularCellError`] when the matrix has zero determinant.
    pub fn new(mat: RMat) -> Result<Self, SingularCellError> {
        if det3(&mat).is_zero() {
            return Err(SingularCellError);
        }
        Ok(Self { mat })
    }

    /// The canonical reference cell with unit lattice vectors.
    pub fn reference() -> Self {
        let mut mat = RMat::from_element(Rat::zero());
        for i in 0..3 {
            mat[(i, i)] = rat(1);
        }
        Self { mat }
    }

    pub fn matrix(&self) -> &RMat {
        &self.mat
    }

    pub fn det(&self) -> Rat {
        det3(&self.mat)
    }

    /// Basis change: the new cell is `self.mat · m`.
    pub fn rebased(&self, m: &RMat) -> Result<Self, SingularCellError> {
        Self::new(mat_mul(&self.mat, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arithmetic::{mat_from_columns, ratio, rvec};

    #[test]
    fn reference_cell_has_unit_volume() {
        assert_eq!(Cell::reference().det(), rat(1));
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let mat = mat_from_columns(
            &rvec(rat(1), rat(0), rat(0)),
            &rvec(rat(1), rat(0), rat(0)),
            &rvec(rat(0), rat(0), rat(1)),
        );
        assert_eq!(Cell::new(mat), Err(SingularCellError));
    }

    #[test]
    fn rebase_multiplies_the_determinant() {
        let m = mat_from_columns(
            &rvec(ratio(1, 2), rat(0), rat(0)),
            &rvec(rat(0), rat(1), rat(0)),
            &rvec(rat(0), rat(0), rat(1)),
        );
        let cell = Cell::reference().rebased(&m).unwrap();
        assert_eq!(cell.det(), ratio(1, 2));
    }
}
