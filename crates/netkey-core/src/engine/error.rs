use crate::core::graph::ParseNetError;
use crate::core::models::cell::SingularCellError;
use crate::core::models::net::NetError;
use num_bigint::BigInt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenomeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("two vertices share an equilibrium position, the net is unstable")]
    UnstableNet,

    #[error("edge vectors only span a lattice of rank {rank}, not 3")]
    NotThreeDimensional { rank: usize },

    #[error("position denominator {denom} exceeds the configured maximum {max}")]
    WidthOverflow { denom: BigInt, max: BigInt },

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl From<ParseNetError> for GenomeError {
    fn from(e: ParseNetError) -> Self {
        GenomeError::InvalidInput(e.to_string())
    }
}

impl From<NetError> for GenomeError {
    fn from(e: NetError) -> Self {
        GenomeError::InvalidInput(e.to_string())
    }
}

impl From<SingularCellError> for GenomeError {
    fn from(e: SingularCellError) -> Self {
        GenomeError::InvalidInput(e.to_string())
    }
}
