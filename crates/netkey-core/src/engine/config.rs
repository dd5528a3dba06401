use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How atoms of the source crystal are grouped into net vertices.
///
/// The grouping itself is performed by input collaborators; the mode travels
/// through the pipeline as configuration so re-attempts can switch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringMode {
    /// Take vertex groups exactly as given by the input file.
    Input,
    /// One vertex per atom.
    EachAtom,
    /// Collapse recognized building units as appropriate for MOFs.
    Mof,
    /// Guess building units from connectivity.
    Guess,
    /// Pick a strategy from the input kind.
    #[default]
    Auto,
}

/// Error type for failed parsing of a clustering mode string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid clustering mode")]
pub struct ParseClusteringModeError;

impl FromStr for ClusteringMode {
    type Err = ParseClusteringModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "each-atom" | "eachatom" | "atom" => Ok(Self::EachAtom),
            "mof" => Ok(Self::Mof),
            "guess" => Ok(Self::Guess),
            "auto" => Ok(Self::Auto),
            _ => Err(ParseClusteringModeError),
        }
    }
}

impl fmt::Display for ClusteringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::EachAtom => "each-atom",
            Self::Mof => "mof",
            Self::Guess => "guess",
            Self::Auto => "auto",
        })
    }
}

/// Where bonds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BondingMode {
    /// Bonds exactly as given by the input file.
    Input,
    /// Bonds supplied by an external detection step.
    External,
    /// Use input bonds when present, detect otherwise.
    #[default]
    Auto,
}

/// Error type for failed parsing of a bonding mode string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid bonding mode")]
pub struct ParseBondingModeError;

impl FromStr for BondingMode {
    type Err = ParseBondingModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "external" => Ok(Self::External),
            "auto" => Ok(Self::Auto),
            _ => Err(ParseBondingModeError),
        }
    }
}

impl fmt::Display for BondingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::External => "external",
            Self::Auto => "auto",
        })
    }
}

/// Explicit configuration context threaded through the genome pipeline.
///
/// There is deliberately no process-wide state: every entry point takes an
/// `Options` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub clustering: ClusteringMode,
    pub bonding: BondingMode,
    /// Reduce to the translational primitive cell before the key search.
    pub minimize: bool,
    /// Shell depth of the coordination sequences used for partitioning.
    pub cseq_depth: usize,
    /// Refuse positions whose denominators grow beyond this bound.
    pub max_denominator: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            clustering: ClusteringMode::default(),
            bonding: BondingMode::default(),
            minimize: true,
            cseq_depth: 10,
            max_denominator: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clustering_mode_from_str_parses_valid_strings() {
        assert_eq!("input".parse(), Ok(ClusteringMode::Input));
        assert_eq!("each-atom".parse(), Ok(ClusteringMode::EachAtom));
        assert_eq!("MOF".parse(), Ok(ClusteringMode::Mof));
        assert_eq!("guess".parse(), Ok(ClusteringMode::Guess));
        assert_eq!("auto".parse(), Ok(ClusteringMode::Auto));
        assert!("cluster".parse::<ClusteringMode>().is_err());
    }

    #[test]
    fn bonding_mode_from_str_parses_valid_strings() {
        assert_eq!("input".parse(), Ok(BondingMode::Input));
        assert_eq!("external".parse(), Ok(BondingMode::External));
        assert_eq!("Auto".parse(), Ok(BondingMode::Auto));
        assert!("".parse::<BondingMode>().is_err());
    }

    #[test]
    fn default_options_minimize_at_depth_ten() {
        let opts = Options::default();
        assert!(opts.minimize);
        assert_eq!(opts.cseq_depth, 10);
        assert_eq!(opts.max_denominator, None);
    }
}
