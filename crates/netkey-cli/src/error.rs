use netkey::core::graph::ParseNetError;
use netkey::core::io::archive::ArchiveError;
use netkey::engine::error::GenomeError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Genome(#[from] GenomeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("failed to parse '{path}': {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseNetError,
    },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code for this error: 2 unhandled, 3 internal invariant
    /// violation, 4 invalid input, 5 parse error. (0 is success and 1 an
    /// unknown genome, neither of which is an error.)
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Parse { .. } => 5,
            CliError::Archive(ArchiveError::Malformed { .. }) => 5,
            CliError::Genome(GenomeError::Internal(_)) => 3,
            CliError::Genome(_) => 4,
            CliError::Archive(ArchiveError::VersionMismatch { .. }) => 4,
            CliError::Argument(_) => 4,
            CliError::Archive(ArchiveError::Io(_)) => 2,
            CliError::Io(_) => 2,
            CliError::Other(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_interface_contract() {
        let parse = CliError::Parse {
            path: PathBuf::from("x"),
            source: ParseNetError::Truncated,
        };
        assert_eq!(parse.exit_code(), 5);
        assert_eq!(CliError::Genome(GenomeError::UnstableNet).exit_code(), 4);
        assert_eq!(
            CliError::Genome(GenomeError::NotThreeDimensional { rank: 2 }).exit_code(),
            4
        );
        assert_eq!(
            CliError::Genome(GenomeError::Internal("bug".into())).exit_code(),
            3
        );
        assert_eq!(CliError::Argument("bad".into()).exit_code(), 4);
        assert_eq!(
            CliError::Io(std::io::Error::other("io")).exit_code(),
            2
        );
    }
}
