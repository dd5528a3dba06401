use crate::logging::LogOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const ABOUT: &str = "netkey - computes canonical topological genomes of 3-periodic crystal nets and recognizes them against archives of named topologies.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(version, about = ABOUT, help_template = HELP_TEMPLATE)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub log: LogOptions,

    /// Cap the worker pool at this many threads; every logical core
    /// otherwise
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the topological genome of crystal nets and look them up.
    Analyze(AnalyzeArgs),
    /// Create or delete topology archives.
    Archive(ArchiveArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input files, each holding one periodic net string
    /// ("3 s1 d1 ox oy oz s2 d2 ...").
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Archive file or directory for the lookup. Defaults to the built-in
    /// seed archive.
    #[arg(short, long, value_name = "PATH")]
    pub archive: Option<PathBuf>,

    /// Skip the primitive-cell reduction.
    #[arg(long)]
    pub no_minimize: bool,

    /// Record the computed genome in the archive under this name.
    #[arg(long, value_name = "NAME", conflicts_with = "remove")]
    pub update: Option<String>,

    /// Remove the computed genome from the archive.
    #[arg(long)]
    pub remove: bool,

    /// Accept archives written by other netkey versions.
    #[arg(long)]
    pub force: bool,

    /// Vertex clustering mode: input, each-atom, mof, guess or auto.
    #[arg(long, default_value = "auto", value_name = "MODE")]
    pub clustering: String,

    /// Bond detection mode: input, external or auto.
    #[arg(long, default_value = "auto", value_name = "MODE")]
    pub bonding: String,
}

/// Arguments for the `archive` subcommand.
#[derive(Args, Debug)]
pub struct ArchiveArgs {
    #[command(subcommand)]
    pub command: ArchiveCommands,
}

/// Available archive management commands.
#[derive(Subcommand, Debug)]
pub enum ArchiveCommands {
    /// Write a new archive seeded from a built-in one.
    Create {
        /// Destination path for the new archive.
        #[arg(required = true, value_name = "PATH")]
        path: PathBuf,

        /// Name of the built-in archive to copy.
        #[arg(long, default_value = "seed", value_name = "NAME")]
        builtin: String,

        /// Overwrite an existing archive.
        #[arg(long)]
        force: bool,
    },
    /// Delete an archive file.
    Delete {
        /// Path of the archive to remove.
        #[arg(required = true, value_name = "PATH")]
        path: PathBuf,
    },
}
