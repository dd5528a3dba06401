use crate::error::Result;
use clap::{ArgAction, Args};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Log routing flags, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct LogOptions {
    /// Raise console verbosity; repeat for more detail (info, debug, trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Keep the console to errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Mirror a full debug log into this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Console levels indexed by the number of `-v` flags.
const VERBOSITY: [LevelFilter; 4] = [
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

fn console_level(opts: &LogOptions) -> LevelFilter {
    if opts.quiet {
        LevelFilter::ERROR
    } else {
        VERBOSITY[usize::from(opts.verbose).min(VERBOSITY.len() - 1)]
    }
}

/// Installs the global subscriber: a terse stderr console at the level the
/// flags ask for, plus an unabridged debug mirror into `--log-file` when
/// one is given. The two sinks are filtered independently, so a quiet
/// console still leaves a complete file trail.
pub fn init(opts: &LogOptions) -> Result<()> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .with_filter(console_level(opts));

    let mirror = match &opts.log_file {
        Some(path) => {
            let sink = File::create(path)?;
            let layer = fmt::layer()
                .with_writer(sink)
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG);
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(mirror)
        .with(console)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, trace};

    fn opts(verbose: u8, quiet: bool) -> LogOptions {
        LogOptions {
            verbose,
            quiet,
            log_file: None,
        }
    }

    #[test]
    fn verbosity_flags_map_to_console_levels() {
        assert_eq!(console_level(&opts(0, false)), LevelFilter::WARN);
        assert_eq!(console_level(&opts(1, false)), LevelFilter::INFO);
        assert_eq!(console_level(&opts(2, false)), LevelFilter::DEBUG);
        assert_eq!(console_level(&opts(3, false)), LevelFilter::TRACE);
        // extra flags saturate instead of wrapping
        assert_eq!(console_level(&opts(9, false)), LevelFilter::TRACE);
    }

    #[test]
    fn quiet_drops_everything_below_errors() {
        assert_eq!(console_level(&opts(0, true)), LevelFilter::ERROR);
    }

    #[test]
    fn the_file_mirror_records_debug_but_not_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.log");
        let sink = File::create(&path).unwrap();
        let layer = fmt::layer()
            .with_writer(sink)
            .with_ansi(false)
            .with_filter(LevelFilter::DEBUG);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!("kept for the mirror");
            trace!("dropped by the mirror");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("kept for the mirror"));
        assert!(!content.contains("dropped by the mirror"));
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut o = opts(1, false);
        o.log_file = Some(dir.path().join("no-such-dir").join("run.log"));
        assert!(matches!(init(&o), Err(crate::error::CliError::Io(_))));
    }

    #[test]
    fn init_installs_the_global_subscriber() {
        // the global default can only be set once per process, so this is
        // the single test that goes through init
        init(&opts(1, false)).unwrap();
        info!("console smoke message");
    }
}
