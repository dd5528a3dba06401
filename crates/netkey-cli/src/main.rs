mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use cli::{ArchiveCommands, Cli, Commands};
use tracing::{error, warn};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(2);
    }

    if let Some(threads) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            warn!("could not configure the thread pool: {e}");
        }
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> error::Result<i32> {
    match cli.command {
        Commands::Analyze(args) => {
            let all_known = commands::analyze::run(args)?;
            Ok(if all_known { 0 } else { 1 })
        }
        Commands::Archive(args) => {
            match args.command {
                ArchiveCommands::Create {
                    path,
                    builtin,
                    force,
                } => commands::archive::create(&path, &builtin, force)?,
                ArchiveCommands::Delete { path } => commands::archive::delete(&path)?,
            }
            Ok(0)
        }
    }
}
