use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use netkey::core::graph::PeriodicGraph3D;
use netkey::core::io::archive::Archive;
use netkey::engine::config::{BondingMode, ClusteringMode, Options};
use netkey::workflows::genome::genome_of_graph;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Runs the analysis over every input file. Returns `true` when every
/// genome was found in the archive.
pub fn run(args: AnalyzeArgs) -> Result<bool> {
    let options = options_from(&args)?;

    if (args.update.is_some() || args.remove) && args.archive.is_none() {
        return Err(CliError::Argument(
            "--update and --remove need --archive to point at a writable archive".into(),
        ));
    }

    let mut archive = load_archive(&args)?;
    info!(entries = archive.len(), "archive ready");

    let bar = (args.inputs.len() > 1).then(|| {
        let bar = ProgressBar::new(args.inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .expect("valid progress template"),
        );
        bar
    });
    let say = |line: String| match &bar {
        Some(bar) => bar.println(line),
        None => println!("{line}"),
    };

    let mut all_known = true;
    let mut dirty = false;
    for path in &args.inputs {
        if let Some(bar) = &bar {
            bar.set_message(path.display().to_string());
        }
        let graph = read_net(path)?;
        debug!(path = %path.display(), vertices = graph.nv(), "input parsed");
        let genome = genome_of_graph(graph, &options)?;

        match archive.lookup(&genome) {
            Some(name) => say(format!("{}: {}", path.display(), name)),
            None => {
                all_known = false;
                say(format!("{}: UNKNOWN", path.display()));
                say(format!("  genome: {genome}"));
            }
        }

        if let Some(name) = &args.update {
            if archive.add(&genome, name).as_deref() != Some(name.as_str()) {
                dirty = true;
            }
        } else if args.remove && archive.remove(&genome).is_some() {
            dirty = true;
        }
        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if dirty {
        let path = args.archive.as_deref().expect("checked above");
        archive.save(path)?;
        println!("archive updated: {}", path.display());
    }
    Ok(all_known)
}

fn options_from(args: &AnalyzeArgs) -> Result<Options> {
    let clustering: ClusteringMode = args
        .clustering
        .parse()
        .map_err(|_| CliError::Argument(format!("invalid clustering mode {:?}", args.clustering)))?;
    let bonding: BondingMode = args
        .bonding
        .parse()
        .map_err(|_| CliError::Argument(format!("invalid bonding mode {:?}", args.bonding)))?;
    Ok(Options {
        clustering,
        bonding,
        minimize: !args.no_minimize,
        ..Options::default()
    })
}

fn load_archive(args: &AnalyzeArgs) -> Result<Archive> {
    match &args.archive {
        Some(path) if path.exists() => Ok(Archive::load(path, args.force)?),
        Some(path) => {
            if args.update.is_some() {
                info!(path = %path.display(), "archive does not exist yet, starting empty");
                Ok(Archive::new())
            } else {
                Err(CliError::Argument(format!(
                    "no archive at {}",
                    path.display()
                )))
            }
        }
        None => Ok(Archive::builtin("seed").expect("the seed archive is built in")),
    }
}

fn read_net(path: &Path) -> Result<PeriodicGraph3D> {
    let text = fs::read_to_string(path)?;
    text.trim().parse().map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
