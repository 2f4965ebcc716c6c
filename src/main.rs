use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coracle_host::registry::{MANIFEST_FILE, PluginCatalog};
use coracle_host::{Config, bridge};

/// Coracle host - inspect and validate plugin bundles
#[derive(Parser)]
#[command(name = "coracle-host", version, about)]
struct Cli {
    /// Plugins root directory (default: from config / `~/.coracle/plugins`)
    #[arg(short, long, env = "CORACLE_PLUGINS_ROOT")]
    root: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the plugins root and list the resulting catalog
    List,
    /// List plugins that declare a given hook, in catalog order
    Hooks {
        /// Hook name (e.g. "pageLoad")
        name: String,
    },
    /// Scan and report per-bundle problems instead of skipping silently
    Validate,
    /// Print the capability stub injected into every surface
    Stub,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "coracle_host=warn",
        1 => "coracle_host=info",
        2 => "coracle_host=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => Config::load()?.plugins_root,
    };

    match &cli.command {
        Command::List => {
            let catalog = PluginCatalog::scan(&root)?;
            if catalog.is_empty() {
                println!("no plugins in {}", root.display());
                return Ok(());
            }
            for record in catalog.records() {
                let script = if record.script.is_some() {
                    "ok"
                } else {
                    "missing script"
                };
                println!(
                    "{} v{} [{script}] {}",
                    record.manifest.name,
                    record.manifest.version,
                    record.path.display(),
                );
            }
        }
        Command::Hooks { name } => {
            let catalog = PluginCatalog::scan(&root)?;
            for record in catalog.hooks_for(name) {
                println!("{}", record.manifest.name);
            }
        }
        Command::Validate => validate(&root)?,
        Command::Stub => print!("{}", bridge::capability_stub()),
    }

    Ok(())
}

/// Re-check every bundle and print what a scan would have skipped
fn validate(root: &Path) -> anyhow::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(root)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    let mut problems = 0u32;
    for dir in &entries {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            println!("{}: no {MANIFEST_FILE}", dir.display());
            problems += 1;
            continue;
        }
        let raw = std::fs::read_to_string(&manifest_path)?;
        match serde_json::from_str::<coracle_host::PluginManifest>(&raw) {
            Err(e) => {
                println!("{}: invalid manifest: {e}", dir.display());
                problems += 1;
            }
            Ok(manifest) if !manifest.is_valid() => {
                println!("{}: blank name or main", dir.display());
                problems += 1;
            }
            Ok(manifest) => {
                if !dir.join(manifest.main.trim()).is_file() {
                    println!("{}: main script {} not found", dir.display(), manifest.main);
                    problems += 1;
                }
            }
        }
    }

    if problems == 0 {
        println!("{} bundles ok", entries.len());
        Ok(())
    } else {
        anyhow::bail!("{problems} problem(s) found")
    }
}
