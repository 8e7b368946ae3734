use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use config_tree_core::{Attributes, DirectiveOptions, SchemaNode, Value};
use config_tree_loader::{FileSourceExt, dump_yaml, load_tree};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for whole trees.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Yaml,
    Json,
    Tree,
}

#[derive(Debug, Parser)]
#[command(name = "config-tree")]
#[command(about = "Inspect and overlay typed configuration files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a tree from a file, apply overlays and directives, and print it.
    Show(ShowArgs),
    /// Print the inferred type of every entry.
    Types(TypesArgs),
    /// Print a single value by dotted path.
    Get(GetArgs),
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Configuration file (YAML, or JSON by extension).
    file: PathBuf,
    /// Files deep-merged on top of the first one, in order.
    #[arg(long = "overlay")]
    overlays: Vec<PathBuf>,
    /// Let containers accept keys the base file does not declare.
    #[arg(long)]
    writable: bool,
    /// Freeze the tree after applying overlays and directives.
    #[arg(long)]
    freeze: bool,
    /// Output format.
    #[arg(long, default_value = "yaml")]
    format: CliOutputFormat,
    /// `path value` directive pairs, e.g. `-- model.depth 24 tags+ new`.
    #[arg(last = true)]
    remainder: Vec<String>,
}

#[derive(Debug, Args)]
struct TypesArgs {
    /// Configuration file.
    file: PathBuf,
}

#[derive(Debug, Args)]
struct GetArgs {
    /// Configuration file.
    file: PathBuf,
    /// Dotted path of the entry, e.g. `model.depth`.
    path: String,
    /// `path value` directive pairs applied before the lookup.
    #[arg(last = true)]
    remainder: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Show(args) => run_show(args),
        Command::Types(args) => run_types(args),
        Command::Get(args) => run_get(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load(file: &Path, attributes: Attributes) -> Result<SchemaNode, String> {
    load_tree(file, attributes).map_err(|err| format!("failed to load '{}': {err}", file.display()))
}

fn apply_remainder(tree: &mut SchemaNode, remainder: &[String]) -> Result<(), String> {
    if remainder.is_empty() {
        return Ok(());
    }
    debug!(pairs = remainder.len() / 2, "applying remainder directives");
    tree.merge_from_remainder(remainder, DirectiveOptions::default())
        .map_err(|err| format!("failed to apply directives: {err}"))?;
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<(), String> {
    let attributes = if args.writable {
        Attributes::writable()
    } else {
        Attributes::default()
    };
    let mut tree = load(&args.file, attributes)?;

    for overlay in &args.overlays {
        tree.merge_from_file(overlay)
            .map_err(|err| format!("failed to merge '{}': {err}", overlay.display()))?;
    }
    apply_remainder(&mut tree, &args.remainder)?;
    if args.freeze {
        tree.freeze().map_err(|err| format!("failed to freeze: {err}"))?;
    }

    let mut stdout = std::io::stdout().lock();
    match args.format {
        CliOutputFormat::Yaml => tree
            .dump(&mut stdout)
            .map_err(|err| format!("failed to write YAML: {err}"))?,
        CliOutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, &tree.value_of_subtree())
                .map_err(|err| format!("failed to write JSON: {err}"))?;
            writeln!(stdout).map_err(|err| err.to_string())?;
        }
        CliOutputFormat::Tree => write!(stdout, "{tree}").map_err(|err| err.to_string())?,
    }
    Ok(())
}

fn run_types(args: TypesArgs) -> Result<(), String> {
    let tree = load(&args.file, Attributes::default())?;
    let types = serde_yaml::to_string(&tree.type_of_subtree())
        .map_err(|err| format!("failed to write YAML: {err}"))?;
    print!("{types}");
    Ok(())
}

fn run_get(args: GetArgs) -> Result<(), String> {
    let mut tree = load(&args.file, Attributes::default())?;
    apply_remainder(&mut tree, &args.remainder)?;

    let value = tree
        .lookup(&args.path)
        .map_err(|err| format!("cannot resolve '{}': {err}", args.path))?
        .to_value();
    match value {
        Value::Str(text) => println!("{text}"),
        Value::Map(_) => dump_yaml(&value, std::io::stdout().lock())
            .map_err(|err| format!("failed to write YAML: {err}"))?,
        other => println!(
            "{}",
            serde_json::to_string(&other).map_err(|err| err.to_string())?
        ),
    }
    Ok(())
}
