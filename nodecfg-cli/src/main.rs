//! Command-line host for `nodecfg` configuration trees.
//!
//! Loads a schema and an optional saved configuration, then validates,
//! emits or inspects the resulting tree.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};
use nodecfg::{
    BuildOptions, ConfigContext, DisplayHint, NodeId, data::node::{NestedKind, NodeKind},
    options::DEFAULT_OPTIONS_FILE,
};

/// Build, check and write schema-driven configurations.
#[derive(Parser)]
#[command(name = "nodecfg", version, about, long_about = None)]
struct Cli {
    /// Build options file (defaults to `.nodecfg.toml` when present)
    #[arg(long, value_name = "FILE", global = true)]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a configuration and list invalid nodes
    Check(TreeArgs),
    /// Print or write the configuration document
    Emit {
        #[command(flatten)]
        tree: TreeArgs,
        /// Write to this file instead of stdout, backing up an existing one
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the configuration as JSON
    Json(TreeArgs),
    /// Print the node tree with display hints
    Tree(TreeArgs),
}

#[derive(Args)]
struct TreeArgs {
    /// Schema document
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,
    /// Saved configuration to seed values from
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options = load_options(cli.options.as_deref())?;
    let mut ctx = ConfigContext::new(options);

    match cli.command {
        Command::Check(args) => {
            let root = build(&mut ctx, &args)?;
            check(&ctx, root)
        }
        Command::Emit { tree, output } => {
            let root = build(&mut ctx, &tree)?;
            match output {
                Some(path) => ctx
                    .save(root, &path)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", ctx.emit(root, "")?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Json(args) => {
            let root = build(&mut ctx, &args)?;
            println!("{}", serde_json::to_string_pretty(&ctx.to_json(root)?)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Tree(args) => {
            let root = build(&mut ctx, &args)?;
            print_tree(&ctx, root)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_options(explicit: Option<&Path>) -> Result<BuildOptions> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_OPTIONS_FILE);
            if !default.exists() {
                return Ok(BuildOptions::default());
            }
            default
        }
    };
    debug!("using options from {}", path.display());
    BuildOptions::load(&path)
        .with_context(|| format!("failed to load options {}", path.display()))
}

fn build(ctx: &mut ConfigContext, args: &TreeArgs) -> Result<NodeId> {
    let root = ctx
        .load(&args.schema, args.config.as_ref())
        .with_context(|| format!("failed to build from {}", args.schema.display()))?;
    for position in ctx.skipped() {
        println!("{} {position}", "skipped".yellow());
    }
    Ok(root)
}

fn check(ctx: &ConfigContext, root: NodeId) -> Result<ExitCode> {
    let invalid = ctx.invalid_nodes(root)?;
    for id in &invalid {
        let node = ctx.node(*id)?;
        let detail = match node.kind() {
            NodeKind::Nested {
                kind: NestedKind::MultiValued { min_items },
                children,
            } => format!("{} item(s), at least {min_items} required", children.len()),
            NodeKind::Nested { .. } => format!("no element named {:?}", ctx.content(*id)?),
            _ => format!("{:?}", ctx.content(*id)?),
        };
        println!("{} {} = {detail}", "invalid".red().bold(), node.path());
    }

    if ctx.is_valid(root)? {
        info!("{}", "configuration is valid".green());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} invalid node(s)", invalid.len());
        Ok(ExitCode::FAILURE)
    }
}

fn print_tree(ctx: &ConfigContext, root: NodeId) -> Result<()> {
    for (id, depth) in ctx.walk(root)? {
        let node = ctx.node(id)?;
        let mut line = format!("{}{}", "  ".repeat(depth), node.name());
        match node.kind() {
            NodeKind::Value(_) => line += &format!(" = {}", ctx.content(id)?),
            NodeKind::Forked(fork) => line += &format!(" = {} ({fork})", ctx.content(id)?),
            NodeKind::Nested { .. } if !ctx.content(id)?.is_empty() => {
                line += &format!(" [{}]", ctx.content(id)?)
            }
            NodeKind::Nested { .. } => {}
        }
        let line = match ctx.display_hint(id)? {
            DisplayHint::Default => line.dimmed(),
            DisplayHint::Valid => line.normal(),
            DisplayHint::Invalid => line.red(),
        };
        println!("{line}");
    }
    Ok(())
}
