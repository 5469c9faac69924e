// Copyright 2026 Scribe Contributors
// SPDX-License-Identifier: Apache-2.0

use answer_scribe::{LocatorTable, DEFAULT_PREFIX};
use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use scribe_runtime::cli::output::{OutputFormat, OutputOptions};
use scribe_runtime::cli::{doctor, replay_cmd, run_cmd};
use scribe_runtime::config::RunConfig;
use scribe_runtime::logging;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "scribe",
    about = "Scribe: submit a prompt to a research-answer site and save the settled answer with its references",
    version,
    after_help = "Run 'scribe <command> --help' for details on each command.\nRun 'scribe \"<prompt>\"' to capture one answer."
)]
struct Cli {
    /// Prompt to submit
    prompt: Option<String>,

    /// Run the browser without a visible window
    #[arg(long)]
    headless: bool,

    /// JSON file overriding individual locator roles
    #[arg(long, global = true)]
    locators: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "docx", global = true)]
    format: OutputFormat,

    /// Directory for the saved document
    #[arg(long, default_value = ".", global = true)]
    output_dir: PathBuf,

    /// Answer site to open (overrides SCRIBE_SITE_URL)
    #[arg(long, global = true)]
    site_url: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture pipeline over saved page markup
    Replay {
        /// Saved page markup; repeat for frames revealed by scrolling
        #[arg(long = "html", required = true)]
        frames: Vec<PathBuf>,
        /// Prompt used as the document heading
        #[arg(long)]
        prompt: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn load_locators(path: Option<&Path>) -> Result<LocatorTable> {
    let table = match path {
        Some(p) => LocatorTable::load_overrides(p)?,
        None => LocatorTable::bohrium(),
    };
    Ok(table)
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = RunConfig::from_env().with_site_url(cli.site_url);
    let output = OutputOptions {
        format: cli.format,
        dir: cli.output_dir,
        prefix: DEFAULT_PREFIX.to_string(),
    };

    match cli.command {
        None => {
            let Some(prompt) = cli.prompt else {
                Cli::command()
                    .error(ErrorKind::MissingRequiredArgument, "a prompt is required")
                    .exit();
            };
            if prompt.trim().is_empty() {
                bail!("the prompt is empty");
            }
            let locators = load_locators(cli.locators.as_deref())?;
            let problems = locators.validate();
            if !problems.is_empty() {
                for p in &problems {
                    tracing::error!("{p}");
                }
                bail!("{} invalid selector(s) in the locator table", problems.len());
            }
            tracing::debug!("run config: {config:?}");
            run_cmd::run(&prompt, cli.headless, locators, &config, &output).await?;
            Ok(())
        }
        Some(_) if cli.prompt.is_some() => {
            bail!("a prompt cannot be combined with a subcommand")
        }
        Some(Commands::Replay { frames, prompt }) => {
            let locators = load_locators(cli.locators.as_deref())?;
            replay_cmd::run(&frames, &prompt, &locators, &output).await?;
            Ok(())
        }
        Some(Commands::Doctor) => {
            let locators = load_locators(cli.locators.as_deref())
                .context("locator file could not be loaded")?;
            doctor::run(&config, &locators, &output.dir)?;
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "scribe", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json);

    // 0 = completed (including partial results), 1 = fatal error.
    if let Err(e) = dispatch(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
