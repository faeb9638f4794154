//! CLI module for the reinvite command-line interface.
//!
//! Provides subcommands:
//! - `serve` - Start the HTTP API (default when no subcommand is given)
//! - `run` - Reconcile one student's invitation and print the result
//! - `orgs` - List configured organizations and assignments
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::Config;
use crate::github::GitHubClient;
use crate::reconcile::{ReconcileInput, ReconcileResult, Reconciler};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "reinvite")]
#[command(author, version, about = "Re-synchronize classroom repository invitations on GitHub", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "reinvite.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// GitHub token (overrides github.token from the config file)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API
    Serve,

    /// Reconcile one student's invitation
    Run(RunArgs),

    /// List configured organizations and their assignments
    Orgs,

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// GitHub username of the student
    #[arg(short, long)]
    pub username: String,

    /// Repository owner (organization)
    #[arg(long, conflicts_with = "org")]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long, conflicts_with = "assignment")]
    pub repo: Option<String>,

    /// Configured organization key, used with --assignment instead of --owner/--repo
    #[arg(long, requires = "assignment")]
    pub org: Option<String>,

    /// Assignment name as listed by `reinvite orgs`
    #[arg(long, requires = "org")]
    pub assignment: Option<String>,

    /// Permission to grant: pull, triage, push, maintain or admin
    #[arg(short, long, default_value = "push")]
    pub permission: String,

    /// Only report what would change
    #[arg(long)]
    pub dry_run: bool,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Load the config file and apply command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;
    if let Some(token) = &cli.token {
        config.github.token = Some(token.clone());
    }
    Ok(config)
}

/// Build a reconciler talking to the configured GitHub instance.
pub fn build_reconciler(config: &Config) -> Result<Reconciler> {
    let client = GitHubClient::from_config(&config.github)
        .context("Failed to create GitHub client")?;
    Ok(Reconciler::new(Arc::new(client)))
}

/// Run a CLI command. `serve` and no subcommand are handled in main.rs.
pub async fn run_command(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Some(Commands::Run(args)) => cmd_run(cli, args).await,
        Some(Commands::Orgs) => cmd_orgs(cli).map(|_| ExitCode::SUCCESS),
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::Serve) | None => Ok(ExitCode::SUCCESS),
    }
}

/// Turn the run arguments into reconcile input, resolving an assignment if given.
pub fn run_input(config: &Config, args: &RunArgs) -> Result<ReconcileInput> {
    let (owner, repo) = match (&args.org, &args.assignment) {
        (Some(org), Some(assignment)) => config
            .resolve_target(org, assignment, &args.username)
            .map(|(owner, repo)| (Some(owner), Some(repo)))?,
        _ => (args.owner.clone(), args.repo.clone()),
    };

    Ok(ReconcileInput {
        owner,
        repo,
        username: Some(args.username.clone()),
        permission: Some(args.permission.clone()),
        dry_run: Some(args.dry_run),
    })
}

/// Reconcile one invitation and print the result as JSON
async fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let input = run_input(&config, args)?;
    let reconciler = build_reconciler(&config)?;

    let result = reconciler.reconcile_input(input).await;
    print_result(&result)?;

    Ok(if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_result(result: &ReconcileResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
    println!("{}", json);

    if let Some(error) = &result.error {
        eprintln!();
        eprintln!("[!!] {}", error);
    } else if result.is_dry_run() {
        eprintln!();
        eprintln!("[OK] Dry run, no changes were made");
    }
    Ok(())
}

/// List organizations and assignments
fn cmd_orgs(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    if config.organizations.is_empty() {
        println!("No organizations configured.");
        return Ok(());
    }

    for (key, org) in &config.organizations {
        println!("{} ({})", key, org.name);
        println!("  Owner: {}", org.owner);
        println!("  Assignments:");
        for assignment in &org.assignments {
            println!("    {:28} {}-<username>", assignment.name, assignment.prefix);
        }
        println!();
    }
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli) -> Result<ExitCode> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("The built-in defaults will be used.");
    }

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Host:         {}", config.server.host);
    println!("  Port:         {}", config.server.port);
    println!();
    println!("GitHub:");
    println!("  API URL:      {}", config.github.api_url);
    println!(
        "  Token:        {}",
        if config.github.resolve_token().is_some() {
            "Configured"
        } else {
            "Missing"
        }
    );
    println!("  Timeout:      {}s", config.github.timeout_seconds);
    println!("  Page size:    {}", config.github.per_page);
    println!("  Max retries:  {}", config.github.retry.max_retries);
    println!();
    println!("Organizations:  {}", config.organizations.len());
    println!();

    let problems = config.validate();
    if problems.is_empty() {
        println!("[OK] Configuration is valid!");
        Ok(ExitCode::SUCCESS)
    } else {
        for problem in &problems {
            println!("[!!] {}", problem);
        }
        Ok(ExitCode::FAILURE)
    }
}
