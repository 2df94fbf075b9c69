mod config;
mod token;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use config::Overrides;
use std::path::{Path, PathBuf};
use tracing::info;

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "siwa-secret-gen",
    version,
    about = "Generate Sign in with Apple client secrets"
)]
struct Cli {
    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: Format,

    /// Override config file path (default: ./siwa-secret.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Cmd {
    /// Write a template config file.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Build and sign a client secret JWT.
    Generate {
        /// Apple Developer team ID (the `iss` claim).
        #[arg(long)]
        team_id: Option<String>,
        /// Services ID or bundle ID (the `sub` claim).
        #[arg(long)]
        client_id: Option<String>,
        /// Key ID of the Sign in with Apple key (the `kid` header).
        #[arg(long)]
        key_id: Option<String>,
        /// Private key: path to the AuthKey .p8 file, or inline PEM.
        #[arg(long)]
        key: Option<String>,
        /// Issue time as seconds since the epoch (default: now).
        #[arg(long)]
        iat: Option<u64>,
    },
}

// ─── Entry ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siwa_secret_gen=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("siwa-secret.toml"));

    match cli.cmd {
        Cmd::Init { force } => cmd_init(&config_path, force),
        Cmd::Generate {
            team_id,
            client_id,
            key_id,
            key,
            iat,
        } => cmd_generate(
            &config_path,
            Overrides {
                team_id,
                client_id,
                key_id,
                private_key: key,
            },
            iat,
            &cli.format,
        ),
    }
}

// ─── init ────────────────────────────────────────────────────────────────────

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "config already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(config_path, config::CONFIG_TEMPLATE)?;

    eprintln!("Created {}", config_path.display());
    eprintln!();
    eprintln!("Next steps:");
    eprintln!(
        "  1. Edit {} with your team ID, client ID, key ID and key file",
        config_path.display()
    );
    eprintln!("  2. Run `siwa-secret-gen generate`");
    Ok(())
}

// ─── generate ────────────────────────────────────────────────────────────────

fn cmd_generate(
    config_path: &Path,
    overrides: Overrides,
    iat: Option<u64>,
    fmt: &Format,
) -> Result<()> {
    let creds = config::ResolvedCredentials::resolve(config_path, overrides)?;
    let iat = iat.unwrap_or_else(token::unix_now);
    let exp = iat
        .checked_add(token::VALIDITY_SECS)
        .with_context(|| format!("issue time {iat} is out of range"))?;

    info!(team_id = %creds.team_id, key_id = %creds.key_id, "signing client secret");

    let secret = token::generate_client_secret(
        &creds.private_key,
        &creds.team_id,
        &creds.client_id,
        &creds.key_id,
        Some(iat),
    )?;

    let exp_secs = i64::try_from(exp).context("expiry timestamp out of range")?;
    let expires = Utc
        .timestamp_opt(exp_secs, 0)
        .single()
        .context("expiry timestamp out of range")?;

    match fmt {
        Format::Json => {
            let out = serde_json::json!({
                "client_secret": secret,
                "team_id": creds.team_id,
                "client_id": creds.client_id,
                "key_id": creds.key_id,
                "issued_at": iat,
                "expires_at": exp,
                "expires_at_rfc3339": expires.to_rfc3339(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            println!("{secret}");
            eprintln!(
                "Valid until {} (6 months)",
                expires.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    Ok(())
}
