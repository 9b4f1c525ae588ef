use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sectigo_certctl_lib::{
    IssuanceConfig, collect_certificate, create_certificate, describe_state,
    domain::normalize_domain_for_display,
    issuance::{CaClient, ReqwestTransport, ThreadClock},
    revoke_certificate,
    secrets::{KEYRING_SERVICE, keyring_store::KeyringSecretStore, resolve_credentials},
    storage::{ArtifactStore, ResourceState},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a key and CSR, enroll, and wait for the certificate.
    Issue {
        /// Resource config (JSON)
        #[arg(long, env = "SECTIGO_CONFIG")]
        config: PathBuf,
        /// Previous domain of this resource whose files should be removed first
        #[arg(long)]
        replace: Option<String>,
        /// Exit non-zero if the certificate is still pending when polling stops
        #[arg(long)]
        fail_on_timeout: bool,
    },
    /// Resume downloading a certificate left pending by `issue`.
    Collect {
        /// Resource config (JSON)
        #[arg(long, env = "SECTIGO_CONFIG")]
        config: PathBuf,
        /// Exit non-zero if the certificate is still pending when polling stops
        #[arg(long)]
        fail_on_timeout: bool,
    },
    /// Revoke the certificate and remove its local files.
    Revoke {
        /// Resource config (JSON)
        #[arg(long, env = "SECTIGO_CONFIG")]
        config: PathBuf,
        /// sslId to revoke instead of the one in the saved state
        #[arg(long)]
        ssl_id: Option<u64>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Issue {
            config,
            replace,
            fail_on_timeout,
        } => {
            let config = load_config(&config)?;
            let client = build_client(&config)?;
            let artifacts = ArtifactStore::new(&config.artifact_dir);
            let state = create_certificate(
                &config,
                &client,
                &artifacts,
                &ThreadClock,
                replace.as_deref(),
            )
            .with_context(|| format!("issuance for {} failed", display(&config)))?;
            report(&state, fail_on_timeout)
        }
        Command::Collect {
            config,
            fail_on_timeout,
        } => {
            let config = load_config(&config)?;
            let client = build_client(&config)?;
            let artifacts = ArtifactStore::new(&config.artifact_dir);
            let state = collect_certificate(&config, &client, &artifacts, &ThreadClock)
                .with_context(|| format!("download for {} failed", display(&config)))?;
            report(&state, fail_on_timeout)
        }
        Command::Revoke { config, ssl_id } => {
            let config = load_config(&config)?;
            let client = build_client(&config)?;
            let artifacts = ArtifactStore::new(&config.artifact_dir);
            let revoked = revoke_certificate(&config, &client, &artifacts, ssl_id)
                .with_context(|| format!("revocation for {} failed", display(&config)))?;
            println!("{} revoked: sslId {revoked}", display(&config));
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<IssuanceConfig> {
    IssuanceConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn build_client(config: &IssuanceConfig) -> Result<CaClient<ReqwestTransport>> {
    let keyring = KeyringSecretStore::new(KEYRING_SERVICE);
    let credentials = resolve_credentials(|key| std::env::var(key).ok(), Some(&keyring))
        .context("failed to resolve certificate manager credentials")?;
    Ok(CaClient::new(
        ReqwestTransport,
        config.base_url.clone(),
        credentials,
    ))
}

fn report(state: &ResourceState, fail_on_timeout: bool) -> Result<()> {
    println!("{}", describe_state(state));
    if fail_on_timeout {
        state.ensure_issued()?;
    }
    Ok(())
}

fn display(config: &IssuanceConfig) -> String {
    normalize_domain_for_display(&config.domain)
}
