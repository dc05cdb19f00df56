#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::{Context as _, ContextCompat as _};
use serde_json::json;
use tracing_subscriber::prelude::*;

mod cli_output;
mod config;
mod errors;
mod fsutil;
mod keystore;
mod paths;
mod store;
mod vault;

use keystore::{crypto::Argon2AesGcm, Keyring};
use vault::{MnemonicVault, UnlockOutcome, UpgradePolicy};

#[derive(Parser, Debug)]
#[command(name = "keyring", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resolved paths (useful for debugging).
    Paths,

    /// Encrypt a mnemonic phrase and store it in the vault file.
    Encrypt {
        /// Read the password (line 1) and phrase (line 2) from stdin instead of prompting.
        #[arg(long, default_value_t = false)]
        stdin: bool,

        /// Replace an existing vault file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Unlock the vault and print its envelope version and word count (no secrets).
    Status {
        /// Read the password from the first stdin line instead of prompting.
        #[arg(long, default_value_t = false)]
        stdin: bool,
    },

    /// Unlock the vault and print the mnemonic phrase to stdout.
    ///
    /// The phrase is sensitive; avoid running this where stdout is logged.
    Reveal {
        /// Read the password from the first stdin line instead of prompting.
        #[arg(long, default_value_t = false)]
        stdin: bool,
    },

    /// Re-encrypt a legacy vault file in the current format, regardless of config.
    Upgrade {
        /// Read the password from the first stdin line instead of prompting.
        #[arg(long, default_value_t = false)]
        stdin: bool,
    },
}

fn init_logging(paths: &paths::KeyringPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("keyring.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn status_json(out: &UnlockOutcome) -> serde_json::Value {
    json!({
        "ok": true,
        "version": out.decrypted.version.as_u8(),
        "words": out.decrypted.mnemonic.word_count(),
        "upgraded": out.upgraded,
    })
}

async fn run(cmd: Command, paths: &paths::KeyringPaths) -> eyre::Result<()> {
    let cfg = store::ConfigStore::new(paths).load_or_init_default()?;
    let vault = MnemonicVault::open(paths, &cfg);
    let keyring = Keyring::new(Argon2AesGcm::new(cfg.kdf.clone())?);

    match cmd {
        Command::Paths => cli_output::print_json(&json!({
          "config_dir": paths.config_dir,
          "data_dir": paths.data_dir,
          "log_file": paths.log_file,
          "vault_file": vault.path(),
        })),
        Command::Encrypt { stdin, force } => {
            if !force && vault.exists() {
                return Err(errors::VaultError::AlreadyExists(vault.path().to_path_buf()).into());
            }
            let input = cli_output::read_secrets(stdin, true, true)?;
            let phrase = input.phrase.context("missing mnemonic phrase")?;
            let mut mnemonic = keyring.mnemonic_from_words(&phrase)?;
            drop(phrase);
            let words = mnemonic.word_count();

            vault
                .seal_and_store(&keyring, &mut mnemonic, input.password, force)
                .await?;
            cli_output::print_json(&json!({
                "ok": true,
                "version": keystore::EnvelopeVersion::Current.as_u8(),
                "words": words,
                "path": vault.path(),
            }))
        }
        Command::Status { stdin } => {
            let input = cli_output::read_secrets(stdin, false, false)?;
            let out = vault
                .unlock(&keyring, input.password, UpgradePolicy::from_config(&cfg))
                .await?;
            cli_output::print_json(&status_json(&out))
        }
        Command::Reveal { stdin } => {
            let input = cli_output::read_secrets(stdin, false, false)?;
            let out = vault
                .unlock(&keyring, input.password, UpgradePolicy::from_config(&cfg))
                .await?;
            let phrase = keyring.dangerously_convert_to_words(&out.decrypted.mnemonic)?;
            cli_output::print_secret_line(&phrase)
        }
        Command::Upgrade { stdin } => {
            let input = cli_output::read_secrets(stdin, false, false)?;
            let out = vault
                .unlock(&keyring, input.password, UpgradePolicy::OnRead)
                .await?;
            cli_output::print_json(&status_json(&out))
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::KeyringPaths::discover()?;
    paths.ensure_private_dirs().context("create keyring dirs")?;
    let _log_guard = init_logging(&paths);

    let res = run(cli.cmd, &paths).await;
    if let Err(e) = &res {
        if let Some(report) = cli_output::error_report(e) {
            tracing::debug!(code = %report.code, "command failed");
            cli_output::print_error_report(&report);
        }
    }
    res
}
