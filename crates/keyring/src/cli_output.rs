//! Centralised helpers for CLI input and output.
//!
//! Machine-readable results go to stdout as single JSON lines; prompts and
//! error reports go to stderr.

use crate::errors::{ErrorReport, KeyringError, VaultError};
use eyre::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use std::io::{BufRead as _, Write as _};
use zeroize::Zeroizing;

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

pub fn print_json(v: &serde_json::Value) -> eyre::Result<()> {
    let s = serde_json::to_string(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write output")?;
    Ok(())
}

/// Write the phrase followed by a newline. The caller keeps ownership of the
/// zeroizing buffer.
pub fn print_secret_line(s: &str) -> eyre::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(s.as_bytes()).context("write phrase")?;
    stdout.write_all(b"\n").context("write phrase")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

/// The structured report for errors the front end knows how to present.
pub fn error_report(e: &eyre::Report) -> Option<ErrorReport> {
    if let Some(ke) = e.downcast_ref::<KeyringError>() {
        return Some(ke.into());
    }
    e.downcast_ref::<VaultError>().map(Into::into)
}

pub fn print_error_report(r: &ErrorReport) {
    match serde_json::to_string(r) {
        Ok(s) => stderr_writeln(&s),
        Err(e) => stderr_writeln(&format!("failed to serialize error report: {e}")),
    }
}

/// Secrets read from the terminal or from stdin lines.
pub struct SecretInput {
    pub password: SecretString,
    pub phrase: Option<Zeroizing<String>>,
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Read the password (line 1) and, if `want_phrase`, the phrase (line 2).
pub fn read_stdin_secrets(want_phrase: bool) -> eyre::Result<SecretInput> {
    let mut stdin = std::io::stdin().lock();
    let mut line = Zeroizing::new(String::with_capacity(256));
    if stdin.read_line(&mut line).context("read password")? == 0 {
        eyre::bail!("expected a password on stdin");
    }
    let password = SecretString::new(strip_line_ending(&line).into());

    let phrase = if want_phrase {
        line.clear();
        if stdin.read_line(&mut line).context("read mnemonic phrase")? == 0 {
            eyre::bail!("expected a mnemonic phrase on the second stdin line");
        }
        Some(Zeroizing::new(strip_line_ending(&line).to_owned()))
    } else {
        None
    };

    Ok(SecretInput { password, phrase })
}

fn prompt_hidden(prompt: &str) -> eyre::Result<Zeroizing<String>> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .with_context(|| format!("read {}", prompt.trim_end_matches([':', ' '])))
}

/// Prompt on the terminal with echo disabled. New passwords are asked twice.
pub fn prompt_secrets(want_phrase: bool, confirm_password: bool) -> eyre::Result<SecretInput> {
    let phrase = if want_phrase {
        Some(prompt_hidden("Mnemonic phrase: ")?)
    } else {
        None
    };
    let password = SecretString::new(prompt_hidden("Password: ")?.as_str().into());
    if confirm_password {
        let again = prompt_hidden("Confirm password: ")?;
        if again.as_str() != password.expose_secret() {
            eyre::bail!("passwords do not match");
        }
    }
    Ok(SecretInput { password, phrase })
}

pub fn read_secrets(
    from_stdin: bool,
    want_phrase: bool,
    confirm_password: bool,
) -> eyre::Result<SecretInput> {
    if from_stdin {
        read_stdin_secrets(want_phrase)
    } else {
        prompt_secrets(want_phrase, confirm_password)
    }
}
