//! Line prompts on stdin; the password prompt hides input.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::io::{BufRead, Write};

/// Ask for one line. `None` once input is exhausted.
///
/// # Errors
/// Returns an error if stdin or stderr fail.
pub fn read_line<R: BufRead>(input: &mut R, label: &str) -> Result<Option<String>> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{label}: ")?;
    stderr.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("failed to read input")?;
    if read == 0 {
        return Ok(None);
    }

    Ok(Some(line.trim().to_string()))
}

/// Like [`read_line`], but an empty answer keeps `current`.
///
/// # Errors
/// Returns an error if stdin or stderr fail.
pub fn read_line_or<R: BufRead>(input: &mut R, label: &str, current: &str) -> Result<Option<String>> {
    let label = if current.is_empty() {
        label.to_string()
    } else {
        format!("{label} [{current}]")
    };

    Ok(read_line(input, &label)?.map(|answer| {
        if answer.is_empty() {
            current.to_string()
        } else {
            answer
        }
    }))
}

/// Hidden password prompt on the terminal.
///
/// # Errors
/// Returns an error if the terminal cannot be read.
pub fn read_password(label: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(format!("{label}: ")).context("failed to read password")?;
    Ok(SecretString::from(password))
}
