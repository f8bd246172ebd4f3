//! Environment guard.
//!
//! Run before a script that touches shared infrastructure. Unprotected
//! environments pass straight through; protected ones need an explicit yes
//! on an interactive terminal. Exit code 0 means proceed, 1 means abort.

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use dialoguer::Confirm;

/// Environment names that need manual confirmation
pub const PROTECTED_ENVIRONMENTS: [&str; 4] = ["production", "prod", "staging", "test"];

/// Ask for confirmation before running against a protected environment
#[derive(Parser, Debug)]
#[command(name = "env-guard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target environment name
    #[arg(env = "APP_ENV")]
    environment: String,
}

/// Case-insensitive, surrounding whitespace ignored
pub fn is_protected(environment: &str) -> bool {
    let name = environment.trim().to_lowercase();
    PROTECTED_ENVIRONMENTS.contains(&name.as_str())
}

fn confirm(environment: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        eprintln!("'{}' is protected and no terminal is attached to confirm", environment);
        return Ok(false);
    }

    let confirmed = Confirm::new()
        .with_prompt(format!("You are about to run against '{}'. Continue?", environment))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

fn main() -> ExitCode {
    // Usage errors abort with 1 like any other refusal
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if !is_protected(&cli.environment) {
        return ExitCode::SUCCESS;
    }

    match confirm(&cli.environment) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("Aborted");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Confirmation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_names() {
        for name in ["production", "prod", "staging", "test", " Production ", "TEST"] {
            assert!(is_protected(name), "{} should be protected", name);
        }
        for name in ["dev", "local", "preview", "", "production-eu"] {
            assert!(!is_protected(name), "{} should not be protected", name);
        }
    }

    #[test]
    fn test_environment_comes_from_argument() {
        let cli = Cli::try_parse_from(["env-guard", "staging"]).unwrap();
        assert_eq!(cli.environment, "staging");
    }
}
