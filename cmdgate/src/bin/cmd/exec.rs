use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use cmdgate::{exec_if_allowed, Catalog, ExecPolicy, RealPathProbe};

use super::CmdExit;

pub fn command() -> Command {
    super::approve::command()
        .name("exec")
        .about("Screen a command, collect approval if needed, then execute it")
        .arg(
            Arg::new("cwd")
                .long("cwd")
                .value_name("DIR")
                .help("Working directory for the command"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .value_name("KEY=VALUE")
                .help("Explicit environment entry for the command (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("propagate-env")
                .long("propagate-env")
                .value_name("CSV")
                .help("Process environment variables the command may inherit (default: none)"),
        )
}

fn policy_from_matches(matches: &ArgMatches) -> Result<ExecPolicy> {
    let mut env = HashMap::new();
    if let Some(entries) = matches.get_many::<String>("env") {
        for entry in entries {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("--env expects KEY=VALUE, got {entry:?}"))?;
            env.insert(key.to_string(), value.to_string());
        }
    }

    Ok(ExecPolicy {
        cwd: matches.get_one::<String>("cwd").map(PathBuf::from),
        env,
        env_allow_list: super::parse_id_csv(matches.get_one::<String>("propagate-env")),
    })
}

pub fn run(matches: &ArgMatches, catalog: &Catalog) -> Result<CmdExit> {
    let command = matches
        .get_one::<String>("command")
        .map_or("", String::as_str);
    let options = super::approve::options_from_matches(matches)?;
    let policy = policy_from_matches(matches)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(exec_if_allowed(
        catalog,
        command,
        &options,
        &policy,
        &RealPathProbe,
    ))?;

    if !outcome.allowed {
        return Ok(CmdExit {
            code: exitcode::NOPERM,
            message: Some(format!(
                "Command denied: {}",
                outcome.error.as_deref().unwrap_or("user denial")
            )),
        });
    }

    // Forward captured output as-is.
    print!("{}", outcome.stdout);
    std::io::stdout().flush()?;
    eprint!("{}", outcome.stderr);

    match outcome.error {
        None => Ok(CmdExit {
            code: exitcode::OK,
            message: None,
        }),
        Some(error) => Ok(CmdExit {
            code: 1,
            message: Some(error),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(args: &[&str]) -> ArgMatches {
        command().get_matches_from(args)
    }

    #[test]
    fn env_entries_are_parsed_into_policy() {
        let matches = matches_for(&[
            "exec",
            "-c",
            "env",
            "--env",
            "CUSTOM=yes",
            "--env",
            "OTHER=1",
            "--propagate-env",
            "PATH,SSH_AUTH_SOCK",
        ]);
        let policy = policy_from_matches(&matches).unwrap();
        assert_eq!(policy.env.get("CUSTOM").map(String::as_str), Some("yes"));
        assert_eq!(policy.env.get("OTHER").map(String::as_str), Some("1"));
        assert_eq!(policy.env_allow_list, vec!["PATH", "SSH_AUTH_SOCK"]);
        assert!(policy.cwd.is_none());
    }

    #[test]
    fn malformed_env_entry_is_rejected() {
        let matches = matches_for(&["exec", "-c", "env", "--env", "NOEQUALS"]);
        assert!(policy_from_matches(&matches).is_err());
    }

    #[test]
    fn propagate_env_defaults_to_empty() {
        let matches = matches_for(&["exec", "-c", "env"]);
        let policy = policy_from_matches(&matches).unwrap();
        assert!(policy.env_allow_list.is_empty());
        assert!(policy.env.is_empty());
    }
}
