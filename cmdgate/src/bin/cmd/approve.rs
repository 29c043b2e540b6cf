use std::fmt::Write;
use std::time::Duration;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use cmdgate::{ApproveOptions, Catalog, RealPathProbe, ValidationOptions};

use super::CmdExit;

pub fn command() -> Command {
    Command::new("approve")
        .about("Screen a command and, if risky, collect approval over a local challenge page")
        .arg(
            Arg::new("command")
                .short('c')
                .long("command")
                .help("The command to gate")
                .required(true),
        )
        .arg(
            Arg::new("challenge")
                .long("challenge")
                .value_name("KIND")
                .help("Challenge kind: confirm, math, word or block")
                .default_value("confirm"),
        )
        .arg(
            Arg::new("severity")
                .long("severity")
                .value_name("CSV")
                .help("Only challenge matches with these severities")
                .default_value("critical,high,medium"),
        )
        .arg(
            Arg::new("deny")
                .long("deny")
                .value_name("CSV")
                .help("Check ids that deny the command outright when matched"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Challenge deadline in milliseconds")
                .default_value("60000"),
        )
        .arg(
            Arg::new("no-open")
                .long("no-open")
                .help("Do not launch a browser; print the challenge URL only")
                .action(ArgAction::SetTrue),
        )
}

pub(crate) fn options_from_matches(matches: &ArgMatches) -> Result<ApproveOptions> {
    let timeout_ms: u64 = matches
        .get_one::<String>("timeout-ms")
        .map_or(Ok(60_000), |raw| raw.parse())?;

    Ok(ApproveOptions {
        validation: ValidationOptions {
            allowed_severities: super::parse_severity_csv(matches.get_one::<String>("severity"))?,
            deny_pattern_ids: super::parse_id_csv(matches.get_one::<String>("deny")),
        },
        challenge: super::parse_challenge_lenient(
            matches
                .get_one::<String>("challenge")
                .map_or("confirm", String::as_str),
        ),
        timeout: Duration::from_millis(timeout_ms),
        open_browser: !matches.get_flag("no-open"),
    })
}

pub fn run(matches: &ArgMatches, catalog: &Catalog) -> Result<CmdExit> {
    let command = matches
        .get_one::<String>("command")
        .map_or("", String::as_str);
    let options = options_from_matches(matches)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (outcome, result) =
        runtime.block_on(cmdgate::approve(catalog, command, &options, &RealPathProbe))?;

    if outcome.allowed {
        return Ok(CmdExit {
            code: exitcode::OK,
            message: Some("Command approved.".to_string()),
        });
    }

    let mut message = format!(
        "Command denied: {}",
        outcome.reason.as_deref().unwrap_or("user denial")
    );
    for record in &result.matches {
        let _ = write!(message, "\n* [{}] {}", record.id, record.description);
    }
    Ok(CmdExit {
        code: exitcode::NOPERM,
        message: Some(message),
    })
}
