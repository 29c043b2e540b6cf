use std::fmt::Write;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use cmdgate::{validate, Catalog, RealPathProbe, ValidationOptions};

use super::CmdExit;

pub fn command() -> Command {
    Command::new("check")
        .about("Test a command against the catalog or list available checks")
        .arg_required_else_help(true)
        .arg(
            Arg::new("command")
                .short('c')
                .long("command")
                .help("Command to screen (dry-run, no challenge)")
                .conflicts_with("list"),
        )
        .arg(
            Arg::new("severity")
                .long("severity")
                .value_name("CSV")
                .help("Only keep matches with these severities (low,medium,high,critical)"),
        )
        .arg(
            Arg::new("deny")
                .long("deny")
                .value_name("CSV")
                .help("Check ids that force a deny verdict when matched"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List all checks in the catalog")
                .action(ArgAction::SetTrue)
                .conflicts_with("command"),
        )
        .arg(
            Arg::new("group")
                .short('g')
                .long("group")
                .help("Filter checks by group (used with --list)")
                .requires("list"),
        )
}

pub fn run(matches: &ArgMatches, catalog: &Catalog) -> Result<CmdExit> {
    if matches.get_flag("list") {
        let group_filter = matches.get_one::<String>("group").map(String::as_str);
        return Ok(run_list(catalog, group_filter));
    }

    if let Some(command) = matches.get_one::<String>("command") {
        let options = ValidationOptions {
            allowed_severities: super::parse_severity_csv(matches.get_one::<String>("severity"))?,
            deny_pattern_ids: super::parse_id_csv(matches.get_one::<String>("deny")),
        };
        return run_check(catalog, command, &options);
    }

    Ok(CmdExit {
        code: exitcode::USAGE,
        message: Some("Provide --command or --list. See: cmdgate check --help".to_string()),
    })
}

fn run_check(catalog: &Catalog, command: &str, options: &ValidationOptions) -> Result<CmdExit> {
    let result = validate(catalog, command, options, &RealPathProbe)?;

    if !result.should_challenge {
        return Ok(CmdExit {
            code: exitcode::OK,
            message: Some("No risky patterns matched.".to_string()),
        });
    }

    Ok(CmdExit {
        code: exitcode::OK,
        message: Some(serde_yaml::to_string(&result)?),
    })
}

fn run_list(catalog: &Catalog, group_filter: Option<&str>) -> CmdExit {
    let checks: Vec<_> = match group_filter {
        Some(group) => catalog.by_group(group).collect(),
        None => catalog.all().iter().collect(),
    };

    let mut output = format!(
        "{} check(s) in groups: {}\n\n",
        checks.len(),
        catalog.groups().join(", ")
    );
    for check in &checks {
        let _ = writeln!(
            output,
            "  {id:<40} {group:<12} {severity:<10} {description}",
            id = check.id,
            group = check.group,
            severity = check.severity.to_string(),
            description = check.description
        );
    }

    println!("{output}");
    CmdExit {
        code: exitcode::OK,
        message: None,
    }
}
