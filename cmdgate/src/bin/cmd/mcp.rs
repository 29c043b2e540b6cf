use std::time::Duration;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use cmdgate::{AgentPolicy, ApproveOptions, Catalog, McpServer, Severity};

use super::CmdExit;

pub fn command() -> Command {
    Command::new("mcp")
        .about("Serve the gate as an MCP tool server over stdio")
        .arg(
            Arg::new("challenge")
                .long("challenge")
                .value_name("KIND")
                .help("Default challenge kind for interactive approve_command calls")
                .default_value("confirm"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Default challenge deadline in milliseconds")
                .default_value("60000"),
        )
        .arg(
            Arg::new("auto-deny-severity")
                .long("auto-deny-severity")
                .value_name("SEVERITY")
                .help("Unattended calls deny matches at or above this severity")
                .default_value("high"),
        )
        .arg(
            Arg::new("no-open")
                .long("no-open")
                .help("Do not launch a browser for challenges")
                .action(ArgAction::SetTrue),
        )
}

pub fn run(matches: &ArgMatches, catalog: &Catalog) -> Result<CmdExit> {
    let timeout_ms: u64 = matches
        .get_one::<String>("timeout-ms")
        .map_or(Ok(60_000), |raw| raw.parse())?;

    let options = ApproveOptions {
        challenge: super::parse_challenge_lenient(
            matches
                .get_one::<String>("challenge")
                .map_or("confirm", String::as_str),
        ),
        timeout: Duration::from_millis(timeout_ms),
        open_browser: !matches.get_flag("no-open"),
        ..Default::default()
    };

    let agent_policy = AgentPolicy {
        auto_deny_severity: matches
            .get_one::<String>("auto-deny-severity")
            .map_or(Ok(Severity::High), |raw| raw.parse())?,
        ..Default::default()
    };

    McpServer::new(catalog, options, agent_policy)?.run_stdio()?;
    Ok(CmdExit {
        code: exitcode::OK,
        message: None,
    })
}
