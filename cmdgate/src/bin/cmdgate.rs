mod cmd;

use std::process::exit;

use anyhow::anyhow;
use clap::ArgMatches;
use cmdgate::Catalog;
use console::Style;

const DEFAULT_ERR_EXIT_CODE: i32 = 1;

fn main() {
    let app = cmd::default::command()
        .subcommand(cmd::check::command())
        .subcommand(cmd::approve::command())
        .subcommand(cmd::exec::command())
        .subcommand(cmd::mcp::command());

    let matches = app.get_matches();
    init_tracing(&matches);

    // The catalog is compiled once here and passed down by reference.
    let catalog = match Catalog::load() {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("could not load the check catalog: {err}");
            exit(DEFAULT_ERR_EXIT_CODE)
        }
    };

    let res = match matches.subcommand() {
        Some(("check", sub_matches)) => cmd::check::run(sub_matches, &catalog),
        Some(("approve", sub_matches)) => cmd::approve::run(sub_matches, &catalog),
        Some(("exec", sub_matches)) => cmd::exec::run(sub_matches, &catalog),
        Some(("mcp", sub_matches)) => cmd::mcp::run(sub_matches, &catalog),
        _ => Err(anyhow!("command not found, see: cmdgate --help")),
    };

    let exit_with = match res {
        Ok(cmd_exit) => {
            if let Some(message) = cmd_exit.message {
                let style = if exitcode::is_success(cmd_exit.code) {
                    Style::new().green()
                } else {
                    Style::new().red()
                };
                eprintln!("{}", style.apply_to(message));
            }
            cmd_exit.code
        }
        Err(err) => {
            tracing::debug!("{err:?}");
            eprintln!("{err}");
            DEFAULT_ERR_EXIT_CODE
        }
    };
    exit(exit_with)
}

fn init_tracing(matches: &ArgMatches) {
    use tracing_subscriber::EnvFilter;

    let level = matches
        .get_one::<String>("log")
        .map_or("info", String::as_str);
    let filter = EnvFilter::try_from_env("CMDGATE_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
