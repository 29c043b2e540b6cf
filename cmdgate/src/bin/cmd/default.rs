use clap::{builder::PossibleValuesParser, crate_version, Arg, Command};

pub fn command() -> Command {
    Command::new("cmdgate")
        .version(crate_version!())
        .about("Screen risky shell commands and gate them behind a human challenge")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log")
                .long("log")
                .help("Set logging level")
                .value_name("LEVEL")
                .value_parser(PossibleValuesParser::new([
                    "off", "trace", "debug", "info", "warn", "error",
                ]))
                .default_value("info")
                .ignore_case(true)
                .global(true),
        )
}
