mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "objwire", version, about = "Remote-object protocol client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "objwire",
            "call",
            "/tmp/server.sock",
            "cputime",
            "--timeout",
            "3s",
        ])
        .expect("call args should parse");

        assert!(matches!(cli.command, Command::Call(_)));
    }

    #[test]
    fn parses_method_call_with_args() {
        let cli = Cli::try_parse_from([
            "objwire",
            "call",
            "/tmp/server.sock",
            "setOption",
            "seed",
            "42",
            "--method",
            "3",
        ])
        .expect("method call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.method, Some(3));
                assert_eq!(args.args, vec!["seed", "42"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_new_and_delete_subcommands() {
        let cli = Cli::try_parse_from(["objwire", "new", "/tmp/server.sock", "Learner()"])
            .expect("new args should parse");
        assert!(matches!(cli.command, Command::New(_)));

        let cli = Cli::try_parse_from(["objwire", "delete", "/tmp/server.sock", "2"])
            .expect("delete args should parse");
        assert!(matches!(cli.command, Command::Delete(_)));
    }

    #[test]
    fn parses_ping_with_timeout() {
        let cli = Cli::try_parse_from(["objwire", "ping", "/tmp/server.sock", "--timeout", "500ms"])
            .expect("ping args should parse");
        assert!(matches!(cli.command, Command::Ping(_)));
    }
}
