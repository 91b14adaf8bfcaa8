use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use objwire_channel::UnixStream;
use objwire_client::Session;

use crate::exit::{channel_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod call;
pub mod delete;
pub mod new;
pub mod ping;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe a server for liveness.
    Ping(PingArgs),
    /// Call a remote function or method and print the results.
    Call(CallArgs),
    /// Construct a remote object from its textual spec.
    New(NewArgs),
    /// Delete a remote object by id.
    Delete(DeleteArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(args),
        Command::Call(args) => call::run(args, format),
        Command::New(args) => new::run(args, format),
        Command::Delete(args) => delete::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Maximum time to wait for the answer (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Function or method name.
    pub name: String,
    /// Arguments: integers, floats, true/false, anything else as a string.
    pub args: Vec<String>,
    /// Call a method on this remote object id instead of a free function.
    #[arg(long, value_name = "ID")]
    pub method: Option<u64>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Object spec, e.g. 'Learner( seed = 42 )'.
    pub spec: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Remote object id, or "all" to clear the server's registry.
    pub id: String,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn open_session(path: &std::path::Path) -> CliResult<Session<UnixStream>> {
    let stream = objwire_channel::connect(path)
        .map_err(|err| channel_error("connect failed", err))?;
    Session::new(stream).map_err(|err| crate::exit::call_error("session open failed", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(crate::exit::USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number.parse().map_err(|_| {
        CliError::new(crate::exit::USAGE, format!("invalid duration value: {input}"))
    })?;

    if value == 0 {
        return Err(CliError::new(
            crate::exit::USAGE,
            "duration must be greater than zero",
        ));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            crate::exit::USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
