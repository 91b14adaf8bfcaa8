use crate::cmd::{open_session, NewArgs};
use crate::exit::{call_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: NewArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.path)?;
    let handle = session
        .new_object(&args.spec)
        .map_err(|err| call_error("object creation failed", err))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "id": handle.id() })),
        _ => println!("{}", handle.id()),
    }
    Ok(SUCCESS)
}
