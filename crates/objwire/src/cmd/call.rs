use objwire_codec::Value;

use crate::cmd::{open_session, parse_duration, CallArgs};
use crate::exit::{call_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut session = open_session(&args.path)?;
    session
        .get_ref()
        .set_read_timeout(Some(timeout))
        .map_err(|err| crate::exit::io_error("timeout setup failed", err))?;

    let values: Vec<Value> = args.args.iter().map(|arg| parse_arg(arg)).collect();

    let results = match args.method {
        Some(id) => {
            let handle = session
                .adopt(id)
                .map_err(|err| call_error("bad object id", err))?;
            session
                .call_method(&handle, &args.name, &values)
                .map_err(|err| call_error("call failed", err))?
        }
        None => session
            .call_function(&args.name, &values)
            .map_err(|err| call_error("call failed", err))?,
    };

    print_values(&results, format);
    Ok(SUCCESS)
}

/// Command-line arguments carry no type annotations, so the mapping is by
/// shape: integer, float, boolean, and everything else a string.
fn parse_arg(arg: &str) -> Value {
    if let Ok(int) = arg.parse::<i64>() {
        return Value::int(int);
    }
    if let Ok(float) = arg.parse::<f64>() {
        return Value::float(float);
    }
    match arg {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::str(other),
    }
}
