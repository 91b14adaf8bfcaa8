use crate::cmd::{open_session, DeleteArgs};
use crate::exit::{call_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: DeleteArgs) -> CliResult<i32> {
    let mut session = open_session(&args.path)?;

    if args.id == "all" {
        session
            .delete_all()
            .map_err(|err| call_error("delete failed", err))?;
        return Ok(SUCCESS);
    }

    let id: u64 = args
        .id
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid object id: {}", args.id)))?;
    let handle = session
        .adopt(id)
        .map_err(|err| call_error("bad object id", err))?;
    session
        .delete_object(handle)
        .map_err(|err| call_error("delete failed", err))?;
    Ok(SUCCESS)
}
