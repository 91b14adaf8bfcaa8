use crate::cmd::{open_session, parse_duration, PingArgs};
use crate::exit::{CliResult, SUCCESS, TIMEOUT};

pub fn run(args: PingArgs) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut session = open_session(&args.path)?;

    if session.is_alive_within(timeout) {
        println!("alive");
        Ok(SUCCESS)
    } else {
        println!("no answer");
        Ok(TIMEOUT)
    }
}
