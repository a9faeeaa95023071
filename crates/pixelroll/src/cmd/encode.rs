use std::time::Duration;

use bytes::BytesMut;
use pixelroll_frame::{encode_command, BlinkCommand, BlinkParams, OutboundCommand, Rgba};

use crate::cmd::{BlinkArgs, EncodeArgs, EncodeCommand};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (name, command) = match args.command {
        EncodeCommand::WhoAreYou => ("WhoAreYou", OutboundCommand::WhoAreYou),
        EncodeCommand::RequestRollState => ("RequestRollState", OutboundCommand::RequestRollState),
        EncodeCommand::RequestBattery => {
            ("RequestBatteryLevel", OutboundCommand::RequestBatteryLevel)
        }
        EncodeCommand::Blink(blink) => ("Blink", OutboundCommand::Blink(blink_command(&blink)?)),
    };

    let mut buf = BytesMut::with_capacity(command.wire_size());
    encode_command(&command, &mut buf);
    print_encoded(name, &buf, format);
    Ok(SUCCESS)
}

fn blink_command(args: &BlinkArgs) -> CliResult<BlinkCommand> {
    let params = BlinkParams {
        count: args.count,
        duration: Duration::from_millis(args.duration_ms),
        color: parse_color(&args.color)?,
        face_mask: args.face_mask,
        fade: args.fade,
        loop_count: args.loop_count,
    };
    BlinkCommand::try_from(params).map_err(|err| frame_error("invalid blink", err))
}

/// `RRGGBB` is opaque; `RRGGBBAA` carries its own alpha.
fn parse_color(value: &str) -> CliResult<Rgba> {
    let digits = value.trim_start_matches('#');
    let invalid = || CliError::new(USAGE, format!("invalid color '{value}': expected RRGGBB or RRGGBBAA"));
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    match bytes.as_slice() {
        [r, g, b] => Ok(Rgba::rgb(*r, *g, *b)),
        [r, g, b, a] => Ok(Rgba::new(*r, *g, *b, *a)),
        _ => Err(invalid()),
    }
}
