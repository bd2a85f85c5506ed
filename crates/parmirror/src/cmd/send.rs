use std::collections::BTreeMap;
use std::net::TcpStream;

use parmirror_proto::{Message, MessageReader, MessageWriter, ParamValue};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{io_error, wire_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let values = parse_assignments(&args.set)?;

    let stream =
        TcpStream::connect(&args.addr).map_err(|err| io_error("connect failed", err))?;
    let read_half = stream
        .try_clone()
        .map_err(|err| io_error("connect failed", err))?;
    read_half
        .set_read_timeout(Some(wait_timeout))
        .map_err(|err| io_error("connect failed", err))?;

    let mut writer = MessageWriter::new(stream);
    writer
        .send(&Message::ParameterUpdate {
            id: args.id.clone(),
            values,
        })
        .map_err(|err| wire_error("send failed", err))?;

    if args.wait {
        let mut reader = MessageReader::new(read_half);
        let echoed = wait_for_update(&mut reader, &args.id)?;
        print_message(&echoed, format);
    }

    Ok(SUCCESS)
}

/// Read until the relay hands back a `parameter_update` for `id`.
/// Other traffic on the session is passed over.
fn wait_for_update(reader: &mut MessageReader<TcpStream>, id: &str) -> CliResult<Message> {
    loop {
        let msg = reader
            .read_message()
            .map_err(|err| wire_error("receive failed", err))?;
        if matches!(&msg, Message::ParameterUpdate { id: got, .. } if got == id) {
            return Ok(msg);
        }
    }
}

fn parse_assignments(pairs: &[String]) -> CliResult<BTreeMap<String, ParamValue>> {
    let mut values = BTreeMap::new();
    for pair in pairs {
        let (name, literal) = pair.split_once('=').ok_or_else(|| {
            CliError::new(USAGE, format!("--set expects NAME=VALUE, got {pair:?}"))
        })?;
        if name.is_empty() {
            return Err(CliError::new(
                USAGE,
                format!("--set expects a parameter name, got {pair:?}"),
            ));
        }
        values.insert(name.to_string(), parse_value(literal));
    }
    Ok(values)
}

/// Value literals: `true`/`false`, a number, a comma-separated number
/// tuple, anything else as text.
fn parse_value(literal: &str) -> ParamValue {
    match literal {
        "true" => return ParamValue::Toggle(true),
        "false" => return ParamValue::Toggle(false),
        _ => {}
    }
    if let Ok(number) = literal.parse::<f64>() {
        return ParamValue::Number(number);
    }
    if literal.contains(',') {
        let parts: Result<Vec<f64>, _> = literal.split(',').map(|p| p.trim().parse()).collect();
        if let Ok(parts) = parts {
            return ParamValue::Tuple(parts);
        }
    }
    ParamValue::Text(literal.to_string())
}
