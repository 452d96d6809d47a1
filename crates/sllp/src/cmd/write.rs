use serde::Serialize;
use sllp_client::{connect_device, DeviceClient};
use sllp_frame::{Framing, ValueKind};
use sllp_transport::Transport;

use crate::cmd::WriteArgs;
use crate::exit::{client_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{hex, parse_hex, print_json, OutputFormat};

#[derive(Serialize)]
struct WriteOutput {
    endpoint: String,
    id: u8,
    group: bool,
    raw: String,
    written: bool,
}

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    if args.group && !args.hex {
        return Err(CliError::usage(
            "group writes take the concatenated member bytes; pass them with --hex",
        ));
    }
    let config = args.connect.client_config(Framing::Variable)?;
    let mut device = connect_device(&config).map_err(|err| client_error("connect failed", err))?;

    let result = write(&mut device, &args);
    args.connect.report(device.stats());
    let raw = result?;

    let out = WriteOutput {
        endpoint: config.endpoint.to_string(),
        id: args.id,
        group: args.group,
        raw: hex(&raw),
        written: true,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        _ => {
            let target = if out.group { "group" } else { "var" };
            println!("{target} {} <- {}", out.id, out.raw);
        }
    }
    Ok(SUCCESS)
}

/// Encode and send the value; returns the raw bytes written.
fn write<T: Transport>(device: &mut DeviceClient<T>, args: &WriteArgs) -> CliResult<Vec<u8>> {
    if args.group {
        let raw = parse_hex(&args.value)?;
        device
            .write_group(args.id, &raw)
            .map_err(|err| client_error("write group failed", err))?;
        return Ok(raw);
    }

    let raw = if args.hex {
        parse_hex(&args.value)?
    } else {
        let kind = match args.kind {
            Some(kind) => kind,
            None => default_kind(device, args.id)?,
        };
        let value = kind
            .parse(&args.value)
            .map_err(|err| CliError::usage(err.to_string()))?;
        value.to_raw().to_vec()
    };
    device
        .write_variable(args.id, &raw)
        .map_err(|err| client_error("write failed", err))?;
    Ok(raw)
}

fn default_kind<T: Transport>(device: &mut DeviceClient<T>, id: u8) -> CliResult<ValueKind> {
    let catalog = device
        .load_catalog()
        .map_err(|err| client_error("catalog query failed", err))?;
    let width = catalog
        .width(id)
        .ok_or_else(|| CliError::new(DATA_INVALID, format!("device has no variable {id}")))?;
    ValueKind::for_width(width).ok_or_else(|| {
        CliError::usage(format!(
            "variable {id} is {width} bytes wide; pass --kind or --hex"
        ))
    })
}
