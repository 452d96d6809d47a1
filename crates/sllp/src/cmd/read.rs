use bytes::Bytes;
use serde::Serialize;
use sllp_client::{connect_device, DeviceClient};
use sllp_frame::{Framing, Value, ValueKind};
use sllp_transport::Transport;

use crate::cmd::ReadArgs;
use crate::exit::{client_error, frame_error, CliResult, SUCCESS};
use crate::output::{hex, print_json, print_raw, table, OutputFormat};

#[derive(Serialize)]
struct Reading {
    id: u8,
    raw: String,
    kind: Option<String>,
    value: Option<String>,
}

#[derive(Serialize)]
struct ReadOutput {
    endpoint: String,
    group: Option<u8>,
    readings: Vec<Reading>,
}

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.client_config(Framing::Variable)?;
    let mut device = connect_device(&config).map_err(|err| client_error("connect failed", err))?;

    let result = read(&mut device, &args);
    args.connect.report(device.stats());
    let (raw, readings) = result?;

    let out = ReadOutput {
        endpoint: config.endpoint.to_string(),
        group: args.group.then_some(args.id),
        readings,
    };
    print_readings(&out, &raw, format);
    Ok(SUCCESS)
}

fn read<T: Transport>(
    device: &mut DeviceClient<T>,
    args: &ReadArgs,
) -> CliResult<(Bytes, Vec<Reading>)> {
    if args.group {
        let members = device
            .read_group_members(args.id)
            .map_err(|err| client_error("read group failed", err))?;
        let raw: Vec<u8> = members.iter().flat_map(|(_, bytes)| bytes.iter().copied()).collect();
        let readings = members
            .iter()
            .map(|(id, bytes)| describe(*id, bytes, args.kind.filter(|k| k.width() == bytes.len())))
            .collect();
        return Ok((Bytes::from(raw), readings));
    }

    if args.kind.is_none() {
        device
            .load_catalog()
            .map_err(|err| client_error("catalog query failed", err))?;
    }
    let raw = device
        .read_variable(args.id)
        .map_err(|err| client_error("read failed", err))?;
    if let Some(kind) = args.kind {
        Value::decode(kind, &raw).map_err(|err| frame_error("decode failed", err))?;
    }
    let reading = describe(args.id, &raw, args.kind);
    Ok((raw, vec![reading]))
}

/// Pair raw bytes with their numeric reading, defaulting the kind from
/// the width when none was asked for.
fn describe(id: u8, raw: &[u8], kind: Option<ValueKind>) -> Reading {
    let kind = kind.or_else(|| ValueKind::for_width(raw.len()));
    let value = kind.and_then(|kind| Value::decode(kind, raw).ok());
    Reading {
        id,
        raw: hex(raw),
        kind: value.map(|v| v.kind().to_string()),
        value: value.map(|v| v.to_string()),
    }
}

fn print_readings(out: &ReadOutput, raw: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = table(&["ID", "RAW", "KIND", "VALUE"]);
            for reading in &out.readings {
                table.add_row(vec![
                    reading.id.to_string(),
                    reading.raw.clone(),
                    reading.kind.clone().unwrap_or_default(),
                    reading.value.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for reading in &out.readings {
                match (&reading.kind, &reading.value) {
                    (Some(kind), Some(value)) => {
                        println!("var {}: {} ({kind} {value})", reading.id, reading.raw)
                    }
                    _ => println!("var {}: {}", reading.id, reading.raw),
                }
            }
        }
        OutputFormat::Raw => print_raw(raw),
    }
}
