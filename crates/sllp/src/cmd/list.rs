use serde::Serialize;
use sllp_client::connect_device;
use sllp_frame::Framing;

use crate::cmd::ListArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{hex, print_json, table, OutputFormat};

#[derive(Serialize)]
struct VariableRow {
    id: u8,
    width: u8,
    writable: bool,
}

#[derive(Serialize)]
struct GroupRow {
    id: u8,
    size: u8,
    writable: bool,
    members: Vec<u8>,
}

#[derive(Serialize)]
struct CurveRow {
    id: u8,
    writable: bool,
    block_count: u8,
    block_size: u16,
    checksum: String,
}

#[derive(Serialize)]
struct ListOutput {
    endpoint: String,
    version: String,
    variables: Vec<VariableRow>,
    groups: Vec<GroupRow>,
    curves: Vec<CurveRow>,
}

pub fn run(args: ListArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.client_config(Framing::Variable)?;
    let mut device = connect_device(&config).map_err(|err| client_error("connect failed", err))?;

    let version = device
        .query_status()
        .map_err(|err| client_error("status query failed", err))?;
    let catalog = device
        .load_catalog()
        .map_err(|err| client_error("catalog query failed", err))?
        .clone();

    let mut groups = Vec::with_capacity(catalog.groups.len());
    for (id, info) in (0u8..).zip(&catalog.groups) {
        let members = device
            .group_members(id)
            .map_err(|err| client_error("group query failed", err))?;
        groups.push(GroupRow {
            id,
            size: info.size,
            writable: info.writable,
            members,
        });
    }
    args.connect.report(device.stats());

    let out = ListOutput {
        endpoint: config.endpoint.to_string(),
        version: version.to_string(),
        variables: (0u8..)
            .zip(&catalog.variables)
            .map(|(id, info)| VariableRow {
                id,
                width: info.width,
                writable: info.writable,
            })
            .collect(),
        groups,
        curves: (0u8..)
            .zip(&catalog.curves)
            .map(|(id, info)| CurveRow {
                id,
                writable: info.writable,
                block_count: info.block_count,
                block_size: info.block_size,
                checksum: hex(&info.checksum),
            })
            .collect(),
    };
    print_list(&out, format);
    Ok(SUCCESS)
}

fn print_list(out: &ListOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!("{} (protocol {})", out.endpoint, out.version);

            let mut variables = table(&["VAR", "WIDTH", "ACCESS"]);
            for var in &out.variables {
                variables.add_row(vec![
                    var.id.to_string(),
                    var.width.to_string(),
                    access(var.writable).to_string(),
                ]);
            }
            println!("{variables}");

            let mut groups = table(&["GROUP", "SIZE", "ACCESS", "MEMBERS"]);
            for group in &out.groups {
                groups.add_row(vec![
                    group.id.to_string(),
                    group.size.to_string(),
                    access(group.writable).to_string(),
                    join(&group.members),
                ]);
            }
            println!("{groups}");

            if !out.curves.is_empty() {
                let mut curves = table(&["CURVE", "BLOCKS", "BLOCK SIZE", "ACCESS", "CHECKSUM"]);
                for curve in &out.curves {
                    curves.add_row(vec![
                        curve.id.to_string(),
                        curve.block_count.to_string(),
                        curve.block_size.to_string(),
                        access(curve.writable).to_string(),
                        curve.checksum.clone(),
                    ]);
                }
                println!("{curves}");
            }
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("protocol {}", out.version);
            for var in &out.variables {
                println!("var {}: {} bytes {}", var.id, var.width, access(var.writable));
            }
            for group in &out.groups {
                println!("group {}: [{}] {}", group.id, join(&group.members), access(group.writable));
            }
            for curve in &out.curves {
                println!(
                    "curve {}: {}x{} bytes {} checksum {}",
                    curve.id,
                    curve.block_count,
                    curve.block_size,
                    access(curve.writable),
                    curve.checksum
                );
            }
        }
    }
}

fn access(writable: bool) -> &'static str {
    if writable {
        "rw"
    } else {
        "ro"
    }
}

fn join(ids: &[u8]) -> String {
    ids.iter().map(u8::to_string).collect::<Vec<_>>().join(",")
}
