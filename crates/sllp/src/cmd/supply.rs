use serde::Serialize;
use sllp_client::{connect_supply, PowerSupply, Statistics, StatusReport};
use sllp_frame::Framing;
use sllp_transport::Transport;

use crate::cmd::{SupplyAction, SupplyArgs, Switch};
use crate::exit::{client_error, CliResult, DEVICE_FAULT, SUCCESS};
use crate::output::{print_json, print_stats, table, OutputFormat};

#[derive(Serialize)]
struct SupplyOutput {
    endpoint: String,
    status: StatusReport,
    faults: Vec<&'static str>,
    setpoint: f64,
    readback: f64,
    slew: bool,
    stats: Statistics,
}

pub fn run(args: SupplyArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.client_config(Framing::Control)?;
    let mut supply = connect_supply(&config).map_err(|err| client_error("connect failed", err))?;

    let result = apply(&mut supply, args.action);
    args.connect.report(supply.stats());
    result?;

    let status = supply.status();
    let out = SupplyOutput {
        endpoint: config.endpoint.to_string(),
        status,
        faults: status.faults(),
        setpoint: supply.setpoint(),
        readback: supply.readback(),
        slew: supply.slew_enabled(),
        stats: *supply.stats(),
    };
    print_supply(&out, format);

    if status.has_fault() {
        return Ok(DEVICE_FAULT);
    }
    Ok(SUCCESS)
}

/// Perform `action`. The supply is read first so a command never flips
/// the power state this process has not seen yet.
fn apply<T: Transport>(supply: &mut PowerSupply<T>, action: SupplyAction) -> CliResult<()> {
    supply
        .refresh()
        .map_err(|err| client_error("status read failed", err))?;

    let result = match action {
        SupplyAction::Status => return Ok(()),
        SupplyAction::On => supply.set_power(true),
        SupplyAction::Off => supply.set_power(false),
        SupplyAction::Reset => supply.reset(),
        SupplyAction::Set { current, slew } => {
            if slew {
                supply
                    .set_slew(true)
                    .map_err(|err| client_error("slew change failed", err))?;
            }
            supply.set_current(current)
        }
        SupplyAction::Slew { state } => supply.set_slew(state == Switch::On),
    };
    result
        .map(|_| ())
        .map_err(|err| client_error("supply command failed", err))
}

fn print_supply(out: &SupplyOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut state = table(&["FIELD", "VALUE"]);
            state
                .add_row(vec!["endpoint".to_string(), out.endpoint.clone()])
                .add_row(vec!["status".to_string(), format!("0x{:02X}", out.status.raw)])
                .add_row(vec!["power".to_string(), on_off(out.status.power_on).to_string()])
                .add_row(vec!["faults".to_string(), fault_text(&out.faults)])
                .add_row(vec!["setpoint".to_string(), format!("{:.4}", out.setpoint)])
                .add_row(vec!["readback".to_string(), format!("{:.4}", out.readback)])
                .add_row(vec!["slew".to_string(), on_off(out.slew).to_string()]);
            println!("{state}");
            print_stats(&out.stats, format);
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "power {} setpoint {:.4} readback {:.4} slew {} status 0x{:02X} faults: {}",
                on_off(out.status.power_on),
                out.setpoint,
                out.readback,
                on_off(out.slew),
                out.status.raw,
                fault_text(&out.faults)
            );
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn fault_text(faults: &[&str]) -> String {
    if faults.is_empty() {
        "none".to_string()
    } else {
        faults.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_text_lists_or_says_none() {
        assert_eq!(fault_text(&[]), "none");
        assert_eq!(
            fault_text(&["interlock open", "crowbar tripped"]),
            "interlock open, crowbar tripped"
        );
    }
}
