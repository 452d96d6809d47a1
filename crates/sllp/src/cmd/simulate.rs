use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sllp_frame::Framing;
use sllp_server::{Device, DeviceConfig, Handler, Server, ServerConfig, SimulatedSupply};

use crate::cmd::{parse_duration, parse_endpoint, SimulateArgs};
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ReadyOutput {
    endpoint: String,
    framing: String,
    max_connections: usize,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let framing = Framing::from(args.framing);
    let config = ServerConfig {
        framing,
        poll_interval: parse_duration(&args.poll_interval)?,
        max_connections: args.max_connections,
    };

    match framing {
        Framing::Control => {
            if args.config.is_some() {
                return Err(CliError::usage(
                    "--config describes a variable device; it does not apply to control framing",
                ));
            }
            serve(&args, SimulatedSupply::new(args.slew_step), config, format)
        }
        Framing::Variable => {
            let device_config = match &args.config {
                Some(path) => DeviceConfig::load(path)
                    .map_err(|err| server_error("device config", err))?,
                None => DeviceConfig::default(),
            };
            let device =
                Device::new(&device_config).map_err(|err| server_error("device config", err))?;
            serve(&args, device, config, format)
        }
    }
}

fn serve<H: Handler + 'static>(
    args: &SimulateArgs,
    handler: H,
    config: ServerConfig,
    format: OutputFormat,
) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let max_connections = config.max_connections;
    let server = Server::with_config(&endpoint, handler, config)
        .map_err(|err| server_error("bind failed", err))?;

    install_ctrlc_handler(server.stop_handle())?;

    let ready = ReadyOutput {
        endpoint: server.endpoint().to_string(),
        framing: Framing::from(args.framing).to_string(),
        max_connections,
    };
    match format {
        OutputFormat::Json => print_json(&ready),
        _ => println!("listening on {} ({} framing)", ready.endpoint, ready.framing),
    }

    server
        .serve()
        .map_err(|err| server_error("server failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
