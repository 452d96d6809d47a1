use sllp_frame::Framing;
use sllp_transport::StreamTransport;
use tracing::info;

use crate::config::ClientConfig;
use crate::device::DeviceClient;
use crate::engine::ControlProtocol;
use crate::error::Result;
use crate::stats::Statistics;
use crate::supply::PowerSupply;

/// A connection speaking whichever framing it was configured with.
pub enum Client {
    Supply(PowerSupply<StreamTransport>),
    Device(DeviceClient<StreamTransport>),
}

impl Client {
    pub fn framing(&self) -> Framing {
        match self {
            Client::Supply(_) => Framing::Control,
            Client::Device(_) => Framing::Variable,
        }
    }

    pub fn stats(&self) -> &Statistics {
        match self {
            Client::Supply(supply) => supply.stats(),
            Client::Device(device) => device.stats(),
        }
    }
}

/// Connect to `config.endpoint` and build the client for its framing.
pub fn connect(config: &ClientConfig) -> Result<Client> {
    let client = match config.framing {
        Framing::Control => Client::Supply(connect_supply(config)?),
        Framing::Variable => Client::Device(connect_device(config)?),
    };
    Ok(client)
}

pub fn connect_supply(config: &ClientConfig) -> Result<PowerSupply<StreamTransport>> {
    let transport = open(config)?;
    Ok(PowerSupply::with_protocol(
        ControlProtocol::new(config.control_terminator),
        transport,
        config.transaction.clone(),
    ))
}

pub fn connect_device(config: &ClientConfig) -> Result<DeviceClient<StreamTransport>> {
    let transport = open(config)?;
    Ok(DeviceClient::new(transport, config.transaction.clone()))
}

fn open(config: &ClientConfig) -> Result<StreamTransport> {
    let transport =
        StreamTransport::connect_with_config(config.endpoint.clone(), config.transport.clone())?;
    info!(endpoint = %config.endpoint, framing = %config.framing, "connected");
    Ok(transport)
}
