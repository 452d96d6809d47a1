//! Drive a simulated power supply over TCP.
//!
//! Run with:
//!   cargo run --example supply-session
//!
//! The same simulator is available from the CLI:
//!   cargo run -- simulate 127.0.0.1:6791 --framing control
//!   cargo run -- supply 127.0.0.1:6791 set 2.5

use std::thread;

use sllp::client::{connect_supply, ClientConfig};
use sllp::frame::Framing;
use sllp::server::{Server, SimulatedSupply};
use sllp::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(&"127.0.0.1:0".parse::<Endpoint>()?, SimulatedSupply::new(0.5))?;
    let endpoint = server.endpoint().clone();
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());
    eprintln!("Simulator on {endpoint}");

    let mut supply = connect_supply(&ClientConfig::new(endpoint, Framing::Control))?;
    supply.set_power(true)?;
    supply.set_slew(true)?;
    for _ in 0..4 {
        supply.set_current(2.0)?;
        eprintln!(
            "setpoint {:.4} readback {:.4}",
            supply.setpoint(),
            supply.readback()
        );
    }
    supply.set_power(false)?;
    eprintln!("{}", supply.stats());

    stop.store(false, std::sync::atomic::Ordering::SeqCst);
    if let Ok(result) = worker.join() {
        result?;
    }
    Ok(())
}
