use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use sllp_client::{connect, Client, ClientConfig, ClientError, TransactionConfig};
use sllp_frame::Framing;
use sllp_server::{Device, DeviceConfig, Server, SimulatedSupply};
use sllp_transport::Endpoint;

fn tcp_any() -> Endpoint {
    Endpoint::Tcp("127.0.0.1:0".to_string())
}

fn config(endpoint: Endpoint, framing: Framing) -> ClientConfig {
    let mut config = ClientConfig::new(endpoint, framing);
    config.transaction = TransactionConfig {
        timeout: Duration::from_millis(500),
        ..TransactionConfig::default()
    };
    config
}

#[test]
fn supply_over_tcp() {
    let server = Server::bind(&tcp_any(), SimulatedSupply::default()).expect("server should bind");
    let endpoint = server.endpoint().clone();
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());

    let client = connect(&config(endpoint, Framing::Control)).expect("client should connect");
    assert_eq!(client.framing(), Framing::Control);
    let Client::Supply(mut supply) = client else {
        panic!("control framing should yield a supply client");
    };

    supply.set_power(true).expect("power on");
    supply.set_current(2.5).expect("setpoint");
    assert!(supply.power_on());
    assert_eq!(supply.readback(), 2.5);
    assert_eq!(supply.stats().retries, 0);
    assert!(supply.stats().time_max > 0.0);

    stop.store(false, Ordering::SeqCst);
    worker.join().expect("no panic").expect("clean stop");
}

#[test]
fn device_over_tcp() {
    let device = Device::new(&DeviceConfig::default()).expect("default device is valid");
    let server = Server::bind(&tcp_any(), device).expect("server should bind");
    let endpoint = server.endpoint().clone();
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());

    let Client::Device(mut device) =
        connect(&config(endpoint, Framing::Variable)).expect("client should connect")
    else {
        panic!("variable framing should yield a device client");
    };

    let version = device.query_status().expect("status");
    assert_eq!(version.to_string(), "1.0.0");
    let catalog = device.load_catalog().expect("catalog");
    assert_eq!(catalog.variables.len(), 6);
    device.write_variable(5, &[0x07]).expect("write");
    assert_eq!(device.read_variable(5).expect("read").as_ref(), &[0x07]);

    stop.store(false, Ordering::SeqCst);
    worker.join().expect("no panic").expect("clean stop");
}

#[test]
fn server_gone_is_no_reply_or_reconnect_failure() {
    let server = Server::bind(&tcp_any(), SimulatedSupply::default()).expect("server should bind");
    let endpoint = server.endpoint().clone();
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());

    let Client::Supply(mut supply) =
        connect(&config(endpoint, Framing::Control)).expect("client should connect")
    else {
        panic!("control framing should yield a supply client");
    };
    supply.refresh().expect("first exchange");

    stop.store(false, Ordering::SeqCst);
    worker.join().expect("no panic").expect("clean stop");

    let err = supply.set_current(1.0).unwrap_err();
    assert!(
        matches!(
            err,
            ClientError::ReconnectFailed { .. } | ClientError::NoReply { .. }
        ),
        "{err:?}"
    );
    assert_eq!(supply.stats().no_replies, 1);
    assert_eq!(supply.setpoint(), 0.0);
}
