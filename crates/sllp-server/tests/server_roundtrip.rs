use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use sllp_frame::{
    decode_frame, ControlReply, Request, Response, CONTROL_MESSAGE_END, VARIABLE_MESSAGE_END,
};
use sllp_server::{Device, DeviceConfig, Server, SimulatedSupply};
use sllp_transport::{Endpoint, StreamTransport, Transport};

const TIMEOUT: Duration = Duration::from_secs(2);

fn tcp_any() -> Endpoint {
    Endpoint::Tcp("127.0.0.1:0".to_string())
}

fn call(link: &mut StreamTransport, request: Request) -> Response {
    let frame = request.to_frame().to_bytes().expect("request should encode");
    let reply = link
        .write_read(&frame, VARIABLE_MESSAGE_END, TIMEOUT)
        .expect("server should reply");
    assert!(reply.eom);
    Response::from_frame(&decode_frame(&reply.bytes).expect("reply should decode"))
        .expect("reply should parse")
}

#[test]
fn device_serves_two_clients_sharing_state() {
    let device = Device::new(&DeviceConfig::default()).expect("default device is valid");
    let server = Server::bind(&tcp_any(), device).expect("server should bind");
    let endpoint = server.endpoint().clone();
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());

    let mut first = StreamTransport::connect(endpoint.clone()).expect("first client connects");
    let mut second = StreamTransport::connect(endpoint).expect("second client connects");

    let write = Request::WriteVariable {
        id: 5,
        value: bytes::Bytes::from_static(&[0x07]),
    };
    assert_eq!(call(&mut first, write), Response::Ok);
    assert_eq!(
        call(&mut second, Request::ReadVariable(5)),
        Response::VariableReading(bytes::Bytes::from_static(&[0x07]))
    );

    stop.store(false, Ordering::SeqCst);
    worker
        .join()
        .expect("server thread should not panic")
        .expect("serve should end cleanly");
}

#[test]
fn supply_answers_control_records() {
    let server = Server::bind(&tcp_any(), SimulatedSupply::default()).expect("server should bind");
    let endpoint = server.endpoint().clone();
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());

    let mut link = StreamTransport::connect(endpoint).expect("client connects");
    let reply = link
        .write_read(b"FDB:41:5.0000\r", CONTROL_MESSAGE_END, TIMEOUT)
        .expect("supply should reply");
    let parsed = ControlReply::parse(&reply.bytes).expect("reply should parse");
    assert_eq!(parsed.status, 0x01);
    assert_eq!(parsed.setpoint, 5.0);
    assert_eq!(parsed.readback, 5.0);

    stop.store(false, Ordering::SeqCst);
    worker.join().expect("no panic").expect("clean stop");
}

#[cfg(unix)]
#[test]
fn unix_socket_endpoint_round_trip() {
    let dir = std::env::temp_dir().join(format!(
        "sllp-server-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("device.sock");
    let endpoint = Endpoint::Unix(path.clone());

    let device = Device::new(&DeviceConfig::default()).expect("default device is valid");
    let server = Server::bind(&endpoint, device).expect("server should bind");
    let stop = server.stop_handle();
    let worker = thread::spawn(move || server.serve());

    let mut link = StreamTransport::connect(endpoint).expect("client connects");
    match call(&mut link, Request::QueryVariables) {
        Response::VariableList(vars) => assert_eq!(vars.len(), 6),
        other => panic!("unexpected reply: {other:?}"),
    }
    drop(link);

    stop.store(false, Ordering::SeqCst);
    worker.join().expect("no panic").expect("clean stop");
    assert!(!path.exists(), "socket file should be removed on shutdown");
}
