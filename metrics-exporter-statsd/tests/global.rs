use std::{net::UdpSocket, time::Duration};

use metrics_exporter_statsd::global;

fn server() -> (UdpSocket, String) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("failed to bind server socket");
    socket.set_read_timeout(Some(Duration::from_millis(500))).expect("failed to set read timeout");
    let addr = socket.local_addr().expect("server socket has no local address").to_string();
    (socket, addr)
}

fn receive(socket: &UdpSocket) -> Option<String> {
    let mut buf = [0u8; 1024];
    let len = socket.recv(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf[..len]).into_owned())
}

// The default client is process-wide, so the whole lifecycle runs in a single test.
#[test]
fn default_client_lifecycle() {
    // Nothing is running yet, so these go nowhere, but `time` still runs the closure.
    assert!(global::client().is_none());
    global::count("before.start", 1.0);
    assert_eq!(global::time("before.start", || 42), 42);

    let (first, first_addr) = server();
    global::start(&first_addr).expect("failed to start default client");
    global::count("first", 1.0);
    global::gauge("first", 2.0);

    // Starting again hands off to the new server, and everything queued on the old client still reaches the old one.
    let (second, second_addr) = server();
    global::start(&second_addr).expect("failed to restart default client");
    assert_eq!(receive(&first).as_deref(), Some("first:1.000000|c"));
    assert_eq!(receive(&first).as_deref(), Some("first:2.000000|g"));

    global::timer("second", Duration::from_millis(5));
    global::set("second", 7.0);

    // A failed start leaves the running client in place.
    assert!(global::start("not an address").is_err());
    assert!(global::client().is_some());

    global::shutdown();
    assert!(global::client().is_none());
    assert_eq!(receive(&second).as_deref(), Some("second:5.000000|ms"));
    assert_eq!(receive(&second).as_deref(), Some("second:7.000000|s"));

    // After shutdown, nothing else is sent.
    global::count("after.shutdown", 1.0);
    assert_eq!(receive(&first), None);
    assert_eq!(receive(&second), None);
}
