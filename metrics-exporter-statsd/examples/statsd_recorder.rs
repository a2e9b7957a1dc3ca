use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_statsd::StatsdBuilder;

fn main() {
    tracing_subscriber::fmt::init();

    let client = StatsdBuilder::default()
        .with_remote_address("localhost:8125")
        .expect("failed to parse remote address")
        .install()
        .expect("failed to install statsd recorder");

    let server_loops = counter!("tcp_server_loops", "system" => "foo");
    let server_loop_delta = histogram!("tcp_server_loop_delta_ms", "system" => "foo");

    // Loop over and over, pretending to do some work.
    let mut last = Instant::now();
    for i in 0..1_000u32 {
        server_loops.increment(1);
        server_loop_delta.record(last.elapsed().as_secs_f64() * 1000.0);
        last = Instant::now();

        if i % 4 == 0 {
            gauge!("lucky_iterations").decrement(1.0);
        } else {
            gauge!("lucky_iterations").increment(1.0);
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    client.shutdown();
}
