use std::time::{Duration, Instant};

use metrics_exporter_statsd::StatsdBuilder;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

fn main() {
    tracing_subscriber::fmt::init();

    let client = StatsdBuilder::default()
        .with_remote_address("localhost:8125")
        .expect("failed to parse remote address")
        .with_queue_capacity(1024)
        .build()
        .expect("failed to build statsd client");

    let mut rng = Xoshiro256StarStar::try_from_rng(&mut rand::rng()).unwrap();
    let started = Instant::now();

    // Pretend to serve requests for a little while.
    while started.elapsed() < Duration::from_secs(30) {
        let latency = client.time("request.handle", || {
            let latency = Duration::from_millis(rng.random_range(1..50));
            std::thread::sleep(latency);
            latency
        });

        client.count("request.count", 1.0);
        client.count_with_rate("request.bytes", rng.random_range(100.0..10_000.0), 0.1);
        client.gauge("request.last_latency_ms", latency.as_millis() as f64);
        client.set("request.users", f64::from(rng.random_range(0u32..100)));
    }

    let telemetry = client.telemetry();
    client.shutdown();

    println!("sent {} packets, lost {} payloads", telemetry.packets_sent, telemetry.payloads_lost());
}
