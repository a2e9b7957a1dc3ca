use std::{
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;
use metrics::Label;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    queue::{Enqueued, Producer},
    sampler,
    telemetry::{Telemetry, TelemetrySnapshot},
    writer::{self, MetricType},
};

/// Handle to a running forwarder, used to stop it.
pub(crate) struct ForwarderHandle {
    shutdown_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl ForwarderHandle {
    pub(crate) fn new(shutdown_tx: Sender<()>, thread: JoinHandle<()>) -> Self {
        Self { shutdown_tx, thread }
    }
}

struct Inner {
    producer: Producer,
    telemetry: Arc<Telemetry>,
    forwarder: Mutex<Option<ForwarderHandle>>,
}

impl Inner {
    fn shutdown(&self) {
        let Some(handle) = self.forwarder.lock().take() else {
            return;
        };

        // Dropping the sender is the shutdown signal.
        drop(handle.shutdown_tx);
        if handle.thread.join().is_err() {
            error!("Forwarder thread panicked before shutdown completed.");
        } else {
            debug!("Forwarder shut down.");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Signal the forwarder but don't wait on it: it drains what is queued and exits on its own.
        if let Some(handle) = self.forwarder.get_mut().take() {
            drop(handle.shutdown_tx);
        }
    }
}

/// A statsd client.
///
/// Every metric operation encodes the metric, optionally samples it, and hands it off to a bounded queue that a
/// background forwarder drains. Operations never block on I/O and never fail: payloads that are sampled out, or that
/// arrive while the queue is nearly full, are dropped silently.
///
/// `StatsdClient` is cheap to clone, and all clones share the same queue and forwarder.
#[derive(Clone)]
pub struct StatsdClient {
    inner: Arc<Inner>,
}

impl StatsdClient {
    pub(crate) fn new(producer: Producer, telemetry: Arc<Telemetry>, forwarder: Option<ForwarderHandle>) -> Self {
        StatsdClient { inner: Arc::new(Inner { producer, telemetry, forwarder: Mutex::new(forwarder) }) }
    }

    fn send(&self, payload: String) {
        match self.inner.producer.enqueue(payload) {
            Enqueued::Accepted => self.inner.telemetry.track_enqueued(),
            Enqueued::Dropped => self.inner.telemetry.track_queue_full(),
            Enqueued::Closed => self.inner.telemetry.track_queue_closed(),
        }
    }

    pub(crate) fn submit(&self, name: &str, value: f64, metric_type: MetricType, rate: f64, labels: &[Label]) {
        let payload = writer::encode(name, value, metric_type);
        let mut payload = if metric_type.is_sampled() {
            match sampler::sample(rate, payload) {
                Some(payload) => payload,
                None => {
                    self.inner.telemetry.track_sampled_out();
                    return;
                }
            }
        } else {
            payload
        };

        writer::append_tags(&mut payload, labels);
        self.send(payload);
    }

    /// Increments a counter.
    ///
    /// `page.views:1.000000|c`
    pub fn count(&self, name: &str, value: f64) {
        self.count_with_rate(name, value, 1.0);
    }

    /// Increments a counter, sampled at the given rate.
    ///
    /// `page.views:1.000000|c|@0.500000`
    pub fn count_with_rate(&self, name: &str, value: f64, rate: f64) {
        self.submit(name, value, MetricType::Counter, rate, &[]);
    }

    /// Sets a gauge.
    ///
    /// Gauges are never sampled.
    ///
    /// `fuel.level:0.500000|g`
    pub fn gauge(&self, name: &str, value: f64) {
        self.submit(name, value, MetricType::Gauge, 1.0, &[]);
    }

    /// Records a value in a histogram.
    ///
    /// `image.size:2.300000|ms`
    pub fn histogram(&self, name: &str, value: f64) {
        self.histogram_with_rate(name, value, 1.0);
    }

    /// Records a value in a histogram, sampled at the given rate.
    pub fn histogram_with_rate(&self, name: &str, value: f64, rate: f64) {
        self.submit(name, value, MetricType::Timing, rate, &[]);
    }

    /// Records a duration, in whole milliseconds.
    ///
    /// `request.latency:320.000000|ms`
    pub fn timer(&self, name: &str, duration: Duration) {
        self.timer_with_rate(name, duration, 1.0);
    }

    /// Records a duration, in whole milliseconds, sampled at the given rate.
    pub fn timer_with_rate(&self, name: &str, duration: Duration, rate: f64) {
        self.histogram_with_rate(name, duration.as_millis() as f64, rate);
    }

    /// Records the time elapsed since `start`.
    pub fn time_since(&self, name: &str, start: Instant) {
        self.time_since_with_rate(name, start, 1.0);
    }

    /// Records the time elapsed since `start`, sampled at the given rate.
    pub fn time_since_with_rate(&self, name: &str, start: Instant, rate: f64) {
        self.timer_with_rate(name, start.elapsed(), rate);
    }

    /// Runs `f`, recording how long it took.
    pub fn time<F, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.time_with_rate(name, 1.0, f)
    }

    /// Runs `f`, recording how long it took, sampled at the given rate.
    pub fn time_with_rate<F, R>(&self, name: &str, rate: f64, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.time_since_with_rate(name, start, rate);
        result
    }

    /// Records a unique occurrence of `value` in a set.
    ///
    /// Sets are never sampled.
    ///
    /// `users.uniques:1234.000000|s`
    pub fn set(&self, name: &str, value: f64) {
        self.submit(name, value, MetricType::Set, 1.0, &[]);
    }

    /// Returns a snapshot of the client telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.inner.telemetry.snapshot()
    }

    /// Returns the number of payloads waiting to be sent.
    pub fn queued(&self) -> usize {
        self.inner.producer.len()
    }

    /// Shuts down the forwarder.
    ///
    /// Payloads already queued when this is called are sent before the forwarder stops, and this method waits until
    /// that is done. Metrics recorded afterwards, through this handle or any of its clones, are dropped.
    ///
    /// Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use metrics::Label;

    use crate::{
        queue::{bounded_queue, Consumer},
        telemetry::Telemetry,
    };

    use super::{MetricType, StatsdClient};

    /// A client with no forwarder, so that tests can inspect exactly what was enqueued.
    fn detached(capacity: usize) -> (StatsdClient, Consumer) {
        let (producer, consumer) = bounded_queue(capacity);
        (StatsdClient::new(producer, Arc::new(Telemetry::default()), None), consumer)
    }

    fn drain(consumer: &Consumer) -> Vec<String> {
        std::iter::from_fn(|| consumer.try_dequeue()).collect()
    }

    #[test]
    fn count() {
        let (client, consumer) = detached(16);
        client.count("page.views", 1.0);
        assert_eq!(drain(&consumer), vec!["page.views:1.000000|c"]);
    }

    #[test]
    fn count_with_rate_samples() {
        let (client, consumer) = detached(100_000);
        for _ in 0..10_000 {
            client.count_with_rate("page.views", 1.0, 0.5);
        }

        let payloads = drain(&consumer);
        assert!(payloads.iter().all(|p| p == "page.views:1.000000|c|@0.500000"));

        // Roughly half should be sent; 4,500..5,500 is ten standard deviations either way.
        assert!((4_500..=5_500).contains(&payloads.len()), "sent {} of 10,000", payloads.len());

        let snapshot = client.telemetry();
        assert_eq!(snapshot.payloads_enqueued + snapshot.payloads_sampled_out, 10_000);
    }

    #[test]
    fn gauge_and_set_are_never_sampled() {
        let (client, consumer) = detached(16);
        client.gauge("fuel.level", 0.5);
        client.set("users.uniques", 1234.0);
        assert_eq!(drain(&consumer), vec!["fuel.level:0.500000|g", "users.uniques:1234.000000|s"]);
    }

    #[test]
    fn histogram() {
        let (client, consumer) = detached(16);
        client.histogram("image.size", 2.3);
        client.histogram_with_rate("image.size", 2.3, 0.0);
        assert_eq!(drain(&consumer), vec!["image.size:2.300000|ms"]);
        assert_eq!(client.telemetry().payloads_sampled_out, 1);
    }

    #[test]
    fn timer_converts_to_whole_milliseconds() {
        let (client, consumer) = detached(16);
        client.timer("request.latency", Duration::from_millis(320));
        client.timer("request.latency", Duration::from_micros(1_999));
        client.timer_with_rate("request.latency", Duration::from_millis(5), 1.0);
        assert_eq!(
            drain(&consumer),
            vec![
                "request.latency:320.000000|ms",
                "request.latency:1.000000|ms",
                "request.latency:5.000000|ms",
            ]
        );
    }

    #[test]
    fn time_helpers() {
        let (client, consumer) = detached(16);

        let result = client.time("work", || 42);
        assert_eq!(result, 42);

        client.time_since("since", Instant::now() - Duration::from_millis(50));

        let payloads = drain(&consumer);
        assert_eq!(payloads.len(), 2);
        assert!(payloads[0].starts_with("work:") && payloads[0].ends_with("|ms"));

        let value = payloads[1].strip_prefix("since:").and_then(|p| p.strip_suffix("|ms")).unwrap();
        assert!(value.parse::<f64>().unwrap() >= 50.0);
    }

    #[test]
    fn labels_render_as_tags() {
        let (client, consumer) = detached(16);
        let labels = [Label::new("env", "prod")];
        client.submit("m", 1.0, MetricType::Counter, 1.0, &labels);
        client.submit("m", 1.0, MetricType::Gauge, 0.0, &labels);
        assert_eq!(drain(&consumer), vec!["m:1.000000|c|#env:prod", "m:1.000000|g|#env:prod"]);
    }

    #[test]
    fn backpressure_drops_silently() {
        let (client, consumer) = detached(10);
        for i in 0..20 {
            client.gauge("g", f64::from(i));
        }

        assert_eq!(client.queued(), 9);
        let snapshot = client.telemetry();
        assert_eq!(snapshot.payloads_enqueued, 9);
        assert_eq!(snapshot.payloads_dropped_queue_full, 11);

        let expected = (0..9).map(|i| format!("g:{i}.000000|g")).collect::<Vec<_>>();
        assert_eq!(drain(&consumer), expected);
    }

    #[test]
    fn operations_do_not_block_without_a_consumer() {
        let (client, consumer) = detached(100);
        drop(consumer);

        let start = Instant::now();
        for _ in 0..10_000 {
            client.count("m", 1.0);
        }

        // Nothing is draining and nothing is listening; this is purely a bound on how long dropping takes.
        assert!(start.elapsed() < Duration::from_secs(5));
        let snapshot = client.telemetry();
        assert_eq!(snapshot.payloads_dropped_closed, 10_000);
        assert_eq!(snapshot.payloads_dropped_queue_full, 0);
    }

    #[test]
    fn shutdown_without_forwarder_is_a_no_op() {
        let (client, _consumer) = detached(16);
        client.shutdown();
        client.shutdown();
        client.count("m", 1.0);
        assert_eq!(client.queued(), 1);
    }
}
