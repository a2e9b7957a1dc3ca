use std::sync::Arc;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::Registry;

use crate::{client::StatsdClient, storage::StatsdStorage};

/// A recorder that sends metrics from the `metrics` facade through a [`StatsdClient`].
///
/// Counters are sent as counts, gauges as absolute gauge values, and histograms as timings. Metric labels are sent as
/// DogStatsD-style tags.
pub struct StatsdRecorder {
    client: StatsdClient,
    registry: Registry<Key, StatsdStorage>,
}

impl StatsdRecorder {
    pub(crate) fn new(client: StatsdClient) -> Self {
        let registry = Registry::new(StatsdStorage::new(client.clone()));
        StatsdRecorder { client, registry }
    }

    /// Returns the client that this recorder sends metrics through.
    pub fn client(&self) -> &StatsdClient {
        &self.client
    }
}

impl Recorder for StatsdRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |existing| Counter::from_arc(Arc::clone(existing)))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |existing| Gauge::from_arc(Arc::clone(existing)))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |existing| Histogram::from_arc(Arc::clone(existing)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use metrics::{Key, Label, Level, Metadata, Recorder as _};

    use crate::{
        client::StatsdClient,
        queue::{bounded_queue, Consumer},
        telemetry::Telemetry,
    };

    use super::StatsdRecorder;

    static METADATA: Metadata<'static> = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

    fn detached() -> (StatsdRecorder, Consumer) {
        let (producer, consumer) = bounded_queue(64);
        let client = StatsdClient::new(producer, Arc::new(Telemetry::default()), None);
        (StatsdRecorder::new(client), consumer)
    }

    fn drain(consumer: &Consumer) -> Vec<String> {
        std::iter::from_fn(|| consumer.try_dequeue()).collect()
    }

    #[test]
    fn counter() {
        let (recorder, consumer) = detached();
        let counter = recorder.register_counter(&Key::from("requests"), &METADATA);
        counter.increment(3);
        counter.absolute(42);

        assert_eq!(drain(&consumer), vec!["requests:3.000000|c", "requests:42.000000|g"]);
    }

    #[test]
    fn gauge_tracks_value_across_handles() {
        let (recorder, consumer) = detached();
        let key = Key::from_parts("connections", &[("pool", "primary")]);

        let first = recorder.register_gauge(&key, &METADATA);
        let second = recorder.register_gauge(&key, &METADATA);
        first.set(10.0);
        second.increment(2.5);
        first.decrement(0.5);

        assert_eq!(
            drain(&consumer),
            vec![
                "connections:10.000000|g|#pool:primary",
                "connections:12.500000|g|#pool:primary",
                "connections:12.000000|g|#pool:primary",
            ]
        );
    }

    #[test]
    fn histogram_with_labels() {
        let (recorder, consumer) = detached();
        let key = Key::from_parts("latency", vec![Label::new("route", "/"), Label::new("cached", "")]);
        recorder.register_histogram(&key, &METADATA).record(12.5);

        assert_eq!(drain(&consumer), vec!["latency:12.500000|ms|#route:/,cached"]);
    }

    #[test]
    fn distinct_keys_are_distinct_gauges() {
        let (recorder, consumer) = detached();
        recorder.register_gauge(&Key::from("a"), &METADATA).increment(1.0);
        recorder.register_gauge(&Key::from("b"), &METADATA).increment(1.0);
        recorder.register_gauge(&Key::from("a"), &METADATA).increment(1.0);

        assert_eq!(drain(&consumer), vec!["a:1.000000|g", "b:1.000000|g", "a:2.000000|g"]);
    }
}
