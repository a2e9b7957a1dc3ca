use std::sync::{
    atomic::{
        AtomicU64,
        Ordering::{AcqRel, Acquire, Release},
    },
    Arc,
};

use metrics::{CounterFn, GaugeFn, HistogramFn, Key, Label};
use metrics_util::registry::Storage;

use crate::{client::StatsdClient, writer::MetricType};

/// Name and tags of a registered metric.
struct Identity {
    name: String,
    labels: Vec<Label>,
}

impl Identity {
    fn from_key(key: &Key) -> Self {
        Self { name: key.name().to_string(), labels: key.labels().cloned().collect() }
    }
}

/// Counter handle that sends every update straight to the client.
pub(crate) struct StatsdCounter {
    client: StatsdClient,
    identity: Identity,
}

impl CounterFn for StatsdCounter {
    fn increment(&self, value: u64) {
        self.client.submit(&self.identity.name, value as f64, MetricType::Counter, 1.0, &self.identity.labels);
    }

    fn absolute(&self, value: u64) {
        // Statsd has no notion of an absolute counter, so the closest match is a gauge.
        self.client.submit(&self.identity.name, value as f64, MetricType::Gauge, 1.0, &self.identity.labels);
    }
}

/// Gauge handle that tracks the current value locally and sends it on every update.
///
/// Increments and decrements are applied to the local value, and the result is sent as an absolute gauge value, so
/// that the collector never has to deal with relative updates.
pub(crate) struct StatsdGauge {
    client: StatsdClient,
    identity: Identity,
    value: AtomicU64,
}

impl StatsdGauge {
    fn update<F>(&self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        let previous =
            match self.value.fetch_update(AcqRel, Acquire, |current| Some(f(f64::from_bits(current)).to_bits())) {
                Ok(previous) | Err(previous) => previous,
            };

        self.send(f(f64::from_bits(previous)));
    }

    fn send(&self, value: f64) {
        self.client.submit(&self.identity.name, value, MetricType::Gauge, 1.0, &self.identity.labels);
    }
}

impl GaugeFn for StatsdGauge {
    fn increment(&self, value: f64) {
        self.update(|current| current + value);
    }

    fn decrement(&self, value: f64) {
        self.update(|current| current - value);
    }

    fn set(&self, value: f64) {
        self.value.store(value.to_bits(), Release);
        self.send(value);
    }
}

/// Histogram handle that sends every recorded value as a timing.
pub(crate) struct StatsdHistogram {
    client: StatsdClient,
    identity: Identity,
}

impl HistogramFn for StatsdHistogram {
    fn record(&self, value: f64) {
        self.client.submit(&self.identity.name, value, MetricType::Timing, 1.0, &self.identity.labels);
    }
}

/// Pass-through metrics storage.
///
/// Nothing is aggregated: each handle forwards every update to the client as its own payload. The registry only
/// exists so that all handles for the same key share one local gauge value.
pub(crate) struct StatsdStorage {
    client: StatsdClient,
}

impl StatsdStorage {
    pub fn new(client: StatsdClient) -> Self {
        Self { client }
    }
}

impl Storage<Key> for StatsdStorage {
    type Counter = Arc<StatsdCounter>;
    type Gauge = Arc<StatsdGauge>;
    type Histogram = Arc<StatsdHistogram>;

    fn counter(&self, key: &Key) -> Self::Counter {
        Arc::new(StatsdCounter { client: self.client.clone(), identity: Identity::from_key(key) })
    }

    fn gauge(&self, key: &Key) -> Self::Gauge {
        Arc::new(StatsdGauge {
            client: self.client.clone(),
            identity: Identity::from_key(key),
            value: AtomicU64::new(0.0f64.to_bits()),
        })
    }

    fn histogram(&self, key: &Key) -> Self::Histogram {
        Arc::new(StatsdHistogram { client: self.client.clone(), identity: Identity::from_key(key) })
    }
}
