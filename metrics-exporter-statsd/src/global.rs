//! Process-wide default client.
//!
//! Nothing is started implicitly: until [`start`] (or [`start_with`]) is called, the free functions in this module
//! do nothing. Starting again replaces the default client, and the previous one is shut down, so that its queued
//! metrics are still sent rather than left behind.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! metrics_exporter_statsd::global::start("127.0.0.1:8125").expect("failed to start statsd client");
//!
//! metrics_exporter_statsd::global::count("page.views", 1.0);
//! metrics_exporter_statsd::global::timer("request.latency", Duration::from_millis(320));
//!
//! metrics_exporter_statsd::global::shutdown();
//! ```

use std::time::{Duration, Instant};

use parking_lot::{const_rwlock, RwLock};
use tracing::debug;

use crate::{BuildError, StatsdBuilder, StatsdClient};

static DEFAULT_CLIENT: RwLock<Option<StatsdClient>> = const_rwlock(None);

/// Starts a default client sending to the given address, replacing any existing default client.
///
/// # Errors
///
/// If the address is invalid, or the client cannot be built, an error is returned and any existing default client is
/// left in place.
pub fn start<A>(address: A) -> Result<(), BuildError>
where
    A: AsRef<str>,
{
    start_with(StatsdBuilder::default().with_remote_address(address)?)
}

/// Starts a default client from the given builder, replacing any existing default client.
///
/// # Errors
///
/// If the client cannot be built, an error is returned and any existing default client is left in place.
pub fn start_with(builder: StatsdBuilder) -> Result<(), BuildError> {
    let client = builder.build()?;
    let previous = DEFAULT_CLIENT.write().replace(client);

    // Shut down outside of the lock, so callers are never held up while the previous client drains.
    if let Some(previous) = previous {
        debug!("Replacing default statsd client.");
        previous.shutdown();
    }

    Ok(())
}

/// Shuts down and removes the default client, if any.
///
/// Metrics already queued are sent before this returns.
pub fn shutdown() {
    let previous = DEFAULT_CLIENT.write().take();
    if let Some(previous) = previous {
        previous.shutdown();
    }
}

/// Returns a handle to the default client, if one is running.
pub fn client() -> Option<StatsdClient> {
    DEFAULT_CLIENT.read().clone()
}

fn with_client<F>(f: F)
where
    F: FnOnce(&StatsdClient),
{
    // The guard is released before `f` runs, so a concurrent `start` or `shutdown` never waits on producers.
    if let Some(client) = client() {
        f(&client);
    }
}

/// Increments a counter on the default client.
pub fn count(name: &str, value: f64) {
    with_client(|client| client.count(name, value));
}

/// Increments a counter on the default client, sampled at the given rate.
pub fn count_with_rate(name: &str, value: f64, rate: f64) {
    with_client(|client| client.count_with_rate(name, value, rate));
}

/// Sets a gauge on the default client.
pub fn gauge(name: &str, value: f64) {
    with_client(|client| client.gauge(name, value));
}

/// Records a histogram value on the default client.
pub fn histogram(name: &str, value: f64) {
    with_client(|client| client.histogram(name, value));
}

/// Records a histogram value on the default client, sampled at the given rate.
pub fn histogram_with_rate(name: &str, value: f64, rate: f64) {
    with_client(|client| client.histogram_with_rate(name, value, rate));
}

/// Records a duration on the default client.
pub fn timer(name: &str, duration: Duration) {
    with_client(|client| client.timer(name, duration));
}

/// Records a duration on the default client, sampled at the given rate.
pub fn timer_with_rate(name: &str, duration: Duration, rate: f64) {
    with_client(|client| client.timer_with_rate(name, duration, rate));
}

/// Records the time elapsed since `start` on the default client.
pub fn time_since(name: &str, start: Instant) {
    with_client(|client| client.time_since(name, start));
}

/// Records the time elapsed since `start` on the default client, sampled at the given rate.
pub fn time_since_with_rate(name: &str, start: Instant, rate: f64) {
    with_client(|client| client.time_since_with_rate(name, start, rate));
}

/// Runs `f`, recording how long it took on the default client.
///
/// `f` always runs, even when no default client is running.
pub fn time<F, R>(name: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    time_with_rate(name, 1.0, f)
}

/// Runs `f`, recording how long it took on the default client, sampled at the given rate.
///
/// `f` always runs, even when no default client is running.
pub fn time_with_rate<F, R>(name: &str, rate: f64, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = f();
    time_since_with_rate(name, start, rate);
    result
}

/// Records a set member on the default client.
pub fn set(name: &str, value: f64) {
    with_client(|client| client.set(name, value));
}
