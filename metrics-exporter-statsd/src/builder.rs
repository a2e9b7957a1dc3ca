use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use crossbeam_channel::bounded;
use thiserror::Error;
use tracing::debug;

use crate::{
    client::{ForwarderHandle, StatsdClient},
    forwarder::{sync::Forwarder, Connector as _, ForwarderConfiguration, RemoteAddr},
    queue::bounded_queue,
    recorder::StatsdRecorder,
    telemetry::Telemetry,
};

const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(10);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Errors that could occur while building or installing a statsd client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// The outbound queue capacity was zero.
    #[error("queue capacity must be greater than zero")]
    InvalidQueueCapacity,

    /// The write timeout was zero.
    #[error("write timeout must be greater than zero")]
    InvalidWriteTimeout,

    /// Failed to establish the initial transport connection.
    #[error("failed to establish transport to remote server: {0}")]
    Transport(#[source] io::Error),

    /// Failed to spawn the background forwarder thread.
    #[error("failed to spawn background thread for forwarder")]
    Backend,

    /// Failed to install the recorder due to an existing global recorder already being installed.
    #[error("failed to install exporter as global recorder")]
    FailedToInstall,
}

/// Builder for a statsd client.
pub struct StatsdBuilder {
    remote_addr: RemoteAddr,
    queue_capacity: usize,
    write_timeout: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
}

impl StatsdBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// For UDP, the address simply needs to be in the format of `<host>:<port>`, optionally prefixed with `udp://`.
    /// For Unix domain sockets (Linux only), use `unixgram://<path>`.
    ///
    /// Defaults to sending to `127.0.0.1:8125` over UDP.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addr = RemoteAddr::try_from(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the capacity of the outbound queue.
    ///
    /// Once the queue is 90% full, new metrics are dropped until the forwarder catches up. A larger queue absorbs
    /// longer bursts at the cost of memory.
    ///
    /// Defaults to 100,000.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the payload being sent at the time is dropped without retrying, and the
    /// connection is re-established.
    ///
    /// The timeout must be non-zero, which is checked when the client is built.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the backoff between reconnect attempts.
    ///
    /// After a failed write, the forwarder immediately tries to reconnect. If that fails, it waits `initial` before
    /// trying again, doubling the wait after each further failure up to `max`. Metrics that arrive while waiting are
    /// dropped. Setting both to zero retries on every metric.
    ///
    /// Defaults to 10 milliseconds initially, and 5 seconds at most.
    #[must_use]
    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    /// Builds the client.
    ///
    /// The transport is established and a background thread is spawned to forward metrics to the remote server.
    ///
    /// # Errors
    ///
    /// If the queue capacity or write timeout is zero, if the transport cannot be established, or if the background
    /// thread cannot be spawned, an error will be returned.
    pub fn build(self) -> Result<StatsdClient, BuildError> {
        if self.queue_capacity == 0 {
            return Err(BuildError::InvalidQueueCapacity);
        }

        if self.write_timeout.is_zero() {
            return Err(BuildError::InvalidWriteTimeout);
        }

        let forwarder_config = ForwarderConfiguration {
            remote_addr: self.remote_addr,
            write_timeout: self.write_timeout,
            backoff_initial: self.backoff_initial,
            backoff_max: self.backoff_max,
        };
        let connection = forwarder_config.connect().map_err(BuildError::Transport)?;

        let (producer, consumer) = bounded_queue(self.queue_capacity);
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let telemetry = Arc::new(Telemetry::default());

        debug!(
            transport = forwarder_config.remote_addr.transport_id(),
            queue_capacity = producer.capacity(),
            "Starting statsd forwarder."
        );

        let backoff = forwarder_config.backoff();
        let forwarder = Forwarder::new(
            forwarder_config,
            connection,
            backoff,
            consumer,
            shutdown_rx,
            Arc::clone(&telemetry),
        );

        let thread = std::thread::Builder::new()
            .name("metrics-exporter-statsd-forwarder".to_string())
            .spawn(move || forwarder.run())
            .map_err(|_| BuildError::Backend)?;

        Ok(StatsdClient::new(producer, telemetry, Some(ForwarderHandle::new(shutdown_tx, thread))))
    }

    /// Builds the client, wrapped in a recorder for use with the `metrics` facade.
    ///
    /// # Errors
    ///
    /// See [`build`][Self::build].
    pub fn build_recorder(self) -> Result<StatsdRecorder, BuildError> {
        self.build().map(StatsdRecorder::new)
    }

    /// Builds the client and installs it as the global `metrics` recorder.
    ///
    /// The returned client shares its queue and forwarder with the installed recorder, and can be used both to send
    /// metrics directly and to shut the forwarder down.
    ///
    /// # Errors
    ///
    /// If the client cannot be built, or if a global recorder is already installed, an error will be returned.
    pub fn install(self) -> Result<StatsdClient, BuildError> {
        let client = self.build()?;
        let recorder = StatsdRecorder::new(client.clone());

        if metrics::set_global_recorder(recorder).is_err() {
            client.shutdown();
            return Err(BuildError::FailedToInstall);
        }

        Ok(client)
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            remote_addr: RemoteAddr::Udp(vec![SocketAddr::from(([127, 0, 0, 1], 8125))]),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}
