//! A fire-and-forget client for sending metrics to a [statsd][statsd]-compatible server.
//!
//! [statsd]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
//!
//! # Usage
//!
//! ```no_run
//! # use std::time::Duration;
//! # use metrics_exporter_statsd::StatsdBuilder;
//! // First, create a builder.
//! //
//! // The builder can configure the remote address, the size of the outbound queue, how long writes may take, and how
//! // aggressively the forwarder reconnects after a failure.
//! let client = StatsdBuilder::default()
//!     .with_remote_address("127.0.0.1:8125")
//!     .expect("failed to parse remote address")
//!     .build()
//!     .expect("failed to build statsd client");
//!
//! // Then, record metrics. None of these calls block on the network, and none of them can fail.
//! client.count("page.views", 1.0);
//! client.count_with_rate("page.views", 1.0, 0.5);
//! client.gauge("fuel.level", 0.5);
//! client.timer("request.latency", Duration::from_millis(320));
//! client.set("users.uniques", 1234.0);
//!
//! // Finally, shut down the client to send anything still queued.
//! client.shutdown();
//! ```
//!
//! The client can also be installed as the global recorder for the [`metrics`] facade with
//! [`StatsdBuilder::install`], and a process-wide default client is available in [`global`].
//!
//! # Behavior
//!
//! ## Non-blocking call sites
//!
//! Every metric is encoded at the call site and handed to a bounded queue. A single background thread drains the
//! queue and sends each metric as its own datagram. Once the queue is 90% full, new metrics are dropped rather than
//! making the caller wait.
//!
//! ## Sampling
//!
//! Counters and timings can be sampled at a rate between 0 and 1. Sampled metrics carry the rate (`|@0.500000`) so
//! the server can scale them back up. Gauges and sets are never sampled.
//!
//! ## Failure handling
//!
//! Nothing is ever acknowledged by the server, and no error ever reaches the caller. When a write fails, the metric
//! being written is dropped and the connection is re-established. If that fails too, the forwarder backs off
//! exponentially between attempts, dropping metrics in the meantime.
//!
//! ## Transports
//!
//! UDP (`<host>:<port>`) is supported everywhere, and Unix domain datagram sockets (`unixgram://<path>`) on Linux.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod client;
pub use self::client::StatsdClient;

mod forwarder;
pub mod global;
mod queue;

mod recorder;
pub use self::recorder::StatsdRecorder;

pub mod sampler;
mod storage;

mod telemetry;
pub use self::telemetry::TelemetrySnapshot;

pub mod writer;
