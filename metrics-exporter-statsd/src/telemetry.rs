use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Client telemetry.
///
/// `Telemetry` counts what happened to payloads on their way from call sites to the network: how many were queued,
/// sampled out, dropped, or sent, and how often the forwarder had to reconnect. It is shared between the client
/// handles and the forwarder, and is purely observational.
#[derive(Default)]
pub(crate) struct Telemetry {
    payloads_enqueued: AtomicU64,
    payloads_dropped_queue_full: AtomicU64,
    payloads_dropped_closed: AtomicU64,
    payloads_sampled_out: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_dropped_writer: AtomicU64,
    packets_dropped_disconnected: AtomicU64,
    reconnects: AtomicU64,
    reconnect_failures: AtomicU64,
}

impl Telemetry {
    /// Tracks a payload admitted to the outbound queue.
    pub fn track_enqueued(&self) {
        self.payloads_enqueued.fetch_add(1, Relaxed);
    }

    /// Tracks a payload dropped because the outbound queue was too full.
    pub fn track_queue_full(&self) {
        self.payloads_dropped_queue_full.fetch_add(1, Relaxed);
    }

    /// Tracks a payload dropped because the forwarder had already stopped.
    pub fn track_queue_closed(&self) {
        self.payloads_dropped_closed.fetch_add(1, Relaxed);
    }

    /// Tracks a payload suppressed by sampling.
    pub fn track_sampled_out(&self) {
        self.payloads_sampled_out.fetch_add(1, Relaxed);
    }

    /// Tracks a successful packet send.
    pub fn track_packet_send_succeeded(&self, bytes_len: usize) {
        self.packets_sent.fetch_add(1, Relaxed);
        self.bytes_sent.fetch_add(bytes_len as u64, Relaxed);
    }

    /// Tracks a failed packet send.
    pub fn track_packet_send_failed(&self) {
        self.packets_dropped_writer.fetch_add(1, Relaxed);
    }

    /// Tracks a packet dropped while waiting to reconnect.
    pub fn track_packet_dropped_disconnected(&self) {
        self.packets_dropped_disconnected.fetch_add(1, Relaxed);
    }

    /// Tracks a successful reconnect.
    pub fn track_reconnect(&self) {
        self.reconnects.fetch_add(1, Relaxed);
    }

    /// Tracks a failed reconnect attempt.
    pub fn track_reconnect_failed(&self) {
        self.reconnect_failures.fetch_add(1, Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            payloads_enqueued: self.payloads_enqueued.load(Relaxed),
            payloads_dropped_queue_full: self.payloads_dropped_queue_full.load(Relaxed),
            payloads_dropped_closed: self.payloads_dropped_closed.load(Relaxed),
            payloads_sampled_out: self.payloads_sampled_out.load(Relaxed),
            packets_sent: self.packets_sent.load(Relaxed),
            bytes_sent: self.bytes_sent.load(Relaxed),
            packets_dropped_writer: self.packets_dropped_writer.load(Relaxed),
            packets_dropped_disconnected: self.packets_dropped_disconnected.load(Relaxed),
            reconnects: self.reconnects.load(Relaxed),
            reconnect_failures: self.reconnect_failures.load(Relaxed),
        }
    }
}

/// A point-in-time copy of the client telemetry.
///
/// Counters are loaded individually, so a snapshot taken while metrics are in flight may not be perfectly consistent
/// across fields.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TelemetrySnapshot {
    /// Payloads admitted to the outbound queue.
    pub payloads_enqueued: u64,

    /// Payloads dropped by backpressure before reaching the outbound queue.
    pub payloads_dropped_queue_full: u64,

    /// Payloads dropped because the forwarder had already stopped, either after shutdown or after it exited
    /// unexpectedly.
    pub payloads_dropped_closed: u64,

    /// Payloads suppressed by sampling.
    pub payloads_sampled_out: u64,

    /// Packets written to the transport.
    pub packets_sent: u64,

    /// Bytes written to the transport.
    pub bytes_sent: u64,

    /// Packets lost because the transport write failed.
    pub packets_dropped_writer: u64,

    /// Packets lost because the forwarder was disconnected and waiting to reconnect.
    pub packets_dropped_disconnected: u64,

    /// Successful reconnects after a failed write.
    pub reconnects: u64,

    /// Failed reconnect attempts.
    pub reconnect_failures: u64,
}

impl TelemetrySnapshot {
    /// Returns the total number of payloads that were lost after being produced, for any reason other than sampling.
    pub fn payloads_lost(&self) -> u64 {
        self.payloads_dropped_queue_full
            + self.payloads_dropped_closed
            + self.packets_dropped_writer
            + self.packets_dropped_disconnected
    }
}
