use std::{io, sync::Arc, time::Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, error, trace, warn};

use crate::{
    queue::{Consumer, Dequeued},
    telemetry::Telemetry,
};

use super::{Backoff, Connection as _, Connector};

enum ClientState<T> {
    // Intermediate state during send attempts.
    Inconsistent,

    // Forwarder is disconnected, and won't try to reconnect before `retry_at`.
    Disconnected { retry_at: Instant },

    // Forwarder is connected and ready to send metrics.
    Ready(T),
}

/// Why a payload did not make it onto the wire.
#[derive(Debug)]
enum SendFailure {
    /// Writing to the connection failed.
    Write(io::Error),

    /// No connection was available.
    Disconnected,
}

/// Drains the outbound queue, writing each payload to the collector.
///
/// A failed write drops the payload, and the connection is immediately re-established. If re-establishing fails, the
/// forwarder backs off: payloads that arrive before the backoff deadline are dropped without a connection attempt, and
/// the first payload after the deadline triggers the next attempt.
pub(crate) struct Forwarder<C: Connector> {
    connector: C,
    client_state: ClientState<C::Connection>,
    backoff: Backoff,
    consumer: Consumer,
    shutdown: Receiver<()>,
    telemetry: Arc<Telemetry>,
}

impl<C: Connector> Forwarder<C> {
    /// Create a new synchronous `Forwarder` around an already-established connection.
    pub fn new(
        connector: C,
        connection: C::Connection,
        backoff: Backoff,
        consumer: Consumer,
        shutdown: Receiver<()>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Forwarder {
            connector,
            client_state: ClientState::Ready(connection),
            backoff,
            consumer,
            shutdown,
            telemetry,
        }
    }

    /// Establishes a fresh connection, or moves to the disconnected state if that fails.
    fn reconnect(&mut self) -> ClientState<C::Connection> {
        match self.connector.connect() {
            Ok(client) => {
                debug!("Reconnected to remote server.");
                self.backoff.reset();
                self.telemetry.track_reconnect();
                ClientState::Ready(client)
            }
            Err(e) => {
                let retry_in = self.backoff.current();
                let retry_at = self.backoff.failed(Instant::now());
                error!(error = %e, ?retry_in, "Failed to reconnect to remote server.");
                self.telemetry.track_reconnect_failed();
                ClientState::Disconnected { retry_at }
            }
        }
    }

    fn try_send(&mut self, payload: &[u8]) -> Result<usize, SendFailure> {
        loop {
            let old_state = std::mem::replace(&mut self.client_state, ClientState::Inconsistent);
            match old_state {
                ClientState::Inconsistent => unreachable!("transitioned _from_ inconsistent state"),
                ClientState::Disconnected { retry_at } => {
                    if Instant::now() < retry_at {
                        self.client_state = ClientState::Disconnected { retry_at };
                        return Err(SendFailure::Disconnected);
                    }

                    self.client_state = self.reconnect();
                    if let ClientState::Disconnected { .. } = self.client_state {
                        return Err(SendFailure::Disconnected);
                    }
                }
                ClientState::Ready(mut client) => {
                    return match client.send(payload) {
                        Ok(n) => {
                            self.client_state = ClientState::Ready(client);
                            Ok(n)
                        }
                        Err(e) => {
                            // The old handle is no longer trusted; replace it right away. The payload itself is not
                            // retried.
                            drop(client);
                            self.client_state = self.reconnect();
                            Err(SendFailure::Write(e))
                        }
                    };
                }
            }
        }
    }

    fn forward(&mut self, payload: &str) {
        match self.try_send(payload.as_bytes()) {
            Ok(_) => {
                trace!(payload, "Sent payload.");
                self.telemetry.track_packet_send_succeeded(payload.len());
            }
            Err(SendFailure::Write(e)) => {
                warn!(error = %e, "Failed to send payload.");
                self.telemetry.track_packet_send_failed();
            }
            Err(SendFailure::Disconnected) => {
                trace!(payload, "Dropped payload while disconnected.");
                self.telemetry.track_packet_dropped_disconnected();
            }
        }
    }

    /// Sends every payload that was queued at the time of the call.
    fn drain(&mut self) {
        let pending = self.consumer.len();
        debug!(pending, "Draining queued payloads before shutdown.");

        for _ in 0..pending {
            match self.consumer.try_dequeue() {
                Some(payload) => self.forward(&payload),
                None => break,
            }
        }
    }

    /// Run the forwarder until shutdown is signalled or every client handle is dropped.
    pub fn run(mut self) {
        debug!("Forwarder started.");

        loop {
            match self.consumer.dequeue_blocking(&self.shutdown) {
                Dequeued::Payload(payload) => self.forward(&payload),
                Dequeued::Shutdown => {
                    self.drain();
                    break;
                }
                Dequeued::Closed => {
                    debug!("All client handles dropped.");
                    break;
                }
            }
        }

        debug!("Forwarder stopped.");
    }
}
