use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    time::Duration,
};

#[cfg(target_os = "linux")]
use std::{os::unix::net::UnixDatagram, path::PathBuf};

mod backoff;
pub(crate) use self::backoff::Backoff;

pub(crate) mod sync;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum RemoteAddr {
    Udp(Vec<SocketAddr>),

    #[cfg(target_os = "linux")]
    Unixgram(PathBuf),
}

impl RemoteAddr {
    /// Returns the transport ID for the remote address.
    ///
    /// This is a simple acronym related to the transport that will be used for the remote address, such as `udp` for
    /// UDP, and so on.
    pub const fn transport_id(&self) -> &'static str {
        match self {
            RemoteAddr::Udp(_) => "udp",
            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(_) => "uds",
        }
    }
}

impl<'a> TryFrom<&'a str> for RemoteAddr {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        if let Some((scheme, path)) = addr.split_once("://") {
            return match scheme {
                #[cfg(target_os = "linux")]
                "unixgram" => Ok(RemoteAddr::Unixgram(PathBuf::from(path))),
                "udp" => RemoteAddr::try_from(path),
                _ => Err(format!("invalid scheme '{scheme}' (expected 'udp' or 'unixgram')")),
            };
        }

        match addr.to_socket_addrs() {
            Ok(addrs) => {
                let addrs = addrs.collect::<Vec<_>>();
                if addrs.is_empty() {
                    Err(format!("'{addr}' did not resolve to any socket addresses"))
                } else {
                    Ok(RemoteAddr::Udp(addrs))
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

/// A live, connected datagram socket to the collector.
pub(crate) trait Connection: Send {
    /// Sends a single payload as one datagram.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Establishes connections to the collector.
pub(crate) trait Connector: Send + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Establishes a new connection.
    ///
    /// For connectionless transports, this only involves local setup, so errors indicate a local resource or address
    /// problem rather than an unreachable collector.
    fn connect(&self) -> io::Result<Self::Connection>;
}

pub(crate) enum Client {
    Udp(UdpSocket),

    #[cfg(target_os = "linux")]
    Unixgram(UnixDatagram),
}

impl Connection for Client {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Client::Udp(socket) => socket.send(buf),

            #[cfg(target_os = "linux")]
            Client::Unixgram(socket) => socket.send(buf),
        }
    }
}

/// Forwarder configuration.
#[derive(Clone, Debug)]
pub(crate) struct ForwarderConfiguration {
    pub remote_addr: RemoteAddr,
    pub write_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl ForwarderConfiguration {
    /// Creates the backoff used between reconnect attempts.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_initial, self.backoff_max)
    }
}

impl Connector for ForwarderConfiguration {
    type Connection = Client;

    fn connect(&self) -> io::Result<Client> {
        match &self.remote_addr {
            RemoteAddr::Udp(addrs) => {
                // Bind to the unspecified address of the same family as the first candidate so that IPv6-only
                // collectors work too.
                let local: SocketAddr = match addrs.first() {
                    Some(SocketAddr::V6(_)) => (Ipv6Addr::UNSPECIFIED, 0).into(),
                    _ => (Ipv4Addr::UNSPECIFIED, 0).into(),
                };

                UdpSocket::bind(local).and_then(|socket| {
                    socket.connect(&addrs[..])?;
                    socket.set_write_timeout(Some(self.write_timeout))?;
                    Ok(Client::Udp(socket))
                })
            }

            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(path) => UnixDatagram::unbound().and_then(|socket| {
                socket.connect(path)?;
                socket.set_write_timeout(Some(self.write_timeout))?;
                Ok(Client::Unixgram(socket))
            }),
        }
    }
}
