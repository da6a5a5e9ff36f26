use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{ServerError, ServerResult};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::os::unix::io::{AsRawFd, RawFd};

/// Owns the non-blocking listening socket and turns readiness events
/// into accepted `Connection`s.
pub struct Acceptor {
    listener: TcpListener,
}

impl Acceptor {
    /// Bind and listen according to the configuration.
    ///
    /// Bind and listen failures are fatal to the process; the caller
    /// logs them and exits with a non-zero status.
    pub fn bind(config: &ServerConfig) -> ServerResult<Self> {
        let ip: IpAddr = config.listen_address.parse().map_err(|_| {
            ServerError::Config(format!(
                "invalid listen address: {}",
                config.listen_address
            ))
        })?;
        let addr = SocketAddr::new(ip, config.port);

        let domain = if addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let socket =
            Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(ServerError::Bind)?;
        socket.set_nonblocking(true).map_err(ServerError::Bind)?;
        socket.set_reuse_address(true).map_err(ServerError::Bind)?;

        socket
            .bind(&socket2::SockAddr::from(addr))
            .map_err(ServerError::Bind)?;
        socket.listen(config.backlog).map_err(ServerError::Listen)?;

        Ok(Self {
            listener: socket.into(),
        })
    }

    /// Accept a single pending connection.
    ///
    /// Called once per readiness event on the listening descriptor;
    /// remaining pending connections keep the descriptor readable under
    /// level-triggered polling, so there is no drain loop here.
    pub fn accept(&self, id: usize) -> io::Result<Connection> {
        let (stream, peer_addr) = self.listener.accept()?;
        stream.set_nonblocking(true)?;
        Connection::new(stream, peer_addr, id)
    }

    /// Get the local address this acceptor is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Raw descriptor for poller registration
    pub fn raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}
