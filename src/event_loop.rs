use crate::acceptor::Acceptor;
use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionState, WriteProgress};
use crate::error::{ServerError, ServerResult};
use crate::http::Request;
use crate::router::{RouteOutcome, Router};
use crate::stream::StreamJob;
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::os::unix::io::RawFd;

/// Token reserved for the listening descriptor
const LISTENER: usize = 0;

/// Which readiness a descriptor is currently registered for.
///
/// A descriptor holds exactly one registration at a time; changing
/// interest goes through `modify`, which atomically replaces the old
/// registration instead of stacking a second one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

impl Interest {
    fn mask(self) -> u32 {
        match self {
            Interest::Readable => (libc::EPOLLIN | libc::EPOLLRDHUP) as u32,
            Interest::Writable => libc::EPOLLOUT as u32,
        }
    }
}

/// Readiness reported for one token
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

/// Level-triggered epoll wrapper owning the mapping from descriptor to
/// token. Explicit object rather than ambient global state, so it can
/// be torn down cleanly and driven from tests.
pub struct EventPoller {
    epoll_fd: RawFd,
    events: Vec<libc::epoll_event>,
    max_events: usize,
}

impl EventPoller {
    pub fn new(max_events: usize) -> ServerResult<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(0) };
        if epoll_fd < 0 {
            return Err(ServerError::Io(io::Error::last_os_error()));
        }

        Ok(Self {
            epoll_fd,
            events: Vec::with_capacity(max_events),
            max_events,
        })
    }

    pub fn register(&mut self, fd: RawFd, token: usize, interest: Interest) -> ServerResult<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest)
    }

    /// Replace the registered interest for a descriptor
    pub fn modify(&mut self, fd: RawFd, token: usize, interest: Interest) -> ServerResult<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest)
    }

    /// Remove a descriptor; must always precede closing it
    pub fn deregister(&mut self, fd: RawFd) -> ServerResult<()> {
        let ret = unsafe {
            libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                return Err(ServerError::Io(err));
            }
        }
        Ok(())
    }

    fn ctl(&mut self, op: i32, fd: RawFd, token: usize, interest: Interest) -> ServerResult<()> {
        let mut event = libc::epoll_event {
            events: interest.mask(),
            u64: token as u64,
        };

        let ret = unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut event as *mut _) };
        if ret < 0 {
            return Err(ServerError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Poll for events with a timeout in milliseconds
    pub fn poll(&mut self, timeout_ms: i32) -> ServerResult<Vec<(usize, Readiness)>> {
        self.events.clear();
        self.events
            .resize(self.max_events, libc::epoll_event { events: 0, u64: 0 });

        let num_events = unsafe {
            libc::epoll_wait(
                self.epoll_fd,
                self.events.as_mut_ptr(),
                self.max_events as i32,
                timeout_ms,
            )
        };

        if num_events < 0 {
            let err = io::Error::last_os_error();
            // EINTR is just a signal interruption
            if err.kind() != ErrorKind::Interrupted {
                return Err(ServerError::Io(err));
            }
            return Ok(Vec::new());
        }

        let result = self.events[..num_events as usize]
            .iter()
            .map(|event| {
                let bits = event.events;
                (
                    event.u64 as usize,
                    Readiness {
                        readable: bits & libc::EPOLLIN as u32 != 0,
                        writable: bits & libc::EPOLLOUT as u32 != 0,
                        error: bits & (libc::EPOLLERR | libc::EPOLLHUP | libc::EPOLLRDHUP) as u32
                            != 0,
                    },
                )
            })
            .collect();

        Ok(result)
    }
}

impl Drop for EventPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll_fd);
        }
    }
}

/// The single-threaded event loop: owns the poller, the acceptor, the
/// router and every live connection. All I/O is readiness-driven; no
/// callback runs concurrently with another, and each connection is
/// touched only by its own sequence of events.
pub struct EventLoop {
    poller: EventPoller,
    acceptor: Acceptor,
    router: Router,
    connections: HashMap<usize, Connection>,
    next_id: usize,
    read_buffer_size: usize,
    chunk_size: usize,
    running: bool,
}

impl EventLoop {
    pub fn new(acceptor: Acceptor, router: Router, config: &ServerConfig) -> ServerResult<Self> {
        let mut poller = EventPoller::new(config.max_events)?;
        poller.register(acceptor.raw_fd(), LISTENER, Interest::Readable)?;

        Ok(Self {
            poller,
            acceptor,
            router,
            connections: HashMap::new(),
            next_id: LISTENER + 1,
            read_buffer_size: config.read_buffer_size,
            chunk_size: config.chunk_size,
            running: false,
        })
    }

    /// Run until `stop` is called. Per-connection failures are contained
    /// here: they close the one affected connection and never escape.
    pub fn run(&mut self) -> ServerResult<()> {
        self.running = true;

        while self.running {
            let events = self.poller.poll(100)?;

            for (token, readiness) in events {
                if token == LISTENER {
                    self.accept_one();
                } else {
                    self.process_connection_event(token, readiness);
                }
            }
        }

        Ok(())
    }

    /// Stop the event loop
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Accept exactly one pending connection per readiness event.
    /// Accept failure is logged and serving continues.
    fn accept_one(&mut self) {
        let id = self.next_id;
        match self.acceptor.accept(id) {
            Ok(conn) => {
                self.next_id += 1;
                log::info!("connection {} from {}", id, conn.peer_addr());

                if let Err(e) = self.poller.register(conn.raw_fd(), id, Interest::Readable) {
                    log::error!("could not register connection {}: {}", id, e);
                    return;
                }
                self.connections.insert(id, conn);
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => log::error!("{}", ServerError::Accept(e)),
        }
    }

    fn process_connection_event(&mut self, id: usize, readiness: Readiness) {
        let state = match self.connections.get(&id) {
            Some(conn) => conn.state(),
            None => return,
        };

        if state == ConnectionState::Reading {
            // A hangup can arrive together with the final readable
            // bytes, so drain the read side first; a bare error while
            // still reading means the request will never complete and
            // the connection is dropped silently.
            if readiness.readable {
                self.handle_read(id);
            } else if readiness.error {
                self.close_connection(id);
            }
        } else if readiness.writable {
            self.handle_write(id);
        } else if readiness.error {
            // Peer vanished while a response was in flight
            self.close_connection(id);
        }
    }

    /// Reading state: accumulate bytes until the parser yields a request
    fn handle_read(&mut self, id: usize) {
        let mut scratch = vec![0u8; self.read_buffer_size];

        let conn = match self.connections.get_mut(&id) {
            Some(conn) => conn,
            None => return,
        };

        let n = match conn.read(&mut scratch) {
            Ok(0) => {
                // Peer closed before a full request arrived
                log::info!("connection {} closed by peer", id);
                self.close_connection(id);
                return;
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                log::warn!("{}", ServerError::ConnectionRead(e));
                self.close_connection(id);
                return;
            }
        };

        match conn.parser_mut().feed(&scratch[..n]) {
            Ok(Some(request)) => self.dispatch(id, request),
            Ok(None) => {}
            Err(e) => {
                // Malformed request line: answer with an explicit 400
                // instead of leaving the connection dangling
                log::warn!("connection {}: {}", id, e);
                self.respond_and_close(id, Router::bad_request());
            }
        }
    }

    /// Dispatched state: run the router and stage the response
    fn dispatch(&mut self, id: usize, request: Request) {
        log::info!(
            "connection {}: {} {} {}",
            id,
            request.method.as_str(),
            request.path,
            request.version
        );
        for header in &request.headers {
            log::debug!("connection {}: header {}", id, header);
        }

        let outcome = self.router.route(&request);

        let conn = match self.connections.get_mut(&id) {
            Some(conn) => conn,
            None => return,
        };

        // One request per connection: nothing further is read
        conn.shutdown_read();
        conn.set_state(ConnectionState::Dispatched);

        match outcome {
            RouteOutcome::Respond(response) => self.respond_and_close(id, response),
            RouteOutcome::Stream { path, mime } => {
                match StreamJob::open(&path, mime, self.chunk_size) {
                    Ok((job, preamble)) => {
                        conn.start_stream(&preamble, job);
                        self.finish_or_rearm(id);
                    }
                    Err(e) => {
                        log::warn!("connection {}: {}", id, e);
                        self.respond_and_close(id, Router::not_found());
                    }
                }
            }
        }
    }

    /// Queue a complete inline response and start draining it
    fn respond_and_close(&mut self, id: usize, response: crate::http::Response) {
        let conn = match self.connections.get_mut(&id) {
            Some(conn) => conn,
            None => return,
        };

        if let Err(e) = conn.queue_response(&response) {
            log::warn!("connection {}: {}", id, e);
            self.close_connection(id);
            return;
        }
        if conn.state() == ConnectionState::Reading {
            conn.shutdown_read();
            conn.set_state(ConnectionState::Dispatched);
        }

        self.finish_or_rearm(id);
    }

    /// Writable event: keep draining the staged response or stream
    fn handle_write(&mut self, id: usize) {
        self.finish_or_rearm(id);
    }

    /// Drive the outbound side; close on completion, re-arm for
    /// writability when the socket pushes back, tear down on error
    fn finish_or_rearm(&mut self, id: usize) {
        let conn = match self.connections.get_mut(&id) {
            Some(conn) => conn,
            None => return,
        };

        match conn.drive_write() {
            Ok(WriteProgress::Finished) => {
                log::info!("connection {} complete", id);
                self.close_connection(id);
            }
            Ok(WriteProgress::Blocked) => {
                let fd = conn.raw_fd();
                if let Err(e) = self.poller.modify(fd, id, Interest::Writable) {
                    log::error!("connection {}: {}", id, e);
                    self.close_connection(id);
                }
            }
            Err(e) => {
                log::warn!("connection {}: {}", id, e);
                self.close_connection(id);
            }
        }
    }

    /// Single close path: deregister first, then drop the connection,
    /// which releases the socket (and any stream file) descriptors
    fn close_connection(&mut self, id: usize) {
        if let Some(mut conn) = self.connections.remove(&id) {
            if let Err(e) = self.poller.deregister(conn.raw_fd()) {
                log::warn!("deregister of connection {} failed: {}", id, e);
            }
            log::info!("closing connection {} from {}", id, conn.peer_addr());
            conn.close();
        }
    }
}
