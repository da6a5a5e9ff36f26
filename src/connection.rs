use crate::buffer::Buffer;
use crate::error::{ServerError, ServerResult};
use crate::http::{RequestParser, Response};
use crate::stream::StreamJob;
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};

/// Lifecycle of a connection: one request in, one response out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Reading,
    Dispatched,
    Streaming,
    Closed,
}

/// Progress of the outbound side after a write-readiness event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// The socket would block; wait for the next writable event
    Blocked,
    /// The whole response has been handed to the kernel
    Finished,
}

/// A single client connection, exclusively owned by the event loop.
///
/// The inbound side accumulates bytes in the parser until the request
/// headers are complete; the outbound side stages response bytes (and,
/// while streaming, file chunks) in a buffer drained on writability.
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: usize,
    state: ConnectionState,
    parser: RequestParser,
    outbound: Buffer,
    job: Option<StreamJob>,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, id: usize) -> io::Result<Self> {
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            peer_addr,
            id,
            state: ConnectionState::Reading,
            parser: RequestParser::new(),
            outbound: Buffer::new(4 * 1024),
            job: None,
        })
    }

    /// Read once from the socket into the supplied scratch buffer
    pub fn read(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        self.stream.read(scratch)
    }

    /// Feed freshly read bytes to the request parser
    pub fn parser_mut(&mut self) -> &mut RequestParser {
        &mut self.parser
    }

    /// Serialize a complete response into the outbound buffer
    pub fn queue_response(&mut self, response: &Response) -> ServerResult<()> {
        let mut encoded = Vec::new();
        response.serialize(&mut encoded)?;
        self.outbound.write(&encoded);
        Ok(())
    }

    /// Stage raw preamble bytes and attach the stream job that will
    /// supply the body chunks
    pub fn start_stream(&mut self, preamble: &[u8], job: StreamJob) {
        self.outbound.write(preamble);
        self.job = Some(job);
        self.state = ConnectionState::Streaming;
    }

    /// Drain the outbound buffer and, while a stream job is attached,
    /// refill it one chunk at a time until EOF.
    ///
    /// `Finished` means both descriptors can be released; errors mean
    /// the transfer is abandoned (best-effort, no resume).
    pub fn drive_write(&mut self) -> ServerResult<WriteProgress> {
        loop {
            if self.outbound.available_data() > 0 {
                match self.outbound.write_to(&mut self.stream) {
                    Ok(0) => {
                        return Err(ServerError::ConnectionWrite(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "peer stopped accepting data",
                        )))
                    }
                    Ok(_) => continue,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        return Ok(WriteProgress::Blocked)
                    }
                    Err(e) => return Err(ServerError::ConnectionWrite(e)),
                }
            }

            match self.job.as_mut() {
                Some(job) => match job.read_chunk() {
                    Ok(Some(chunk)) => self.outbound.write(&chunk),
                    Ok(None) => {
                        // EOF: dropping the job closes the source file
                        self.job = None;
                        return Ok(WriteProgress::Finished);
                    }
                    Err(e) => {
                        self.job = None;
                        return Err(ServerError::FileStream(e));
                    }
                },
                None => return Ok(WriteProgress::Finished),
            }
        }
    }

    /// Half-close: no further requests are read on this connection
    pub fn shutdown_read(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Read);
    }

    /// Fully close the socket; the descriptor itself is released when
    /// the connection is dropped
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.job = None;
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}
