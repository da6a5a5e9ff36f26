pub mod acceptor;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod event_loop;
pub mod http;
pub mod listing;
pub mod router;
pub mod stream;

/// Re-exports of common components for easier access
pub use acceptor::Acceptor;
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionState};
pub use error::{ServerError, ServerResult};
pub use event_loop::{EventLoop, EventPoller, Interest};
pub use http::{Method, Request, RequestParser, Response, Status};
pub use listing::{human_size, render_listing, scan_dir, DirectoryEntry};
pub use router::{RouteOutcome, Router};
pub use stream::StreamJob;
