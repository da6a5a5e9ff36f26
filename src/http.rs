use crate::error::{ServerError, ServerResult};
use std::io::Write;
use std::str;

/// HTTP status codes used by this server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    InternalServerError = 500,
}

impl Status {
    /// Get the reason phrase for this status code.
    ///
    /// The 200 phrase is deliberately `Ok` rather than `OK`; existing
    /// clients match the status line literally.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Status::Ok => "Ok",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Connect,
    Patch,
}

impl Method {
    /// Parse a method from a request-line token
    pub fn from_str(s: &str) -> ServerResult<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            "PATCH" => Ok(Method::Patch),
            _ => Err(ServerError::MalformedRequest(format!(
                "invalid method: {}",
                s
            ))),
        }
    }

    /// Convert the method to a string
    pub fn as_str(&self) -> &'static str {
        match *self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
        }
    }
}

/// A parsed HTTP request: the request line plus raw header lines.
/// Headers are logged but never interpreted.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub headers: Vec<String>,
}

/// Incremental request parser.
///
/// Accumulates inbound bytes across reads and splits on CRLF; an empty
/// line terminates the headers. Until that blank line arrives, `feed`
/// keeps returning `None` so a request fragmented across reads is
/// reassembled before dispatch.
pub struct RequestParser {
    buf: Vec<u8>,
    // How far the blank-line scan has advanced, so re-fed bytes are
    // not rescanned from the start
    scanned: usize,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
        }
    }

    /// Feed newly arrived bytes. Returns a complete `Request` once the
    /// header-terminating blank line has been seen.
    pub fn feed(&mut self, data: &[u8]) -> ServerResult<Option<Request>> {
        self.buf.extend_from_slice(data);

        let start = self.scanned.saturating_sub(3);
        let end = match find_blank_line(&self.buf[start..]) {
            Some(pos) => start + pos,
            None => {
                self.scanned = self.buf.len();
                return Ok(None);
            }
        };

        let head = str::from_utf8(&self.buf[..end]).map_err(|_| {
            ServerError::MalformedRequest("request head is not valid UTF-8".to_string())
        })?;

        let mut lines = head.split("\r\n");
        let request_line = lines
            .next()
            .ok_or_else(|| ServerError::MalformedRequest("empty request".to_string()))?;

        let (method, path, version) = parse_request_line(request_line)?;
        let headers = lines
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();

        Ok(Some(Request {
            method,
            path,
            version,
            headers,
        }))
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the offset of the `\r\n\r\n` header terminator, returning the
/// index just before the first `\r\n` of the pair
fn find_blank_line(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Split a request line into its three tokens
fn parse_request_line(line: &str) -> ServerResult<(Method, String, String)> {
    let mut parts = line.split_whitespace();
    let (method, path, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(p), Some(v)) => (m, p, v),
        _ => {
            return Err(ServerError::MalformedRequest(format!(
                "too few tokens in request line: {:?}",
                line
            )))
        }
    };

    Ok((
        Method::from_str(method)?,
        path.to_string(),
        version.to_string(),
    ))
}

/// HTTP/1.0 response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Create a new response; every response announces `Connection: close`
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: vec![("Connection".to_string(), "close".to_string())],
            body: Vec::new(),
        }
    }

    /// Build an HTML response with Content-Length set
    pub fn html(status: Status, body: &str) -> Self {
        let mut response = Self::new(status);
        response.set_header("Content-Type", "text/html");
        response.set_body(body.as_bytes());
        response
    }

    /// Build a plain-text response with Content-Length set
    pub fn text(status: Status, body: &str) -> Self {
        let mut response = Self::new(status);
        response.set_header("Content-Type", "text/plain");
        response.set_body(body.as_bytes());
        response
    }

    /// Set a header, replacing any previous value for the same name
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            entry.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    /// Get a header value by name
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set the body and update Content-Length
    pub fn set_body(&mut self, body: &[u8]) {
        self.body = body.to_vec();
        self.set_header("Content-Length", &body.len().to_string());
    }

    /// Serialize the status line, headers and terminating blank line.
    /// Used on its own for streamed responses whose body follows in chunks.
    pub fn serialize_head(&self, writer: &mut Vec<u8>) -> ServerResult<()> {
        write!(
            writer,
            "HTTP/1.0 {} {}\r\n",
            self.status as u16,
            self.status.as_str()
        )
        .map_err(ServerError::Io)?;

        for (name, value) in &self.headers {
            write!(writer, "{}: {}\r\n", name, value).map_err(ServerError::Io)?;
        }

        write!(writer, "\r\n").map_err(ServerError::Io)?;
        Ok(())
    }

    /// Serialize the complete response to a byte vector
    pub fn serialize(&self, writer: &mut Vec<u8>) -> ServerResult<()> {
        self.serialize_head(writer)?;
        writer.extend_from_slice(&self.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let mut parser = RequestParser::new();
        let request = parser
            .feed(b"GET /index.html HTTP/1.0\r\nHost: example.com\r\n\r\n")
            .unwrap()
            .expect("request should be complete");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/index.html");
        assert_eq!(request.version, "HTTP/1.0");
        assert_eq!(request.headers, vec!["Host: example.com".to_string()]);
    }

    #[test]
    fn test_parse_no_headers() {
        let mut parser = RequestParser::new();
        let request = parser
            .feed(b"GET / HTTP/1.0\r\n\r\n")
            .unwrap()
            .expect("request should be complete");

        assert_eq!(request.path, "/");
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_parse_fragmented_request() {
        let mut parser = RequestParser::new();

        assert!(parser.feed(b"GET /gi").unwrap().is_none());
        assert!(parser.feed(b"thub.png HTT").unwrap().is_none());
        assert!(parser.feed(b"P/1.0\r\nHost: local").unwrap().is_none());
        let request = parser
            .feed(b"host\r\n\r\n")
            .unwrap()
            .expect("request should be complete");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/github.png");
        assert_eq!(request.headers, vec!["Host: localhost".to_string()]);
    }

    #[test]
    fn test_parse_terminator_split_across_reads() {
        let mut parser = RequestParser::new();
        assert!(parser.feed(b"GET / HTTP/1.0\r\n\r").unwrap().is_none());
        let request = parser.feed(b"\n").unwrap();
        assert!(request.is_some());
    }

    #[test]
    fn test_too_few_tokens_is_malformed() {
        let mut parser = RequestParser::new();
        let err = parser.feed(b"GET /\r\n\r\n").unwrap_err();
        assert!(matches!(err, ServerError::MalformedRequest(_)));
    }

    #[test]
    fn test_unknown_method_is_malformed() {
        let mut parser = RequestParser::new();
        let err = parser.feed(b"BREW /pot HTTP/1.0\r\n\r\n").unwrap_err();
        assert!(matches!(err, ServerError::MalformedRequest(_)));
    }

    #[test]
    fn test_status_line_literals() {
        assert_eq!(Status::Ok.as_str(), "Ok");
        assert_eq!(Status::NotFound.as_str(), "Not Found");
    }

    #[test]
    fn test_response_serialization() {
        let response = Response::html(Status::Ok, "<html></html>");
        let mut out = Vec::new();
        response.serialize(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("HTTP/1.0 200 Ok\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Content-Type: text/html\r\n"));
        assert!(text.contains("Content-Length: 13\r\n"));
        assert!(text.ends_with("\r\n\r\n<html></html>"));
    }
}
