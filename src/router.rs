use crate::config::ServerConfig;
use crate::http::{Request, Response, Status};
use crate::listing;
use std::path::{Path, PathBuf};

/// Landing page emitted for `/`
const LANDING_PAGE: &str = "<html><head><title>quickserve</title></head>\
<body><h2>Success</h2><p /><a href=\"/\"><img src=\"/github.png\" /></a></body></html>";

/// Fixed body for missing resources
const NOT_FOUND_PAGE: &str = "<html><head><title>404 - Not Found</title></head>\
<body><h2>Sorry, resource not found.</h2></body></html>";

/// What the router decided to do with a request
#[derive(Debug)]
pub enum RouteOutcome {
    /// A complete response, ready to serialize; close afterwards
    Respond(Response),
    /// Hand the connection to the file streamer
    Stream { path: PathBuf, mime: &'static str },
}

/// Maps request paths to inline content, the whitelisted asset, or the
/// filesystem resolver. Rules are fixed and evaluated in order.
pub struct Router {
    web_root: PathBuf,
    asset_path: String,
    asset_file: PathBuf,
}

impl Router {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            web_root: config.web_root.clone(),
            asset_path: config.asset_path.clone(),
            asset_file: config.asset_file.clone(),
        }
    }

    pub fn route(&self, request: &Request) -> RouteOutcome {
        if request.path == "/" {
            return RouteOutcome::Respond(Response::html(Status::Ok, LANDING_PAGE));
        }

        if request.path == self.asset_path {
            return RouteOutcome::Stream {
                path: self.asset_file.clone(),
                mime: "image/png",
            };
        }

        self.resolve(&request.path)
    }

    /// The fixed 404 response, also used when a stream fails to start
    pub fn not_found() -> Response {
        Response::html(Status::NotFound, NOT_FOUND_PAGE)
    }

    /// Response for a request line that never parsed
    pub fn bad_request() -> Response {
        Response::html(
            Status::BadRequest,
            "<html><head><title>400 - Bad Request</title></head>\
             <body><h2>Malformed request.</h2></body></html>",
        )
    }

    /// Resolve a request path against the web root
    fn resolve(&self, request_path: &str) -> RouteOutcome {
        let fs_path = self.resolve_under_root(request_path);

        let meta = match std::fs::metadata(&fs_path) {
            Ok(meta) => meta,
            Err(_) => return RouteOutcome::Respond(Self::not_found()),
        };

        if meta.is_dir() {
            return match listing::scan_dir(&fs_path) {
                Ok(entries) => RouteOutcome::Respond(Response::html(
                    Status::Ok,
                    &listing::render_listing(request_path, &entries),
                )),
                Err(e) => {
                    log::warn!("listing {} failed: {}", fs_path.display(), e);
                    RouteOutcome::Respond(Response::html(
                        Status::InternalServerError,
                        "<html><body><h2>Could not list directory.</h2></body></html>",
                    ))
                }
            };
        }

        if meta.is_file() {
            return RouteOutcome::Stream {
                mime: mime_for(&fs_path),
                path: fs_path,
            };
        }

        // Sockets, fifos and friends get a generic fallback
        RouteOutcome::Respond(Response::text(Status::Ok, "Unsupported resource type\n"))
    }

    /// Join sanitized path segments onto the web root. Empty, `.` and
    /// `..` segments are dropped, so the result cannot escape the root.
    fn resolve_under_root(&self, request_path: &str) -> PathBuf {
        let mut fs_path = self.web_root.clone();
        for segment in request_path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            fs_path.push(segment);
        }
        fs_path
    }
}

/// MIME type by file extension; anything unrecognized is plain text
fn mime_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "png" => "image/png",
        "jpg" => "image/jpg",
        "css" => "text/css",
        "js" => "text/javascript",
        "otf" => "font/otf",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use std::fs;

    fn request(path: &str) -> Request {
        Request {
            method: Method::Get,
            path: path.to_string(),
            version: "HTTP/1.0".to_string(),
            headers: Vec::new(),
        }
    }

    fn test_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("quickserve-router-{}-{}", std::process::id(), name));
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn router_for(root: &Path) -> Router {
        Router::new(&ServerConfig::new().with_web_root(root))
    }

    #[test]
    fn test_landing_page() {
        let router = router_for(&test_root("landing"));
        match router.route(&request("/")) {
            RouteOutcome::Respond(resp) => {
                assert_eq!(resp.status, Status::Ok);
                assert_eq!(resp.body, LANDING_PAGE.as_bytes());
            }
            other => panic!("expected inline response, got {:?}", other),
        }
    }

    #[test]
    fn test_whitelisted_asset_streams_as_png() {
        let router = router_for(&test_root("asset"));
        match router.route(&request("/github.png")) {
            RouteOutcome::Stream { path, mime } => {
                assert_eq!(path, PathBuf::from("github.png"));
                assert_eq!(mime, "image/png");
            }
            other => panic!("expected stream outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_resource_is_404() {
        let router = router_for(&test_root("missing"));
        match router.route(&request("/no-such-thing")) {
            RouteOutcome::Respond(resp) => {
                assert_eq!(resp.status, Status::NotFound);
                assert_eq!(resp.body, NOT_FOUND_PAGE.as_bytes());
                assert_eq!(
                    resp.get_header("Content-Length").unwrap(),
                    &NOT_FOUND_PAGE.len().to_string()
                );
            }
            other => panic!("expected 404, got {:?}", other),
        }
    }

    #[test]
    fn test_regular_file_streams_with_mime_by_extension() {
        let root = test_root("mime");
        fs::write(root.join("style.css"), b"body{}").unwrap();
        let router = router_for(&root);

        match router.route(&request("/style.css")) {
            RouteOutcome::Stream { path, mime } => {
                assert_eq!(path, root.join("style.css"));
                assert_eq!(mime, "text/css");
            }
            other => panic!("expected stream outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_extension_is_plain_text() {
        let root = test_root("plain");
        fs::write(root.join("data.bin"), b"xx").unwrap();
        let router = router_for(&root);

        match router.route(&request("/data.bin")) {
            RouteOutcome::Stream { mime, .. } => assert_eq!(mime, "text/plain"),
            other => panic!("expected stream outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_renders_listing() {
        let root = test_root("listing");
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/readme.txt"), b"hi").unwrap();
        let router = router_for(&root);

        match router.route(&request("/docs/")) {
            RouteOutcome::Respond(resp) => {
                assert_eq!(resp.status, Status::Ok);
                assert_eq!(resp.get_header("Content-Type").unwrap(), "text/html");
                let body = String::from_utf8(resp.body).unwrap();
                assert!(body.contains("readme.txt"));
            }
            other => panic!("expected listing, got {:?}", other),
        }
    }

    #[test]
    fn test_non_regular_file_gets_generic_fallback() {
        let root = test_root("fifo");
        let fifo = root.join("pipe");
        let _ = fs::remove_file(&fifo);

        let c_path = std::ffi::CString::new(fifo.to_str().unwrap()).unwrap();
        let ret = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
        assert_eq!(ret, 0, "mkfifo failed");

        let router = router_for(&root);
        match router.route(&request("/pipe")) {
            RouteOutcome::Respond(resp) => {
                assert_eq!(resp.status, Status::Ok);
                assert_eq!(resp.get_header("Content-Type").unwrap(), "text/plain");
                assert_eq!(resp.body, b"Unsupported resource type\n");
            }
            other => panic!("expected fallback response, got {:?}", other),
        }

        let _ = fs::remove_file(&fifo);
    }

    #[test]
    fn test_traversal_segments_stay_inside_root() {
        let root = test_root("traversal");
        let router = router_for(&root);

        let resolved = router.resolve_under_root("/../../etc/passwd");
        assert!(resolved.starts_with(&root));

        // The sanitized path does not exist under the root, so the
        // request 404s rather than escaping
        match router.route(&request("/../../etc/passwd")) {
            RouteOutcome::Respond(resp) => assert_eq!(resp.status, Status::NotFound),
            other => panic!("expected 404, got {:?}", other),
        }
    }
}
