use crate::error::{ServerError, ServerResult};
use crate::http::{Response, Status};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// An in-flight file transfer: the open source file plus the chunk size
/// used to pace the body onto the connection.
///
/// At most one job exists per connection. The job owns the file until
/// EOF or error; dropping it releases the descriptor.
#[derive(Debug)]
pub struct StreamJob {
    file: File,
    chunk_size: usize,
}

impl StreamJob {
    /// Stat and open `path`, producing the job and the serialized
    /// response preamble announcing the body length.
    ///
    /// A non-regular target is an explicit error; the caller converts it
    /// into an HTTP error response rather than leaving the connection
    /// dangling. `Content-Length` comes from the stat taken before open,
    /// and the chunk loop reads to EOF, so the two agree unless the file
    /// is mutated mid-transfer.
    pub fn open(path: &Path, mime: &str, chunk_size: usize) -> ServerResult<(Self, Vec<u8>)> {
        let meta = fs::metadata(path).map_err(|e| ServerError::FileOpen {
            path: path.display().to_string(),
            source: e,
        })?;

        if !meta.is_file() {
            return Err(ServerError::FileOpen {
                path: path.display().to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let file = File::open(path).map_err(|e| ServerError::FileOpen {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut response = Response::new(Status::Ok);
        response.set_header("Content-Type", mime);
        response.set_header("Content-Length", &meta.len().to_string());

        let mut preamble = Vec::new();
        response.serialize_head(&mut preamble)?;

        Ok((Self { file, chunk_size }, preamble))
    }

    /// Read the next chunk of the body; `None` signals EOF
    pub fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self.file.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("quickserve-stream-{}-{}", std::process::id(), name));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_preamble_carries_exact_length() {
        let path = scratch_file("preamble.bin", &[7u8; 2500]);
        let (_, preamble) = StreamJob::open(&path, "image/png", 1024).unwrap();
        let text = String::from_utf8(preamble).unwrap();

        assert!(text.starts_with("HTTP/1.0 200 Ok\r\n"));
        assert!(text.contains("Content-Type: image/png\r\n"));
        assert!(text.contains("Content-Length: 2500\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_chunks_cover_file_exactly() {
        let contents: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let path = scratch_file("chunks.bin", &contents);
        let (mut job, _) = StreamJob::open(&path, "text/plain", 1024).unwrap();

        let mut streamed = Vec::new();
        let mut sizes = Vec::new();
        while let Some(chunk) = job.read_chunk().unwrap() {
            sizes.push(chunk.len());
            streamed.extend_from_slice(&chunk);
        }

        assert_eq!(sizes, vec![1024, 1024, 452]);
        assert_eq!(streamed, contents);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_directory_is_rejected() {
        let err = StreamJob::open(&std::env::temp_dir(), "text/plain", 1024).unwrap_err();
        assert!(matches!(err, ServerError::FileOpen { .. }));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let path = std::env::temp_dir().join("quickserve-definitely-missing");
        let err = StreamJob::open(&path, "text/plain", 1024).unwrap_err();
        assert!(matches!(err, ServerError::FileOpen { .. }));
    }
}
