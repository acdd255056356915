//! Test utilities: multipart body construction, synthetic body streams and app factories.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
};
use axum_test::TestServer;
use bytes::Bytes;
use futures::{Stream, stream};
use std::path::Path;

use crate::config::Config;

pub const BOUNDARY: &str = "----ingestctl-test-boundary-7MA4YWxkTrZu0gW";

/// Builds a raw `multipart/form-data` body with [`BOUNDARY`].
///
/// Used where a test needs control the HTTP client would take away: lying `Content-Length`
/// headers, truncated bodies, streams that fail partway.
#[derive(Debug, Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.push_headers(&format!("Content-Disposition: form-data; name=\"{name}\""));
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: Option<&str>, contents: &[u8]) -> Self {
        let mut headers = format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"");
        if let Some(content_type) = content_type {
            headers.push_str(&format!("\r\nContent-Type: {content_type}"));
        }
        self.push_headers(&headers);
        self.body.extend_from_slice(contents);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    fn push_headers(&mut self, headers: &str) {
        self.body.extend_from_slice(format!("--{BOUNDARY}\r\n{headers}\r\n\r\n").as_bytes());
    }
}

/// Request headers for a [`MultipartBody`], optionally declaring a length.
pub fn multipart_headers(declared_length: Option<u64>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&multipart_content_type()).expect("valid content type"),
    );
    if let Some(length) = declared_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    headers
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Yields `body` in frames of `frame_size` bytes.
pub fn body_stream(body: Vec<u8>, frame_size: usize) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let frames: Vec<Result<Bytes, std::io::Error>> = body.chunks(frame_size.max(1)).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
    stream::iter(frames)
}

/// Yields the first `fail_after` bytes of `body`, then a connection-reset error, as a client
/// disconnecting mid-upload would.
pub fn failing_stream(
    body: Vec<u8>,
    fail_after: usize,
    frame_size: usize,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let sent = &body[..fail_after.min(body.len())];
    let mut frames: Vec<Result<Bytes, std::io::Error>> = sent.chunks(frame_size.max(1)).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
    frames.push(Err(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "client disconnected",
    )));
    stream::iter(frames)
}

/// Deterministic, non-repeating-looking test content.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

pub fn create_test_config(script_dir: &Path) -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        script_dir: script_dir.to_path_buf(),
        ..Default::default()
    };
    // Small chunks so multi-chunk copies are exercised with modest bodies
    config.limits.files.memory_limit = 64 * 1024;
    config
}

pub fn create_test_app(config: Config) -> TestServer {
    crate::Application::new(config)
        .expect("Failed to create application")
        .into_test_server()
}
