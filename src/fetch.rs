use std::io::Read;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{AnnotatorError, Result};

/// Responses larger than this are rejected rather than buffered.
pub const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking HTTP(S) image downloader with a whole-request timeout.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Downloads `url` into memory. Every failure is a `Network` error.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let network_error = |reason: String| AnnotatorError::Network {
            url: url.to_string(),
            reason,
        };

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => network_error(format!("server answered HTTP {code}")),
            ureq::Error::Transport(transport) => network_error(transport.to_string()),
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|e| network_error(e.to_string()))?;

        if body.len() as u64 > self.max_bytes {
            warn!("image at {url} exceeds {} bytes", self.max_bytes);
            return Err(network_error(format!(
                "response exceeds {} bytes",
                self.max_bytes
            )));
        }

        debug!("fetched {} bytes from {url}", body.len());
        Ok(body)
    }
}

impl Default for ImageFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::spawn_loopback;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::runtime::Runtime;

    /// Image host on a loopback port; the runtime must outlive the requests.
    fn image_host() -> (Runtime, String) {
        let app = Router::new()
            .route("/image.jpg", get(|| async { b"jpeg bytes".to_vec() }))
            .route("/large.jpg", get(|| async { vec![0u8; 2048] }))
            .route("/gone.jpg", get(|| async { (StatusCode::NOT_FOUND, "gone") }));
        let runtime = Runtime::new().unwrap();
        let addr = runtime.block_on(spawn_loopback(app)).unwrap();
        (runtime, format!("http://{addr}"))
    }

    #[test]
    fn test_fetch_returns_body() -> Result<()> {
        let (_runtime, base) = image_host();
        let body = ImageFetcher::default().fetch(&format!("{base}/image.jpg"))?;
        assert_eq!(body, b"jpeg bytes");
        Ok(())
    }

    #[test]
    fn test_http_error_status_is_network_error() {
        let (_runtime, base) = image_host();
        let err = ImageFetcher::default()
            .fetch(&format!("{base}/gone.jpg"))
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::Network { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let (_runtime, base) = image_host();
        let fetcher = ImageFetcher::default().with_max_bytes(1024);
        let err = fetcher.fetch(&format!("{base}/large.jpg")).unwrap_err();
        assert!(matches!(err, AnnotatorError::Network { .. }));
        assert_eq!(fetcher.fetch(&format!("{base}/image.jpg")).unwrap().len(), 10);
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        let err = ImageFetcher::new(Duration::from_secs(2))
            .fetch("http://127.0.0.1:1/none.jpg")
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::Network { .. }));
    }
}
