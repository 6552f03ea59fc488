use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::{
    config::ScoreClientConfig,
    errors::{AnnotatorError, Result},
    package::{decode_base64, encode_base64, AnnotationResult, ScoringRequest, ScoringResponse},
};

/// Blocking client for a JSON scoring endpoint.
#[derive(Debug, Clone)]
pub struct ScoringClient {
    agent: ureq::Agent,
    endpoint: String,
    key: Option<String>,
}

impl ScoringClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: endpoint.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key;
        self
    }

    /// Posts `image` and returns the decoded annotated JPEG with its
    /// coordinates. An `{"error": ...}` answer is returned as an error.
    pub fn score(&self, image: &[u8]) -> Result<AnnotationResult> {
        let network_error = |reason: String| AnnotatorError::Network {
            url: self.endpoint.clone(),
            reason,
        };

        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json");
        if let Some(key) = &self.key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let response = request
            .send_json(ScoringRequest {
                file: encode_base64(image),
            })
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => network_error(format!("server answered HTTP {code}")),
                ureq::Error::Transport(transport) => network_error(transport.to_string()),
            })?;
        let body: ScoringResponse = response
            .into_json()
            .map_err(|e| network_error(format!("unreadable scoring response: {e}")))?;

        match body {
            ScoringResponse::Annotated {
                annotated_image,
                coordinates,
            } => Ok(AnnotationResult {
                image: decode_base64("annotated_image", &annotated_image)?,
                coordinates,
            }),
            ScoringResponse::Failed { error } => {
                Err(AnnotatorError::inference("remote scoring", error))
            }
        }
    }
}

/// `photo.png` -> `<dir>/photo_annotated.jpg`
pub fn annotated_path(output_dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    output_dir.join(format!("{stem}_annotated.jpg"))
}

/// Scores one local image and writes the annotated copy. Returns the
/// written path.
pub fn run(config: &ScoreClientConfig) -> Result<PathBuf> {
    let image = fs::read(&config.image)?;
    info!(
        "Sending {} ({} bytes) to {}",
        config.image.display(),
        image.len(),
        config.endpoint
    );

    let client = ScoringClient::new(&config.endpoint, config.timeout()).with_key(config.key.clone());
    let result = client.score(&image)?;

    for (i, ((x1, y1), (x2, y2))) in result.coordinates.iter().enumerate() {
        info!("Bounding Box {}: ({x1}, {y1}), ({x2}, {y2})", i + 1);
    }
    info!("Total Bounding Boxes: {}", result.coordinates.len());

    fs::create_dir_all(&config.output_dir)?;
    let path = annotated_path(&config.output_dir, &config.image);
    fs::write(&path, &result.image)?;
    info!("Annotated image saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotated_path() {
        assert_eq!(
            annotated_path(Path::new("out"), Path::new("/data/roof009.jpg")),
            PathBuf::from("out/roof009_annotated.jpg")
        );
        assert_eq!(
            annotated_path(Path::new("."), Path::new("scan.tar.png")),
            PathBuf::from("./scan.tar_annotated.jpg")
        );
    }

    #[test]
    fn test_unreachable_endpoint_is_network_error() {
        let client = ScoringClient::new("http://127.0.0.1:1/score", Duration::from_secs(2));
        let err = client.score(b"bytes").unwrap_err();
        assert!(matches!(err, AnnotatorError::Network { .. }));
    }
}
