pub mod annotate;
pub mod client;
pub mod color;
pub mod config;
pub mod detector;
pub mod draw;
pub mod errors;
pub mod fetch;
pub mod imageops_ai;
pub mod model;
pub mod normalize;
pub mod package;
pub mod server;
pub mod traits;

pub mod mocks;

use tracing::{debug, error, info};

pub use annotate::Annotator;
pub use config::{Cli, Command, ScoreClientConfig, ServeConfig};
pub use detector::{CoordinatePair, Detection, PredictedBox};
pub use errors::{AnnotatorError, Result};
pub use fetch::ImageFetcher;
pub use model::{Model, Thresholds};
pub use normalize::{normalize, NormalizedImage, MODEL_INPUT_SIZE};
pub use package::{AnnotationResult, BoxCenter, ScoringResponse, DEFAULT_JPEG_QUALITY};
pub use traits::*;

/// Normalize -> detect -> annotate -> package, around an injected predictor.
///
/// One instance is built at startup and shared read-only by every request;
/// all per-request state lives on the stack of the calling method.
pub struct AnnotationPipeline<D: ObjectDetector> {
    detector: D,
    annotator: Annotator,
    fetcher: ImageFetcher,
    jpeg_quality: u8,
}

impl<D: ObjectDetector> AnnotationPipeline<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            annotator: Annotator::default(),
            fetcher: ImageFetcher::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub const fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn with_fetcher(mut self, fetcher: ImageFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub const fn detector(&self) -> &D {
        &self.detector
    }

    /// Full pipeline on encoded image bytes.
    pub fn annotate(&self, raw: &[u8]) -> Result<AnnotationResult> {
        let mut image = normalize::normalize_to(raw, self.detector.input_size())?;
        debug!("image resized to {}x{}", image.width(), image.height());

        let detections = detector::detect(&self.detector, &image)?;
        let coordinates = self.annotator.annotate(&mut image, &detections);
        package::package(image, coordinates, self.jpeg_quality)
    }

    /// Direct-upload variant: JPEG bytes, failures propagate to the caller.
    pub fn annotate_to_jpeg(&self, raw: &[u8]) -> Result<Vec<u8>> {
        self.annotate(raw).map(AnnotationResult::into_jpeg)
    }

    /// JSON scoring variant. Never fails: every error becomes the
    /// `{"error": ...}` shape.
    pub fn score(&self, raw_request: &[u8]) -> ScoringResponse {
        info!("Run started");
        match self.try_score(raw_request) {
            Ok(response) => {
                info!("Run completed");
                response
            }
            Err(e) => {
                error!("Error during processing: {e}");
                ScoringResponse::failed(&e)
            }
        }
    }

    fn try_score(&self, raw_request: &[u8]) -> Result<ScoringResponse> {
        let request: package::ScoringRequest = serde_json::from_slice(raw_request)
            .map_err(|e| AnnotatorError::validation("request body", e.to_string()))?;
        let image_bytes = package::decode_base64("file", &request.file)?;
        debug!("decoded {} image bytes from request", image_bytes.len());
        Ok(self.annotate(&image_bytes)?.into_scoring_response())
    }

    /// Detection only, on already-downloaded bytes. Centers and sizes are
    /// rescaled to the source image's pixel space.
    pub fn locate(&self, raw: &[u8]) -> Result<Vec<BoxCenter>> {
        let image = normalize::normalize_to(raw, self.detector.input_size())?;
        let (source_w, source_h) = image.source_dimensions();
        let scale_x = source_w as f32 / image.width() as f32;
        let scale_y = source_h as f32 / image.height() as f32;

        let predictions = self.detector.predict(&image)?;
        info!("Total Bounding Boxes: {}", predictions.len());
        Ok(predictions
            .iter()
            .map(|pred| BoxCenter::from_prediction(pred, scale_x, scale_y))
            .collect())
    }

    /// Remote-inference variant: fetch `image_url`, then [`Self::locate`].
    pub fn locate_url(&self, image_url: &str) -> Result<Vec<BoxCenter>> {
        let raw = self.fetcher.fetch(image_url)?;
        self.locate(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{png_bytes, FailingDetector, MockDetector};
    use image::{Rgb, RgbImage};

    #[test]
    fn test_annotate_keeps_every_detection() -> Result<()> {
        let boxes = (0..7)
            .map(|i| PredictedBox::new(i, 0.5, [i as f32 * 80.0, 100.0, i as f32 * 80.0 + 40.0, 200.0]))
            .collect();
        let pipeline = AnnotationPipeline::new(MockDetector::new(boxes));
        let result = pipeline.annotate(&png_bytes(&RgbImage::new(320, 200)))?;
        assert_eq!(result.coordinates.len(), 7);
        Ok(())
    }

    #[test]
    fn test_locate_rescales_to_source_frame() -> Result<()> {
        let pipeline = AnnotationPipeline::new(MockDetector::new(vec![PredictedBox::new(
            2,
            0.9,
            [64.0, 64.0, 128.0, 192.0],
        )]));
        let raw = png_bytes(&RgbImage::from_pixel(1280, 320, Rgb([9, 9, 9])));
        let centers = pipeline.locate(&raw)?;

        assert_eq!(
            centers,
            vec![BoxCenter {
                class_id: 2,
                x_center: 192.0,
                y_center: 64.0,
                width: 128.0,
                height: 64.0,
            }]
        );
        Ok(())
    }

    #[test]
    fn test_score_maps_inference_failure_to_error_shape() {
        let pipeline = AnnotationPipeline::new(FailingDetector);
        let body = serde_json::json!({ "file": package::encode_base64(&png_bytes(&RgbImage::new(8, 8))) });
        let response = pipeline.score(body.to_string().as_bytes());
        match response {
            ScoringResponse::Failed { error } => assert!(error.starts_with("Inference error")),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_score_rejects_malformed_requests() {
        let pipeline = AnnotationPipeline::new(MockDetector::empty());
        for body in [&b"not json"[..], br#"{"image": "AAAA"}"#, br#"{"file": "%%%"}"#] {
            assert!(pipeline.score(body).is_error());
        }
    }
}
