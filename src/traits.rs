use crate::detector::PredictedBox;
use crate::errors::Result;
use crate::normalize::NormalizedImage;

/// Opaque object-detection predictor.
///
/// The pipeline only depends on this seam, so the ONNX model, mocks and any
/// other backend are interchangeable. Implementations are shared across
/// concurrent requests and must serialize internally if their backend cannot
/// run concurrently.
pub trait ObjectDetector: Send + Sync {
    /// Runs inference on a single normalized frame.
    ///
    /// Boxes are in the frame's pixel space; an empty vector is a normal
    /// outcome.
    fn predict(&self, image: &NormalizedImage) -> Result<Vec<PredictedBox>>;

    /// Side length of the square input the predictor was trained at.
    fn input_size(&self) -> u32;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for std::sync::Arc<D> {
    fn predict(&self, image: &NormalizedImage) -> Result<Vec<PredictedBox>> {
        (**self).predict(image)
    }

    fn input_size(&self) -> u32 {
        (**self).input_size()
    }
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn predict(&self, image: &NormalizedImage) -> Result<Vec<PredictedBox>> {
        (**self).predict(image)
    }

    fn input_size(&self) -> u32 {
        (**self).input_size()
    }
}
