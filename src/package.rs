use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    detector::{CoordinatePair, PredictedBox},
    errors::{AnnotatorError, Result},
    normalize::NormalizedImage,
};

/// JPEG quality used unless configured otherwise.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Output of one annotation run: the encoded JPEG and the box corners in
/// detector order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationResult {
    pub image: Vec<u8>,
    pub coordinates: Vec<CoordinatePair>,
}

impl AnnotationResult {
    /// Binary transport: the raw JPEG bytes.
    pub fn into_jpeg(self) -> Vec<u8> {
        self.image
    }

    /// Text transport: base64 image plus coordinates.
    pub fn into_scoring_response(self) -> ScoringResponse {
        ScoringResponse::Annotated {
            annotated_image: encode_base64(&self.image),
            coordinates: self.coordinates,
        }
    }
}

/// Wire shape of the JSON scoring entrypoint.
///
/// Exactly one of the two shapes is ever produced; there are no partial
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoringResponse {
    Annotated {
        annotated_image: String,
        coordinates: Vec<CoordinatePair>,
    },
    Failed {
        error: String,
    },
}

impl ScoringResponse {
    pub fn failed(err: &AnnotatorError) -> Self {
        Self::Failed {
            error: err.to_string(),
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Request body of the JSON scoring entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub file: String,
}

/// Request body of the remote-inference entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocateRequest {
    pub image_url: String,
}

/// Center/size description of one detection, as returned by the
/// remote-inference entrypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCenter {
    #[serde(rename = "class")]
    pub class_id: u32,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxCenter {
    /// Converts a predicted box, scaling each axis by the given factor.
    pub fn from_prediction(pred: &PredictedBox, scale_x: f32, scale_y: f32) -> Self {
        let [x_center, y_center, width, height] = pred.xywh();
        Self {
            class_id: pred.class_id,
            x_center: x_center * scale_x,
            y_center: y_center * scale_y,
            width: width * scale_x,
            height: height * scale_y,
        }
    }
}

/// Encodes and consumes the annotated frame.
pub fn package(
    image: NormalizedImage,
    coordinates: Vec<CoordinatePair>,
    quality: u8,
) -> Result<AnnotationResult> {
    let image = encode_jpeg(&image, quality)?;
    debug!("encoded annotated image ({} bytes)", image.len());
    Ok(AnnotationResult { image, coordinates })
}

pub fn encode_jpeg(image: &NormalizedImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|source| AnnotatorError::Encode { source })?;
    Ok(buf)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Standard-alphabet base64 decode; ASCII whitespace (line wrapping) is ignored.
pub fn decode_base64(field: &str, text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AnnotatorError::validation(field, format!("is not valid base64: {e}")))
}
