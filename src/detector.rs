use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;
use crate::normalize::NormalizedImage;
use crate::traits::ObjectDetector;

/// One raw box as produced by a predictor, in floating-point pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedBox {
    pub class_id: u32,
    pub confidence: f32,
    pub xyxy: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl PredictedBox {
    pub const fn new(class_id: u32, confidence: f32, xyxy: [f32; 4]) -> Self {
        Self {
            class_id,
            confidence,
            xyxy,
        }
    }

    /// Center x, center y, width, height.
    pub fn xywh(&self) -> [f32; 4] {
        let [x1, y1, x2, y2] = self.xyxy;
        [(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1]
    }

    pub fn area(&self) -> f32 {
        let [x1, y1, x2, y2] = self.xyxy;
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    pub fn iou(&self, other: &Self) -> f32 {
        let [ax1, ay1, ax2, ay2] = self.xyxy;
        let [bx1, by1, bx2, by2] = other.xyxy;
        let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Integer pixel rectangle with its class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// `((x1, y1), (x2, y2))`, serialized as `[[x1, y1], [x2, y2]]`.
pub type CoordinatePair = ((i32, i32), (i32, i32));

impl Detection {
    pub const fn new(class_id: u32, x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            class_id,
            x1,
            y1,
            x2,
            y2,
        }
    }

    pub const fn corners(&self) -> CoordinatePair {
        ((self.x1, self.y1), (self.x2, self.y2))
    }
}

impl From<&PredictedBox> for Detection {
    /// Corners are truncated toward zero, never rounded to nearest.
    fn from(pred: &PredictedBox) -> Self {
        let [x1, y1, x2, y2] = pred.xyxy;
        Self::new(pred.class_id, x1 as i32, y1 as i32, x2 as i32, y2 as i32)
    }
}

/// Runs the predictor on one frame and converts its boxes to integer
/// detections, keeping the predictor's order.
pub fn detect<D: ObjectDetector + ?Sized>(
    detector: &D,
    image: &NormalizedImage,
) -> Result<Vec<Detection>> {
    let predictions = detector.predict(image)?;
    debug!("predictor returned {} boxes", predictions.len());
    Ok(predictions.iter().map(Detection::from).collect())
}
