use tracing::{debug, info};

use crate::{
    color::color_for,
    detector::{CoordinatePair, Detection},
    draw::Draw,
    normalize::NormalizedImage,
};

/// Draws class-colored boxes and class-id labels onto a normalized frame.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    draw: Draw,
}

impl Annotator {
    /// Mutates `image` in place and returns one corner pair per detection, in
    /// the order the detections were supplied.
    pub fn annotate(&self, image: &mut NormalizedImage, detections: &[Detection]) -> Vec<CoordinatePair> {
        let mut coordinates = Vec::with_capacity(detections.len());
        let canvas = image.as_bgr_mut();

        for (i, detection) in detections.iter().enumerate() {
            let color = color_for(detection.class_id);
            let (top_left, bottom_right) = detection.corners();

            self.draw.rectangle(canvas, top_left, bottom_right, color);
            self.draw
                .label(canvas, top_left, &detection.class_id.to_string(), color);

            debug!(
                "Bounding Box {}: ({}, {}), ({}, {})",
                i + 1,
                top_left.0,
                top_left.1,
                bottom_right.0,
                bottom_right.1
            );
            coordinates.push((top_left, bottom_right));
        }

        if detections.is_empty() {
            info!("No bounding boxes detected.");
        }
        info!("Total Bounding Boxes: {}", coordinates.len());
        coordinates
    }
}
