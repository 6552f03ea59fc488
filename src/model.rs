use std::path::Path;

use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    detector::PredictedBox,
    errors::{AnnotatorError, Result},
    normalize::{NormalizedImage, MODEL_INPUT_SIZE},
    traits::ObjectDetector,
};

/// Post-processing knobs for the raw YOLO head output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Boxes whose best class score is not above this are dropped.
    pub confidence: f32,
    /// Same-class boxes overlapping a kept box by more than this are suppressed.
    pub iou: f32,
    pub max_detections: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.7,
            max_detections: 300,
        }
    }
}

/// YOLOv8/YOLO11 detection export running on ONNX Runtime.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex
/// and concurrent requests take turns only for the duration of the run call.
pub struct Model {
    pub image_size: u32,
    thresholds: Thresholds,
    session: Mutex<Session>,
}

impl Model {
    pub fn new(model_path: &Path, device_id: i32, thresholds: Thresholds) -> Result<Self> {
        if !model_path.is_file() {
            return Err(AnnotatorError::Configuration {
                message: format!("model file not found: {}", model_path.display()),
            });
        }

        info!("loading model from {}", model_path.display());
        let mut session = SessionBuilder::new()
            .map_err(|e| AnnotatorError::inference("session builder init", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| AnnotatorError::inference("execution provider setup", e))?
            .with_memory_pattern(true)
            .map_err(|e| AnnotatorError::inference("memory pattern setup", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                AnnotatorError::inference(
                    &format!("model file load: {}", model_path.display()),
                    e,
                )
            })?;

        let image_size = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .and_then(|shape| shape.get(3).copied())
            .filter(|&dim| dim > 0)
            .map_or(MODEL_INPUT_SIZE, |dim| dim as u32);

        if image_size != MODEL_INPUT_SIZE {
            return Err(AnnotatorError::Configuration {
                message: format!(
                    "model expects {image_size}x{image_size} input, pipeline produces {MODEL_INPUT_SIZE}x{MODEL_INPUT_SIZE}"
                ),
            });
        }

        // warm up
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        session
            .run(ort::inputs![TensorRef::from_array_view(&data)
                .map_err(|e| AnnotatorError::inference("warm-up tensor creation", e))?])
            .map_err(|e| AnnotatorError::inference("warm-up run", e))?;
        info!("model ready ({image_size}x{image_size} input)");

        Ok(Self {
            image_size,
            thresholds,
            session: Mutex::new(session),
        })
    }

    /// Runs the session and returns the head output as `[anchors, 4 + classes]`.
    fn run(&self, tensor: ArrayView4<f32>) -> Result<Array2<f32>> {
        let input = tensor.as_standard_layout();
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![TensorRef::from_array_view(&input)
                .map_err(|e| AnnotatorError::inference("input tensor creation", e))?])
            .map_err(|e| AnnotatorError::inference("session run", e))?;
        let raw = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| AnnotatorError::inference("output extraction", e))?;
        let anchors = to_anchor_major(raw)?;
        Ok(anchors)
    }
}

impl ObjectDetector for Model {
    fn predict(&self, image: &NormalizedImage) -> Result<Vec<PredictedBox>> {
        let tensor = preprocess(image);
        let output = self.run(tensor.view())?;
        let boxes = postprocess(output.view(), image.dimensions(), &self.thresholds);
        debug!("{} boxes after NMS", boxes.len());
        Ok(boxes)
    }

    fn input_size(&self) -> u32 {
        self.image_size
    }
}

/// BGR `u8` frame to an RGB `[1, 3, H, W]` tensor scaled to `[0, 1]`.
pub fn preprocess(image: &NormalizedImage) -> Array4<f32> {
    // channel axis reversed: BGR -> RGB
    let tensor = image
        .as_bgr()
        .as_ndarray3()
        .slice_move(s![NewAxis, ..;-1, .., ..]);
    tensor.mapv(|v| f32::from(v) / 255.0)
}

/// Normalizes a `[1, F, N]` or `[1, N, F]` head output to `[N, F]`.
///
/// The feature axis (`4 + classes`) is assumed to be the shorter one.
pub fn to_anchor_major(raw: ArrayViewD<f32>) -> Result<Array2<f32>> {
    let raw = raw.into_dimensionality::<Ix3>()?;
    if raw.shape()[0] != 1 {
        return Err(AnnotatorError::inference(
            "output shape check",
            format!("expected batch of 1, got {:?}", raw.shape()),
        ));
    }
    let head = raw.index_axis_move(Axis(0), 0);
    let (rows, cols) = head.dim();
    let anchors = if rows <= cols {
        head.t().to_owned()
    } else {
        head.to_owned()
    };
    if anchors.ncols() < 4 {
        return Err(AnnotatorError::inference(
            "output shape check",
            format!("expected at least 4 box features, got {:?}", anchors.shape()),
        ));
    }
    Ok(anchors)
}

/// Confidence filtering, center-to-corner conversion, clamping and per-class
/// NMS over `[anchors, 4 + classes]` rows of `cx, cy, w, h, scores...`.
pub fn postprocess(
    output: ArrayView2<f32>,
    (width, height): (u32, u32),
    thresholds: &Thresholds,
) -> Vec<PredictedBox> {
    let (max_x, max_y) = (width as f32, height as f32);
    let mut candidates = Vec::new();

    for row in output.rows() {
        let Some((class_id, score)) = row
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        if score <= thresholds.confidence {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let xyxy = [
            (cx - w / 2.0).clamp(0.0, max_x),
            (cy - h / 2.0).clamp(0.0, max_y),
            (cx + w / 2.0).clamp(0.0, max_x),
            (cy + h / 2.0).clamp(0.0, max_y),
        ];
        candidates.push(PredictedBox::new(class_id as u32, score, xyxy));
    }

    debug!("{} candidates above confidence threshold", candidates.len());
    non_max_suppression(candidates, thresholds.iou, thresholds.max_detections)
}

/// Greedy per-class NMS; the result is sorted by descending confidence.
pub fn non_max_suppression(
    mut candidates: Vec<PredictedBox>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<PredictedBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<PredictedBox> = Vec::with_capacity(candidates.len().min(max_detections));
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
