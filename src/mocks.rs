use std::io::Cursor;
use std::net::SocketAddr;

use image::{ImageFormat, RgbImage};
use parking_lot::Mutex;

use crate::detector::PredictedBox;
use crate::errors::{AnnotatorError, Result};
use crate::normalize::{NormalizedImage, MODEL_INPUT_SIZE};
use crate::traits::ObjectDetector;

/// Test detector: returns the same boxes for every frame and records the
/// dimensions of every frame it was given.
#[derive(Debug, Default)]
pub struct MockDetector {
    boxes: Vec<PredictedBox>,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl MockDetector {
    pub fn new(boxes: Vec<PredictedBox>) -> Self {
        Self {
            boxes,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Dimensions of every frame passed to `predict`, in call order.
    pub fn seen_dimensions(&self) -> Vec<(u32, u32)> {
        self.seen.lock().clone()
    }
}

impl ObjectDetector for MockDetector {
    fn predict(&self, image: &NormalizedImage) -> Result<Vec<PredictedBox>> {
        self.seen.lock().push(image.dimensions());
        Ok(self.boxes.clone())
    }

    fn input_size(&self) -> u32 {
        MODEL_INPUT_SIZE
    }
}

/// Predictor whose every call fails, standing in for a crashed backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingDetector;

impl ObjectDetector for FailingDetector {
    fn predict(&self, _image: &NormalizedImage) -> Result<Vec<PredictedBox>> {
        Err(AnnotatorError::inference("session run", "mock backend failure"))
    }

    fn input_size(&self) -> u32 {
        MODEL_INPUT_SIZE
    }
}

/// PNG-encodes `image` for use as request payload.
pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encoding an in-memory RGB image as PNG");
    buf.into_inner()
}

/// Serves `app` on an ephemeral loopback port from the current tokio
/// runtime. The server lives as long as that runtime.
pub async fn spawn_loopback(app: axum::Router) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(addr)
}
