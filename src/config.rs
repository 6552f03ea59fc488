use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::errors::{AnnotatorError, Result};
use crate::model::Thresholds;
use crate::package::DEFAULT_JPEG_QUALITY;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the annotation endpoints over HTTP
    Serve(ServeConfig),
    /// Send a local image to a scoring endpoint and save the annotated result
    Score(ScoreClientConfig),
}

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// ONNX detection model (YOLOv8/YOLO11 export, 640x640 input)
    #[arg(short, long)]
    pub model_path: PathBuf,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    #[arg(long, default_value_t = 0.25, value_parser = check_unit_interval)]
    pub confidence: f32,

    #[arg(long, default_value_t = 0.7, value_parser = check_unit_interval)]
    pub iou_threshold: f32,

    #[arg(long, default_value_t = 300)]
    pub max_detections: usize,

    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Timeout for downloading the image of a remote-inference request
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    #[arg(long, default_value_t = 32 * 1024 * 1024)]
    pub max_body_bytes: usize,
}

impl ServeConfig {
    pub const fn thresholds(&self) -> Thresholds {
        Thresholds {
            confidence: self.confidence,
            iou: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }

    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| AnnotatorError::Configuration {
                message: format!("invalid bind address {}:{}: {e}", self.host, self.port),
            })?
            .next()
            .ok_or_else(|| AnnotatorError::Configuration {
                message: format!("bind address {}:{} resolved to nothing", self.host, self.port),
            })
    }

    /// Checks what clap cannot: the model file must exist.
    pub fn validate(&self) -> Result<()> {
        if !self.model_path.is_file() {
            return Err(AnnotatorError::Configuration {
                message: format!("model path does not exist: {}", self.model_path.display()),
            });
        }
        if self.max_detections == 0 {
            return Err(AnnotatorError::Configuration {
                message: "max-detections must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScoreClientConfig {
    /// Scoring URI accepting `{"file": <base64>}`
    #[arg(short, long)]
    pub endpoint: String,

    /// Bearer token sent in the Authorization header
    #[arg(short, long)]
    pub key: Option<String>,

    #[arg(short, long)]
    pub image: PathBuf,

    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

impl ScoreClientConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn check_unit_interval(s: &str) -> std::result::Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{s} is not a number: {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{s} is outside 0.0..=1.0"))
    }
}
