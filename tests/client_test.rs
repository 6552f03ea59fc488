use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;
use tokio::runtime::Runtime;

use yolo_annotator::{
    client,
    mocks::{png_bytes, spawn_loopback, FailingDetector, MockDetector},
    server::router,
    AnnotationPipeline, AnnotatorError, ObjectDetector, PredictedBox, ScoreClientConfig,
};

/// Runs the router on a loopback port for as long as the returned runtime lives.
fn spawn_server<D: ObjectDetector + 'static>(detector: D) -> (Runtime, SocketAddr) {
    let runtime = Runtime::new().unwrap();
    let app = router(Arc::new(AnnotationPipeline::new(detector)), 8 * 1024 * 1024);
    let addr = runtime.block_on(spawn_loopback(app)).unwrap();
    (runtime, addr)
}

fn config(addr: SocketAddr, image: PathBuf, output_dir: PathBuf) -> ScoreClientConfig {
    ScoreClientConfig {
        endpoint: format!("http://{addr}/score"),
        key: Some("secret".to_string()),
        image,
        output_dir,
        timeout_secs: 10,
    }
}

#[test]
fn test_client_writes_annotated_image() {
    let (_runtime, addr) = spawn_server(MockDetector::new(vec![PredictedBox::new(
        4,
        0.9,
        [20.0, 20.0, 200.0, 120.0],
    )]));
    let temp_dir = TempDir::new().unwrap();
    let image_path = temp_dir.path().join("roof009.png");
    std::fs::write(&image_path, png_bytes(&RgbImage::from_pixel(400, 300, Rgb([90, 90, 90])))).unwrap();
    let output_dir = temp_dir.path().join("out");

    let written = client::run(&config(addr, image_path, output_dir.clone())).unwrap();

    assert_eq!(written, output_dir.join("roof009_annotated.jpg"));
    let saved = image::open(&written).unwrap();
    assert_eq!((saved.width(), saved.height()), (640, 640));
}

#[test]
fn test_client_reports_remote_failure() {
    let (_runtime, addr) = spawn_server(FailingDetector);
    let temp_dir = TempDir::new().unwrap();
    let image_path = temp_dir.path().join("roof.png");
    std::fs::write(&image_path, png_bytes(&RgbImage::new(32, 32))).unwrap();

    let err = client::run(&config(addr, image_path, temp_dir.path().to_path_buf())).unwrap_err();

    assert!(matches!(err, AnnotatorError::Inference { .. }));
    assert!(err.to_string().contains("mock backend failure"));
    assert!(!temp_dir.path().join("roof_annotated.jpg").exists());
}

#[test]
fn test_client_missing_image() {
    let temp_dir = TempDir::new().unwrap();
    let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
    let err = client::run(&config(
        addr,
        temp_dir.path().join("absent.png"),
        temp_dir.path().to_path_buf(),
    ))
    .unwrap_err();
    assert!(matches!(err, AnnotatorError::Configuration { .. }));
}
