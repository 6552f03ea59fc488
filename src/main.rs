use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yolo_annotator::{
    client, server, AnnotationPipeline, Cli, Command, ImageFetcher, Model, ServeConfig,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Serve(config) => serve(&config),
        Command::Score(config) => {
            let path = client::run(&config)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn serve(config: &ServeConfig) -> Result<()> {
    config.validate()?;
    let addr = config.bind_address()?;

    let model = Model::new(&config.model_path, config.device_id, config.thresholds())
        .with_context(|| format!("loading {}", config.model_path.display()))?;
    info!("model loaded from {}", config.model_path.display());

    let pipeline = AnnotationPipeline::new(model)
        .with_jpeg_quality(config.jpeg_quality)
        .with_fetcher(ImageFetcher::new(config.fetch_timeout()));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(Arc::new(pipeline), addr, config.max_body_bytes))?;
    Ok(())
}
