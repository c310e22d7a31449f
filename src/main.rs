use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use platescan::detection::{OcrsRecognizer, YoloParams, YoloPlateDetector};
use platescan::{
    DetectionService, FrameAnnotator, HistoryStore, MediaPipeline, ServerConfig, StorageLayout,
    history, server, video,
};

fn main() -> anyhow::Result<()> {
    let args = ServerConfig::parse();

    let default_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    args.validate()?;
    history::init_local_offset();

    let storage = StorageLayout::new(&args.static_root);
    storage.ensure_dirs()?;

    info!("Loading plate detector from {}", args.detector_model.display());
    let detector = YoloPlateDetector::load(
        &args.detector_model,
        YoloParams {
            input_size: args.detector_input_size,
            ..Default::default()
        },
    )?;

    let ocr_dir = args.ocr_model_dir();
    info!("Loading OCR models from {}", ocr_dir.display());
    let recognizer = OcrsRecognizer::load(&ocr_dir)?;

    let annotator = match &args.font {
        Some(path) => {
            info!("Using label font {}", path.display());
            FrameAnnotator::with_font(FrameAnnotator::load_font(path)?)
        }
        None => FrameAnnotator::new()?,
    };

    let pipeline = MediaPipeline::new(
        Arc::new(detector),
        Arc::new(recognizer),
        annotator,
        video::default_backend(),
        storage,
    )
    .with_min_confidence(args.confidence);

    let service = Arc::new(DetectionService::new(
        pipeline,
        HistoryStore::new(&args.history_file),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    runtime.block_on(server::serve(
        service,
        args.bind_addr(),
        args.static_root.clone(),
        args.max_upload_bytes(),
    ))
}
