//! Mini Native 命令行宿主
//!
//! 用法: mini-native <app.js | tree.json> [--config engine.json]

use mini_native::runtime::Surface;
use mini_native::{EngineConfig, EngineError};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const IMAGE_WAIT: Duration = Duration::from_millis(500);
const IMAGE_WAIT_ROUNDS: usize = 20;

fn parse_args() -> Result<(PathBuf, Option<PathBuf>), EngineError> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut config = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args
                .next()
                .ok_or_else(|| EngineError::Config("--config requires a path".into()))?;
            config = Some(PathBuf::from(path));
        } else {
            input = Some(PathBuf::from(arg));
        }
    }
    let input = input.ok_or_else(|| EngineError::Config("usage: mini-native <app.js|tree.json> [--config engine.json]".into()))?;
    Ok((input, config))
}

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (input, config_path) = parse_args()?;
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut surface = Surface::new(config)?;
    let source = std::fs::read_to_string(&input)?;
    let is_script = input.extension().is_some_and(|ext| ext == "js");

    if is_script {
        let report = surface.load_script(&source)?;
        info!(submissions = report.submissions, rejected = report.rejected, "script loaded");
    } else {
        surface.engine_mut().submit(&source)?;
    }

    // 等待图片加载完成，最多等待 IMAGE_WAIT_ROUNDS 轮
    for _ in 0..IMAGE_WAIT_ROUNDS {
        if surface.engine().images().in_flight() == 0 {
            break;
        }
        surface.engine_mut().pump_wait(IMAGE_WAIT);
    }
    surface.pump();

    println!("{}", surface.engine().dump());

    let frames = surface.engine().layout()?;
    if let Some(root) = surface.engine().root() {
        if let Some(frame) = frames.get(&root) {
            println!("root frame: {}x{} at ({}, {})", frame.width, frame.height, frame.x, frame.y);
        }
    }
    let stats = surface.engine().stats();
    info!(mounts = stats.mounts, reconciles = stats.reconciles, fallbacks = stats.fallbacks, "done");
    Ok(())
}
