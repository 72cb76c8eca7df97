use anyhow::{Context, Result, bail};
use chrono::Utc;
use selfie_vision::core_modules::face::FaceDetector;
use selfie_vision::core_modules::skin_detector::SkinRegionDetector;
use selfie_vision::{CapturePipeline, CapturedImage, DetectorHandle, Frame, FrameQualityAnalyzer, StableStatus, StatusFeed};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEBOUNCE_COUNT: u32 = 3;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("visual_tester=info,selfie_vision=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .init();
}

/// Every png/jpeg in `dir`, in lexicographic order.
fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn load_frame(path: &Path, index: u64) -> Result<Frame> {
    let image = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
    Ok(Frame::from_dynamic(&image, index))
}

fn write_capture(image: &CapturedImage, output: &Path) -> Result<()> {
    let bytes = image.jpeg_bytes().context("captured image is not a base64 data URI")?;
    fs::write(output, bytes).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // --- 1. Argument Parsing ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: visual_tester <frames_dir> [output.jpg]");
        return Ok(());
    }
    let frames_dir = PathBuf::from(&args[1]);
    let output = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("capture.jpg"));

    let paths = frame_paths(&frames_dir)?;
    if paths.is_empty() {
        bail!("no png or jpeg frames in {}", frames_dir.display());
    }
    info!(frames = paths.len(), dir = %frames_dir.display(), "replaying frames");

    // --- 2. Engine Setup ---
    let detector = DetectorHandle::spawn_load(async {
        Ok(Arc::new(SkinRegionDetector::default()) as Arc<dyn FaceDetector>)
    });
    let model = detector.wait_settled().await;
    let analyzer = FrameQualityAnalyzer::default();
    let status = StatusFeed::new(DEBOUNCE_COUNT);
    let pipeline = CapturePipeline::default();
    let mut captured = None;

    // --- 3. Replay Loop ---
    println!("{:>5}  {:<16} {:<16} {:>10} {:>6} {:>8}", "frame", "classification", "status", "brightness", "faces", "area");
    for (index, path) in paths.iter().enumerate() {
        let frame = load_frame(path, index as u64)?;
        let report = match analyzer.analyze(&frame, &model) {
            Ok(Some(report)) => report,
            Ok(None) => continue,
            Err(err) => {
                warn!(frame = index, error = %err, "detection failed; skipping frame");
                continue;
            }
        };
        let step = status.push(report.classification);

        println!(
            "{:>5}  {:<16} {:<16} {:>10} {:>6} {:>8}{}{}",
            index,
            report.classification.to_string(),
            step.status.to_string(),
            report.brightness.map_or("-".to_string(), |b| format!("{b:.1}")),
            report.face_count,
            report.face_area_ratio.map_or("-".to_string(), |r| format!("{r:.3}")),
            if report.too_close { "  too close" } else { "" },
            if step.changed { "  *" } else { "" },
        );

        // --- 4. Capture ---
        if captured.is_none() && step.status == StableStatus::Acceptable {
            match pipeline.capture(&frame, step.status, Utc::now()) {
                Ok(image) => {
                    info!(frame = index, marker = %image.marker, "captured");
                    captured = Some(image);
                }
                Err(err) => warn!(frame = index, error = %err, "capture failed"),
            }
        }
    }

    match captured {
        Some(image) => {
            write_capture(&image, &output)?;
            println!("capture written to {} ({}x{})", output.display(), image.width, image.height);
        }
        None => println!("no frame reached a stable acceptable status; final status: {}", status.current()),
    }
    Ok(())
}
