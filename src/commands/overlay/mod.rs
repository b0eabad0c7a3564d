use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{InputKind, OcrBackend, OverlayArgs};
use crate::commands::inventory;
use crate::model::{OverlayDocumentReport, OverlayPaths, OverlayRunManifest};
use crate::ocr::{TesseractDetector, VisionDetector, WordDetector};
use crate::raster::PopplerRasterizer;
use crate::util::{
    ensure_directory, file_name_of, now_utc_string, utc_compact_string, write_json_pretty,
};

mod pipeline;
#[cfg(test)]
mod tests;

use pipeline::PagePipeline;

const OUTPUT_PREFIX: &str = "ocr_";

pub fn run(args: OverlayArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let available = inventory::discover_inputs(&args.input_dir, InputKind::Pdf)?;
    let selected = args
        .select
        .apply(&available)
        .context("failed to apply document selection")?;
    if selected.is_empty() {
        bail!(
            "no PDFs selected from {} ({} available)",
            args.input_dir.display(),
            available.len()
        );
    }

    ensure_directory(&args.output_dir)?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output_dir
            .join(format!("overlay_run_{}.json", utc_compact_string(started_ts)))
    });

    let detector = build_detector(&args)?;
    let rasterizer = PopplerRasterizer::new(args.dpi, args.temp_dir.clone());
    let calibration = args.calibration();
    let pipeline = PagePipeline::new(&rasterizer, detector.as_ref(), calibration);

    info!(
        run_id = %run_id,
        selected = selected.len(),
        available = available.len(),
        dpi = args.dpi,
        ocr_backend = args.ocr_backend.as_str(),
        "starting overlay run"
    );

    let mut documents = Vec::with_capacity(selected.len());
    let mut warnings = Vec::new();

    for (position, source) in selected.iter().enumerate() {
        let file_name = file_name_of(source);
        let output = output_path_for(&args.output_dir, &file_name);
        info!(
            document = position + 1,
            total = selected.len(),
            source = %source.display(),
            "overlay document"
        );

        match pipeline.process_document(source, &output) {
            Ok(report) => documents.push(report),
            Err(err) => {
                warn!(source = %source.display(), error = %format!("{err:#}"), "skipping document");
                warnings.push(format!("{file_name}: {err:#}"));
                documents.push(OverlayDocumentReport::failed(&file_name, format!("{err:#}")));
            }
        }
    }

    let failed = documents
        .iter()
        .filter(|document| document.status == "failed")
        .count();
    let manifest = OverlayRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        status: if failed == 0 {
            "completed".to_string()
        } else {
            "completed_with_failures".to_string()
        },
        command: std::env::args().collect::<Vec<String>>().join(" "),
        selection: args.select.to_string(),
        dpi: args.dpi,
        ocr_backend: args.ocr_backend.as_str().to_string(),
        calibration,
        paths: OverlayPaths {
            input_dir: args.input_dir.display().to_string(),
            output_dir: args.output_dir.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        documents,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote overlay run manifest");
    info!(
        documents = manifest.documents.len(),
        failed,
        "overlay run completed"
    );

    Ok(())
}

fn build_detector(args: &OverlayArgs) -> Result<Box<dyn WordDetector>> {
    match args.ocr_backend {
        OcrBackend::Vision => {
            let Some(api_key) = args.vision_api_key.as_deref().filter(|key| !key.is_empty()) else {
                bail!("vision backend requires --vision-api-key or GOOGLE_VISION_API_KEY");
            };
            let detector = VisionDetector::new(
                &args.vision_endpoint,
                api_key,
                Duration::from_secs(args.timeout_secs),
            )?;
            Ok(Box::new(detector))
        }
        OcrBackend::Tesseract => Ok(Box::new(TesseractDetector::new(&args.ocr_lang))),
    }
}

pub fn output_path_for(output_dir: &Path, file_name: &str) -> PathBuf {
    output_dir.join(format!("{OUTPUT_PREFIX}{file_name}"))
}
