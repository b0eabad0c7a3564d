use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{InputKind, MetadataArgs};
use crate::commands::inventory;
use crate::llm::{OpenAiBackend, ResilientClient};
use crate::model::{MetadataCounts, MetadataDocumentReport, MetadataRunManifest};
use crate::selection::apply_limit;
use crate::util::{
    ensure_directory, file_name_of, now_utc_string, utc_compact_string, write_json_pretty,
};

mod extract;

use extract::{ExtractionSettings, MetadataExtractor};

pub const RESULTS_FILE_NAME: &str = "metadata_results.json";

pub fn run(args: MetadataArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    if args.limit == Some(0) {
        bail!("--limit must be at least 1");
    }
    if args.chunk_size == 0 || args.batch_size == 0 {
        bail!("--chunk-size and --batch-size must be at least 1");
    }

    let available = inventory::discover_inputs(&args.input_dir, InputKind::Text)?;
    let available_count = available.len();
    let selected = apply_limit(available, args.limit);
    if selected.is_empty() {
        bail!("no OCR text files found in {}", args.input_dir.display());
    }

    let Some(api_key) = args.openai_api_key.as_deref().filter(|key| !key.is_empty()) else {
        bail!("metadata generation requires --openai-api-key or OPENAI_API_KEY");
    };

    ensure_directory(&args.output_dir)?;
    let output_path = args.output_dir.join(RESULTS_FILE_NAME);
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output_dir
            .join(format!("metadata_run_{}.json", utc_compact_string(started_ts)))
    });

    let backend = OpenAiBackend::new(
        &args.api_base,
        api_key,
        Duration::from_secs(args.timeout_secs),
    )?;
    let client = ResilientClient::new(backend);
    let extractor = MetadataExtractor::new(
        &client,
        ExtractionSettings {
            model: args.model.clone(),
            max_tokens: args.max_tokens,
            temperature: args.temperature,
            chunk_size: args.chunk_size,
            batch_size: args.batch_size,
            dispatch: args.dispatch,
        },
    )?;

    info!(
        run_id = %run_id,
        selected = selected.len(),
        available = available_count,
        model = %args.model,
        dispatch = args.dispatch.as_str(),
        max_attempts = client.policy().max_attempts,
        "starting metadata run"
    );

    let mut records = Vec::with_capacity(selected.len());
    let mut documents = Vec::with_capacity(selected.len());
    let mut warnings = Vec::new();
    let mut counts = MetadataCounts {
        selected: selected.len(),
        ..MetadataCounts::default()
    };

    for (position, path) in selected.iter().enumerate() {
        info!(
            document = position + 1,
            total = selected.len(),
            file = %path.display(),
            "processing text file"
        );

        match extractor.extract_file(path) {
            Ok(extraction) => {
                counts.processed += 1;
                if extraction.record.is_degraded() {
                    counts.degraded += 1;
                } else {
                    counts.full += 1;
                }
                records.push(extraction.record);
                documents.push(extraction.report);
            }
            Err(err) => {
                warn!(file = %path.display(), error = %format!("{err:#}"), "skipping unreadable file");
                counts.skipped += 1;
                warnings.push(format!("{}: {err:#}", path.display()));
                documents.push(MetadataDocumentReport {
                    file_name: file_name_of(path),
                    status: "skipped".to_string(),
                    chunks: 0,
                    requests: 0,
                    error: Some(format!("{err:#}")),
                });
            }
        }
    }

    write_json_pretty(&output_path, &records)?;
    info!(path = %output_path.display(), records = records.len(), "wrote metadata results");

    let manifest = MetadataRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        status: "completed".to_string(),
        model: args.model.clone(),
        dispatch: args.dispatch.as_str().to_string(),
        chunk_size: args.chunk_size,
        batch_size: args.batch_size,
        input_dir: args.input_dir.display().to_string(),
        output_path: output_path.display().to_string(),
        counts,
        documents,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote metadata run manifest");
    info!(
        processed = manifest.counts.processed,
        full = manifest.counts.full,
        degraded = manifest.counts.degraded,
        skipped = manifest.counts.skipped,
        "metadata run completed"
    );

    Ok(())
}
