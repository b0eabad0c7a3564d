use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{InputKind, InventoryArgs};
use crate::model::{InputEntry, InputInventoryManifest};
use crate::util::{discover_files, file_name_of, now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.input_dir, args.kind)?;

    for item in &manifest.items {
        info!(index = item.index, file = %item.file_name, size_bytes = item.size_bytes, "input");
    }

    if args.dry_run {
        info!(
            item_count = manifest.item_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.input_dir
            .join("manifests")
            .join(format!("{}_inventory.json", args.kind.as_str()))
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(item_count = manifest.item_count, "inventory completed");

    Ok(())
}

pub fn discover_inputs(input_dir: &Path, kind: InputKind) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        bail!("input directory does not exist: {}", input_dir.display());
    }

    discover_files(input_dir, kind.extension())
}

pub fn build_manifest(input_dir: &Path, kind: InputKind) -> Result<InputInventoryManifest> {
    let paths = discover_inputs(input_dir, kind)?;

    let mut items = Vec::with_capacity(paths.len());
    for (position, path) in paths.iter().enumerate() {
        let size_bytes = fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let sha256 = sha256_file(path)?;

        items.push(InputEntry {
            index: position + 1,
            file_name: file_name_of(path),
            size_bytes,
            sha256,
        });
    }

    Ok(InputInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        kind: kind.as_str().to_string(),
        item_count: items.len(),
        items,
    })
}
