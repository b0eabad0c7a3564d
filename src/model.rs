use serde::{Deserialize, Serialize};

use crate::geometry::Calibration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEntry {
    pub index: usize,
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub kind: String,
    pub item_count: usize,
    pub items: Vec<InputEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageIssue {
    pub page: usize,
    pub stage: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayDocumentReport {
    pub source: String,
    pub output: Option<String>,
    pub pages_total: usize,
    pub pages_rendered: usize,
    pub pages_skipped: usize,
    pub pages_without_text: usize,
    pub words_placed: usize,
    pub status: String,
    pub error: Option<String>,
    pub page_issues: Vec<PageIssue>,
}

impl OverlayDocumentReport {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            output: None,
            pages_total: 0,
            pages_rendered: 0,
            pages_skipped: 0,
            pages_without_text: 0,
            words_placed: 0,
            status: "pending".to_string(),
            error: None,
            page_issues: Vec::new(),
        }
    }

    pub fn failed(source: &str, error: String) -> Self {
        Self {
            status: "failed".to_string(),
            error: Some(error),
            ..Self::new(source)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayPaths {
    pub input_dir: String,
    pub output_dir: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub status: String,
    pub command: String,
    pub selection: String,
    pub dpi: u32,
    pub ocr_backend: String,
    pub calibration: Calibration,
    pub paths: OverlayPaths,
    pub documents: Vec<OverlayDocumentReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataCounts {
    pub selected: usize,
    pub processed: usize,
    pub full: usize,
    pub degraded: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataDocumentReport {
    pub file_name: String,
    pub status: String,
    pub chunks: usize,
    pub requests: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub status: String,
    pub model: String,
    pub dispatch: String,
    pub chunk_size: usize,
    pub batch_size: usize,
    pub input_dir: String,
    pub output_path: String,
    pub counts: MetadataCounts,
    pub documents: Vec<MetadataDocumentReport>,
    pub warnings: Vec<String>,
}
