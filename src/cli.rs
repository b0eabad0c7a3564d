use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::chunking::{DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE};
use crate::geometry::{Calibration, DEFAULT_FONT_SCALE, DEFAULT_OFFSET_X, DEFAULT_OFFSET_Y};
use crate::llm::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_OPENAI_API_BASE, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT_SECS,
};
use crate::ocr::DEFAULT_VISION_ENDPOINT;
use crate::raster::DEFAULT_DPI;
use crate::selection::Selection;

#[derive(Parser, Debug)]
#[command(
    name = "scanlayer",
    version,
    about = "Searchable PDFs from scans and LLM metadata from OCR text"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Overlay(OverlayArgs),
    Metadata(MetadataArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum InputKind {
    Pdf,
    Text,
}

impl InputKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = InputKind::Pdf)]
    pub kind: InputKind,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrBackend {
    Vision,
    Tesseract,
}

impl OcrBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Tesseract => "tesseract",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OverlayArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "all")]
    pub select: Selection,

    #[arg(long, default_value_t = DEFAULT_DPI)]
    pub dpi: u32,

    #[arg(long, value_enum, default_value_t = OcrBackend::Vision)]
    pub ocr_backend: OcrBackend,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    pub vision_api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_VISION_ENDPOINT)]
    pub vision_endpoint: String,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_OFFSET_X, allow_negative_numbers = true)]
    pub offset_x: i32,

    #[arg(long, default_value_t = DEFAULT_OFFSET_Y, allow_negative_numbers = true)]
    pub offset_y: i32,

    #[arg(long, default_value_t = DEFAULT_FONT_SCALE)]
    pub font_scale: f32,

    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

impl OverlayArgs {
    pub fn calibration(&self) -> Calibration {
        Calibration {
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            font_scale: self.font_scale,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DispatchMode {
    Document,
    Batch,
}

impl DispatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Batch => "batch",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MetadataArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long, value_enum, default_value_t = DispatchMode::Document)]
    pub dispatch: DispatchMode,

    #[arg(long, default_value = DEFAULT_OPENAI_API_BASE)]
    pub api_base: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}
