use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::chunking::{batch_chunks, chunk_text};
use crate::cli::DispatchMode;
use crate::llm::{CompletionBackend, CompletionRequest, FetchError, Pause, ResilientClient};
use crate::metadata::{MetadataRecord, ResponseParser, build_prompt};
use crate::model::MetadataDocumentReport;
use crate::util::file_name_of;

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub chunk_size: usize,
    pub batch_size: usize,
    pub dispatch: DispatchMode,
}

pub struct Extraction {
    pub record: MetadataRecord,
    pub report: MetadataDocumentReport,
}

pub struct MetadataExtractor<'a, B, P> {
    client: &'a ResilientClient<B, P>,
    parser: ResponseParser,
    settings: ExtractionSettings,
}

impl<'a, B: CompletionBackend, P: Pause> MetadataExtractor<'a, B, P> {
    pub fn new(client: &'a ResilientClient<B, P>, settings: ExtractionSettings) -> Result<Self> {
        Ok(Self {
            client,
            parser: ResponseParser::new()?,
            settings,
        })
    }

    pub fn extract_file(&self, path: &Path) -> Result<Extraction> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.extract(&file_name_of(path), &text))
    }

    pub fn extract(&self, file_name: &str, text: &str) -> Extraction {
        let chunks = chunk_text(text, self.settings.chunk_size);
        let batches = batch_chunks(&chunks, self.settings.batch_size);
        debug!(
            file = %file_name,
            chars = text.chars().count(),
            chunks = chunks.len(),
            batches = batches.len(),
            "prepared document text"
        );

        let mut errors = Vec::new();
        let (record, requests) = match self.settings.dispatch {
            DispatchMode::Document => {
                let record = match self.request(&build_prompt(&chunks.concat())) {
                    Ok(content) => self.parser.parse_or_degrade(file_name, &content),
                    Err(err) => {
                        warn!(file = %file_name, category = err.category(), error = %err, "no metadata obtained");
                        errors.push(err.to_string());
                        MetadataRecord::degraded(file_name)
                    }
                };
                (record, 1)
            }
            DispatchMode::Batch => {
                let mut records = Vec::with_capacity(batches.len());
                for (index, batch) in batches.iter().enumerate() {
                    match self.request(&build_prompt(batch)) {
                        Ok(content) => records.push(self.parser.parse_or_degrade(file_name, &content)),
                        Err(err) => {
                            warn!(
                                file = %file_name,
                                batch = index + 1,
                                category = err.category(),
                                error = %err,
                                "no metadata obtained for batch"
                            );
                            errors.push(format!("batch {}: {}", index + 1, err));
                        }
                    }
                }
                (MetadataRecord::merge(records, file_name), batches.len())
            }
        };

        let status = if record.is_degraded() { "degraded" } else { "full" };
        info!(file = %file_name, status, requests, "metadata extracted");

        Extraction {
            record,
            report: MetadataDocumentReport {
                file_name: file_name.to_string(),
                status: status.to_string(),
                chunks: chunks.len(),
                requests,
                error: (!errors.is_empty()).then(|| errors.join("; ")),
            },
        }
    }

    fn request(&self, prompt: &str) -> Result<String, FetchError> {
        let request = CompletionRequest::new(
            &self.settings.model,
            prompt.to_string(),
            self.settings.max_tokens,
            self.settings.temperature,
        );
        let completion = self.client.fetch(&request)?;
        debug!(
            attempts = completion.attempts,
            shrinks = completion.shrinks,
            prompt_chars = completion.prompt_chars,
            max_tokens = completion.max_tokens,
            "completion received"
        );
        Ok(completion.content)
    }
}
