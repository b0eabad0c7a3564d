use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{DetectedBlock, DetectedPage, DetectedParagraph, WordDetector, word_from_raw};

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

pub struct VisionDetector {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl VisionDetector {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build vision http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl WordDetector for VisionDetector {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn detect(&self, image_path: &Path) -> Result<DetectedPage> {
        let content = fs::read(image_path)
            .with_context(|| format!("failed to read raster {}", image_path.display()))?;

        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(&content) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .context("vision request failed")?;

        let status = response.status();
        let raw = response.text().context("failed to read vision response")?;
        if !status.is_success() {
            bail!("vision returned {}: {}", status.as_u16(), raw.trim());
        }

        debug!(bytes = raw.len(), "vision response received");
        parse_annotate_response(&raw)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<StatusMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusMessage {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    pages: Vec<VisionPage>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionPage {
    #[serde(default)]
    blocks: Vec<VisionBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionBlock {
    #[serde(default)]
    paragraphs: Vec<VisionParagraph>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionParagraph {
    #[serde(default)]
    words: Vec<VisionWord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionWord {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    symbols: Vec<VisionSymbol>,
}

#[derive(Debug, Default, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<VisionVertex>,
}

// Vision omits zero-valued coordinates.
#[derive(Debug, Default, Deserialize)]
struct VisionVertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Debug, Default, Deserialize)]
struct VisionSymbol {
    #[serde(default)]
    text: String,
}

pub(super) fn parse_annotate_response(raw: &str) -> Result<DetectedPage> {
    let response: AnnotateResponse =
        serde_json::from_str(raw).context("failed to parse vision response")?;

    let mut detected = DetectedPage::default();
    for image in response.responses {
        if let Some(error) = image.error.filter(|error| error.code != 0) {
            bail!("vision reported error {}: {}", error.code, error.message);
        }

        let Some(annotation) = image.full_text_annotation else {
            continue;
        };

        for page in annotation.pages {
            for block in page.blocks {
                let mut detected_block = DetectedBlock::default();
                for paragraph in block.paragraphs {
                    let words = paragraph
                        .words
                        .iter()
                        .filter_map(|word| {
                            let text: String = word
                                .symbols
                                .iter()
                                .map(|symbol| symbol.text.as_str())
                                .collect();
                            let vertices: Vec<(i32, i32)> = word
                                .bounding_box
                                .as_ref()
                                .map(|poly| poly.vertices.iter().map(|v| (v.x, v.y)).collect())
                                .unwrap_or_default();
                            word_from_raw(&text, &vertices)
                        })
                        .collect();
                    detected_block
                        .paragraphs
                        .push(DetectedParagraph { words });
                }
                detected.blocks.push(detected_block);
            }
        }
    }

    Ok(detected)
}
