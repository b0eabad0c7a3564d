use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

use super::{DetectedBlock, DetectedPage, DetectedParagraph, WordDetector, word_from_raw};

const WORD_LEVEL: u32 = 5;

pub struct TesseractDetector {
    lang: String,
}

impl TesseractDetector {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
        }
    }
}

impl WordDetector for TesseractDetector {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn detect(&self, image_path: &Path) -> Result<DetectedPage> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("tsv")
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", image_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                image_path.display(),
                stderr.trim()
            );
        }

        parse_tsv(&String::from_utf8_lossy(&output.stdout))
    }
}

pub(super) fn parse_tsv(raw: &str) -> Result<DetectedPage> {
    let mut page = DetectedPage::default();
    let mut current_block: Option<u32> = None;
    let mut current_paragraph: Option<(u32, u32)> = None;

    for (line_index, line) in raw.lines().enumerate() {
        if line_index == 0 && line.starts_with("level") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.splitn(12, '\t').collect();
        if fields.len() < 12 {
            bail!("malformed tesseract tsv line {}: {}", line_index + 1, line);
        }

        let numbers = fields[..10]
            .iter()
            .map(|field| field.trim().parse::<i64>())
            .collect::<Result<Vec<i64>, _>>()
            .with_context(|| format!("malformed tesseract tsv line {}", line_index + 1))?;

        if numbers[0] != i64::from(WORD_LEVEL) {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let block_num = numbers[2] as u32;
        let par_num = numbers[3] as u32;
        let (left, top, width, height) = (
            numbers[6] as i32,
            numbers[7] as i32,
            numbers[8] as i32,
            numbers[9] as i32,
        );

        if current_block != Some(block_num) {
            page.blocks.push(DetectedBlock::default());
            current_block = Some(block_num);
            current_paragraph = None;
        }
        if current_paragraph != Some((block_num, par_num)) {
            if let Some(block) = page.blocks.last_mut() {
                block.paragraphs.push(DetectedParagraph::default());
            }
            current_paragraph = Some((block_num, par_num));
        }

        let vertices = [
            (left, top),
            (left + width, top),
            (left + width, top + height),
            (left, top + height),
        ];
        let Some(word) = word_from_raw(text, &vertices) else {
            continue;
        };

        if let Some(paragraph) = page
            .blocks
            .last_mut()
            .and_then(|block| block.paragraphs.last_mut())
        {
            paragraph.words.push(word);
        }
    }

    Ok(page)
}
