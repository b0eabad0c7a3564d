use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::geometry::{DetectedWord, Vertex};

mod tesseract;
#[cfg(test)]
mod tests;
mod vision;

pub use tesseract::TesseractDetector;
pub use vision::{DEFAULT_VISION_ENDPOINT, VisionDetector};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedPage {
    pub blocks: Vec<DetectedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedBlock {
    pub paragraphs: Vec<DetectedParagraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedParagraph {
    pub words: Vec<DetectedWord>,
}

impl DetectedPage {
    pub fn paragraphs(&self) -> impl Iterator<Item = &DetectedParagraph> {
        self.blocks.iter().flat_map(|block| block.paragraphs.iter())
    }

    pub fn word_count(&self) -> usize {
        self.paragraphs()
            .map(|paragraph| paragraph.words.len())
            .sum()
    }
}

pub trait WordDetector {
    fn name(&self) -> &'static str;

    fn detect(&self, image_path: &Path) -> Result<DetectedPage>;
}

/// Builds a word from raw detector output. Anything other than a
/// quadrilateral is rejected; accepted quads are rewritten to their
/// axis-aligned bounds in top-left, top-right, bottom-right, bottom-left
/// order.
pub fn word_from_raw(text: &str, vertices: &[(i32, i32)]) -> Option<DetectedWord> {
    if text.is_empty() {
        return None;
    }

    let Some(polygon) = normalize_quad(vertices) else {
        warn!(
            word = %text,
            vertex_count = vertices.len(),
            "dropping word with non-quadrilateral bounds"
        );
        return None;
    };

    Some(DetectedWord::new(text, polygon))
}

pub fn normalize_quad(vertices: &[(i32, i32)]) -> Option<[Vertex; 4]> {
    if vertices.len() != 4 {
        return None;
    }

    let min_x = vertices.iter().map(|(x, _)| *x).min()?;
    let max_x = vertices.iter().map(|(x, _)| *x).max()?;
    let min_y = vertices.iter().map(|(_, y)| *y).min()?;
    let max_y = vertices.iter().map(|(_, y)| *y).max()?;

    Some([
        Vertex::new(min_x, min_y),
        Vertex::new(max_x, min_y),
        Vertex::new(max_x, max_y),
        Vertex::new(min_x, max_y),
    ])
}
