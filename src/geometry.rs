use serde::{Deserialize, Serialize};

pub const DEFAULT_OFFSET_X: i32 = 10;
pub const DEFAULT_OFFSET_Y: i32 = 35;
pub const DEFAULT_FONT_SCALE: f32 = 0.8;

const MERGEABLE_PUNCTUATION: [&str; 5] = [".", ",", ";", "!", "?"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

impl Vertex {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One OCR-recognized token. The polygon is always four vertices in
/// top-left, top-right, bottom-right, bottom-left order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedWord {
    pub text: String,
    pub polygon: [Vertex; 4],
}

impl DetectedWord {
    pub fn new(text: impl Into<String>, polygon: [Vertex; 4]) -> Self {
        Self {
            text: text.into(),
            polygon,
        }
    }
}

/// One or more detected words folded into a single placeable unit. The
/// polygon is the concatenation of the member words' quads, so `[0]` and
/// `[2]` are the first word's top-left and bottom-right corners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRun {
    pub text: String,
    pub polygon: Vec<Vertex>,
}

impl MergedRun {
    fn open(word: &DetectedWord, calibration: &Calibration) -> Self {
        Self {
            text: word.text.clone(),
            polygon: calibration.offset_polygon(&word.polygon),
        }
    }

    fn absorb(&mut self, word: &DetectedWord, calibration: &Calibration) {
        self.text.push_str(&word.text);
        self.polygon
            .extend(calibration.offset_polygon(&word.polygon));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Calibration {
    pub offset_x: i32,
    pub offset_y: i32,
    pub font_scale: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            font_scale: DEFAULT_FONT_SCALE,
        }
    }
}

impl Calibration {
    pub fn apply_offset(&self, vertex: Vertex) -> Vertex {
        Vertex::new(vertex.x + self.offset_x, vertex.y + self.offset_y)
    }

    fn offset_polygon(&self, polygon: &[Vertex]) -> Vec<Vertex> {
        polygon
            .iter()
            .map(|vertex| self.apply_offset(*vertex))
            .collect()
    }
}

pub fn is_mergeable_punctuation(text: &str) -> bool {
    MERGEABLE_PUNCTUATION.contains(&text)
}

/// Folds isolated punctuation into the preceding run. A punctuation word with
/// no open run becomes its own run. Vertices are offset by the calibration
/// as they are taken in.
pub fn merge_punctuation(words: &[DetectedWord], calibration: &Calibration) -> Vec<MergedRun> {
    let mut runs = Vec::with_capacity(words.len());
    let mut open: Option<MergedRun> = None;

    for word in words {
        if word.text.is_empty() {
            continue;
        }

        match open.as_mut() {
            Some(run) if is_mergeable_punctuation(&word.text) => run.absorb(word, calibration),
            _ => {
                if let Some(run) = open.take() {
                    runs.push(run);
                }
                open = Some(MergedRun::open(word, calibration));
            }
        }
    }

    if let Some(run) = open {
        runs.push(run);
    }

    runs
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub font_scale: f32,
}

impl CoordinateTransform {
    pub fn new(
        image_size: (u32, u32),
        page_size: (f32, f32),
        calibration: &Calibration,
    ) -> anyhow::Result<Self> {
        let (img_w, img_h) = image_size;
        let (page_w, page_h) = page_size;
        if img_w == 0 || img_h == 0 {
            anyhow::bail!("raster has zero dimension: {}x{}", img_w, img_h);
        }
        if page_w <= 0.0 || page_h <= 0.0 {
            anyhow::bail!("page has non-positive dimension: {}x{}", page_w, page_h);
        }

        Ok(Self {
            scale_x: page_w / img_w as f32,
            scale_y: page_h / img_h as f32,
            font_scale: calibration.font_scale,
        })
    }

    pub fn scale(&self, vertex: Vertex) -> (f32, f32) {
        (
            vertex.x as f32 * self.scale_x,
            vertex.y as f32 * self.scale_y,
        )
    }

    pub fn place(&self, run: &MergedRun) -> Option<PlacedText> {
        let top_left = run.polygon.first()?;
        let bottom_right = run.polygon.get(2)?;

        let (x0, y0) = self.scale(*top_left);
        let (_, y1) = self.scale(*bottom_right);
        let font_size = font_size_for_box(y0, y1, self.font_scale);
        if font_size <= 0.0 {
            return None;
        }

        Some(PlacedText {
            text: run.text.clone(),
            x: x0,
            y: y0,
            font_size,
        })
    }
}

pub fn font_size_for_box(top: f32, bottom: f32, font_scale: f32) -> f32 {
    (bottom - top) * font_scale
}
