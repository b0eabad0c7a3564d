use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::geometry::PlacedText;

pub const IMAGE_RESOURCE: &str = "Im0";
pub const FONT_RESOURCE: &str = "F1";
const INVISIBLE_RENDER_MODE: i64 = 3;

/// One output page: the raster drawn over the whole media box, with the
/// recognized text laid on top in invisible render mode. Coordinates in
/// `texts` use a top-left origin.
#[derive(Debug, Clone)]
pub struct OverlayPage {
    pub width: f32,
    pub height: f32,
    pub image: RgbImage,
    pub texts: Vec<PlacedText>,
}

impl OverlayPage {
    pub fn content(&self) -> Content {
        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    self.width.into(),
                    0.into(),
                    0.into(),
                    self.height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![IMAGE_RESOURCE.into()]),
            Operation::new("Q", vec![]),
        ];

        for text in &self.texts {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![FONT_RESOURCE.into(), text.font_size.into()]),
                Operation::new("Tr", vec![INVISIBLE_RENDER_MODE.into()]),
                Operation::new("Td", vec![text.x.into(), (self.height - text.y).into()]),
                Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(&text.text))]),
                Operation::new("ET", vec![]),
            ]);
        }

        Content { operations }
    }
}

// WinAnsi code points 0x80..=0x9F that differ from Latin-1.
const WIN_ANSI_EXTRAS: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// Glyphs are never painted, so characters WinAnsi cannot encode are
/// written as `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|character| match character as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => WIN_ANSI_EXTRAS
                .iter()
                .find(|(extra, _)| *extra == character)
                .map(|(_, byte)| *byte)
                .unwrap_or(b'?'),
        })
        .collect()
}

pub fn image_xobject(image: RgbImage) -> Stream {
    let (width, height) = image.dimensions();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        image.into_raw(),
    )
}

pub struct OverlayDocument {
    document: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl Default for OverlayDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayDocument {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        Self {
            document,
            pages_id,
            font_id,
            page_ids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn add_page(&mut self, page: OverlayPage) -> Result<ObjectId> {
        let content = page
            .content()
            .encode()
            .context("failed to encode page content stream")?;
        let (width, height) = (page.width, page.height);

        let mut image = image_xobject(page.image);
        image
            .compress()
            .context("failed to compress page raster")?;
        let image_id = self.document.add_object(image);

        let content_id = self
            .document
            .add_object(Stream::new(dictionary! {}, content));

        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { FONT_RESOURCE => self.font_id },
                "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
            },
        });

        self.page_ids.push(page_id);
        Ok(page_id)
    }

    pub fn finish(mut self) -> Document {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);
        self.document
    }

    pub fn save(self, path: &Path) -> Result<()> {
        let mut document = self.finish();
        document.compress();
        document
            .save(path)
            .with_context(|| format!("failed to write pdf: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
