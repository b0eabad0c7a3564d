use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use image::{Rgb, RgbImage};
use lopdf::Object;

use super::pipeline::PagePipeline;
use super::*;
use crate::geometry::{Calibration, DetectedWord, Vertex};
use crate::ocr::{DetectedBlock, DetectedPage, DetectedParagraph, WordDetector};
use crate::overlay::IMAGE_RESOURCE;
use crate::raster::{PageRaster, PageRasterizer, PageSize};

const PAGE: PageSize = PageSize {
    width: 100.0,
    height: 100.0,
};

fn scan_pixels() -> RgbImage {
    let mut image = RgbImage::new(200, 200);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
    }
    image
}

struct FakeRasterizer {
    dir: PathBuf,
    pages: usize,
    failing_page: Option<usize>,
    sizes_fail: bool,
    renders: Cell<usize>,
}

impl FakeRasterizer {
    fn new(dir: &Path, pages: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            pages,
            failing_page: None,
            sizes_fail: false,
            renders: Cell::new(0),
        }
    }
}

impl PageRasterizer for FakeRasterizer {
    fn page_sizes(&self, pdf_path: &Path) -> Result<Vec<PageSize>> {
        if self.sizes_fail {
            bail!("cannot open {}", pdf_path.display());
        }
        Ok(vec![PAGE; self.pages])
    }

    fn rasterize(&self, _pdf_path: &Path, page_number: usize) -> Result<PageRaster> {
        self.renders.set(self.renders.get() + 1);
        if self.failing_page == Some(page_number) {
            bail!("pdftoppm crashed on page {page_number}");
        }
        let path = self.dir.join(format!("page-{page_number}.png"));
        scan_pixels().save(&path)?;
        PageRaster::open(path)
    }
}

struct StaticDetector {
    words: Vec<DetectedWord>,
    fail: bool,
}

impl StaticDetector {
    fn with_words(words: Vec<DetectedWord>) -> Self {
        Self { words, fail: false }
    }
}

impl WordDetector for StaticDetector {
    fn name(&self) -> &'static str {
        "static"
    }

    fn detect(&self, image_path: &Path) -> Result<DetectedPage> {
        if self.fail {
            return Err(anyhow!("detector unavailable"));
        }
        assert!(image_path.exists(), "raster must exist during detection");
        Ok(DetectedPage {
            blocks: vec![DetectedBlock {
                paragraphs: vec![DetectedParagraph {
                    words: self.words.clone(),
                }],
            }],
        })
    }
}

fn quad(left: i32, top: i32, right: i32, bottom: i32) -> [Vertex; 4] {
    [
        Vertex::new(left, top),
        Vertex::new(right, top),
        Vertex::new(right, bottom),
        Vertex::new(left, bottom),
    ]
}

fn report_words() -> Vec<DetectedWord> {
    vec![
        DetectedWord::new("Report", quad(90, 65, 150, 105)),
        DetectedWord::new(".", quad(152, 65, 156, 105)),
    ]
}

fn leftover_rasters(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("png"))
        .collect()
}

#[test]
fn render_page_places_merged_run_in_page_space() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rasterizer = FakeRasterizer::new(dir.path(), 1);
    let detector = StaticDetector::with_words(report_words());
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());

    let rendered = pipeline
        .render_page(Path::new("scan.pdf"), 1, PAGE)
        .unwrap_or_else(|issue| panic!("page failed: {}", issue.reason));

    assert!(rendered.issue.is_none());
    assert_eq!(rendered.page.texts.len(), 1);
    let placed = &rendered.page.texts[0];
    assert_eq!(placed.text, "Report.");
    assert_eq!(placed.x, 50.0);
    assert_eq!(placed.y, 50.0);
    assert!((placed.font_size - 16.0).abs() < 1e-3);
    assert_eq!(rendered.page.image, scan_pixels());
    assert!(leftover_rasters(dir.path()).is_empty());
}

#[test]
fn document_has_one_invisible_text_object_over_unmodified_scan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rasterizer = FakeRasterizer::new(dir.path(), 1);
    let detector = StaticDetector::with_words(report_words());
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());

    let rendered = pipeline
        .build_document(Path::new("scan.pdf"))
        .expect("document");
    assert_eq!(rendered.report.words_placed, 1);

    let document = rendered.document.finish();
    let pages = document.get_pages();
    assert_eq!(pages.len(), 1);
    let page_id = *pages.get(&1).expect("first page");

    let content = document.get_page_content(page_id).expect("content");
    let text = String::from_utf8_lossy(&content);
    assert_eq!(text.matches("Tj").count(), 1);
    assert!(text.contains("3 Tr"));
    assert!(text.contains("(Report.) Tj"));

    let image_id = document
        .get_dictionary(page_id)
        .and_then(|dict| dict.get(b"Resources"))
        .and_then(Object::as_dict)
        .and_then(|resources| resources.get(b"XObject"))
        .and_then(Object::as_dict)
        .and_then(|xobjects| xobjects.get(IMAGE_RESOURCE.as_bytes()))
        .and_then(Object::as_reference)
        .expect("image reference");
    let stream = document
        .get_object(image_id)
        .and_then(Object::as_stream)
        .expect("image stream");
    let pixels = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    assert_eq!(pixels, scan_pixels().into_raw());
}

#[test]
fn failed_raster_skips_only_that_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut rasterizer = FakeRasterizer::new(dir.path(), 3);
    rasterizer.failing_page = Some(2);
    let detector = StaticDetector::with_words(report_words());
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());

    let rendered = pipeline
        .build_document(Path::new("scan.pdf"))
        .expect("document");

    assert_eq!(rasterizer.renders.get(), 3);
    assert_eq!(rendered.report.pages_total, 3);
    assert_eq!(rendered.report.pages_rendered, 2);
    assert_eq!(rendered.report.pages_skipped, 1);
    assert_eq!(rendered.report.words_placed, 2);
    assert_eq!(rendered.report.page_issues.len(), 1);
    assert_eq!(rendered.report.page_issues[0].page, 2);
    assert_eq!(rendered.report.page_issues[0].stage, "rasterize");
    assert_eq!(rendered.document.page_count(), 2);
    assert!(leftover_rasters(dir.path()).is_empty());
}

#[test]
fn page_without_words_keeps_image_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rasterizer = FakeRasterizer::new(dir.path(), 1);
    let detector = StaticDetector::with_words(Vec::new());
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());

    let rendered = pipeline
        .build_document(Path::new("blank.pdf"))
        .expect("document");

    assert_eq!(rendered.report.pages_rendered, 1);
    assert_eq!(rendered.report.words_placed, 0);
    assert!(rendered.report.page_issues.is_empty());
}

#[test]
fn detection_failure_keeps_page_without_text_layer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rasterizer = FakeRasterizer::new(dir.path(), 2);
    let detector = StaticDetector {
        words: report_words(),
        fail: true,
    };
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());

    let rendered = pipeline
        .build_document(Path::new("scan.pdf"))
        .expect("document");

    assert_eq!(rendered.report.pages_rendered, 2);
    assert_eq!(rendered.report.pages_without_text, 2);
    assert_eq!(rendered.report.words_placed, 0);
    assert_eq!(rendered.report.page_issues[0].stage, "detect");
    assert!(leftover_rasters(dir.path()).is_empty());
}

#[test]
fn process_document_writes_prefixed_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = tempfile::tempdir().expect("tempdir");
    let rasterizer = FakeRasterizer::new(dir.path(), 1);
    let detector = StaticDetector::with_words(report_words());
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());
    let output = output_path_for(out_dir.path(), "scan.pdf");

    let report = pipeline
        .process_document(Path::new("scan.pdf"), &output)
        .expect("report");

    assert_eq!(output.file_name().and_then(|name| name.to_str()), Some("ocr_scan.pdf"));
    assert_eq!(report.status, "completed");
    assert_eq!(report.output.as_deref(), Some(output.display().to_string().as_str()));
    let bytes = fs::read(&output).expect("read output");
    assert!(bytes.starts_with(b"%PDF-1.5"));
}

#[test]
fn unreadable_document_is_an_error_for_the_caller() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut rasterizer = FakeRasterizer::new(dir.path(), 1);
    rasterizer.sizes_fail = true;
    let detector = StaticDetector::with_words(Vec::new());
    let pipeline = PagePipeline::new(&rasterizer, &detector, Calibration::default());
    let output = dir.path().join("ocr_broken.pdf");

    assert!(pipeline.process_document(Path::new("broken.pdf"), &output).is_err());
    assert!(!output.exists());
}
