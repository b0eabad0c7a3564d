use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::geometry::{Calibration, CoordinateTransform, PlacedText, merge_punctuation};
use crate::model::{OverlayDocumentReport, PageIssue};
use crate::ocr::{DetectedPage, WordDetector};
use crate::overlay::{OverlayDocument, OverlayPage};
use crate::raster::{PageRasterizer, PageSize};
use crate::util::file_name_of;

const STAGE_RASTERIZE: &str = "rasterize";
const STAGE_DETECT: &str = "detect";
const STAGE_TRANSFORM: &str = "transform";

pub struct PagePipeline<'a> {
    rasterizer: &'a dyn PageRasterizer,
    detector: &'a dyn WordDetector,
    calibration: Calibration,
}

pub struct RenderedDocument {
    pub document: OverlayDocument,
    pub report: OverlayDocumentReport,
}

pub(super) struct RenderedPage {
    pub page: OverlayPage,
    pub issue: Option<PageIssue>,
}

impl<'a> PagePipeline<'a> {
    pub fn new(
        rasterizer: &'a dyn PageRasterizer,
        detector: &'a dyn WordDetector,
        calibration: Calibration,
    ) -> Self {
        Self {
            rasterizer,
            detector,
            calibration,
        }
    }

    /// Renders the document and writes it to `output`. Page-level failures
    /// are recorded in the report; only document-level failures are errors.
    pub fn process_document(&self, source: &Path, output: &Path) -> Result<OverlayDocumentReport> {
        let RenderedDocument {
            document,
            mut report,
        } = self.build_document(source)?;

        debug!(pages = document.page_count(), output = %output.display(), "saving document");
        document.save(output)?;

        report.output = Some(output.display().to_string());
        report.status = if report.pages_skipped == 0 && report.pages_without_text == 0 {
            "completed".to_string()
        } else {
            "partial".to_string()
        };

        info!(
            source = %source.display(),
            output = %output.display(),
            pages_rendered = report.pages_rendered,
            pages_skipped = report.pages_skipped,
            words_placed = report.words_placed,
            "wrote searchable pdf"
        );

        Ok(report)
    }

    pub fn build_document(&self, source: &Path) -> Result<RenderedDocument> {
        let sizes = self.rasterizer.page_sizes(source)?;
        let mut document = OverlayDocument::new();
        let mut report = OverlayDocumentReport::new(&file_name_of(source));
        report.pages_total = sizes.len();

        info!(source = %source.display(), pages = sizes.len(), detector = self.detector.name(), "processing document");

        for (index, size) in sizes.into_iter().enumerate() {
            let page_number = index + 1;

            match self.render_page(source, page_number, size) {
                Ok(rendered) => {
                    if let Some(issue) = rendered.issue {
                        warn!(
                            source = %source.display(),
                            page = page_number,
                            reason = %issue.reason,
                            "text detection failed, page kept without text layer"
                        );
                        report.pages_without_text += 1;
                        report.page_issues.push(issue);
                    }

                    let words = rendered.page.texts.len();
                    document.add_page(rendered.page)?;
                    report.pages_rendered += 1;
                    report.words_placed += words;
                    debug!(page = page_number, words, "page rendered");
                }
                Err(issue) => {
                    warn!(
                        source = %source.display(),
                        page = page_number,
                        stage = %issue.stage,
                        reason = %issue.reason,
                        "skipping page"
                    );
                    report.pages_skipped += 1;
                    report.page_issues.push(issue);
                }
            }
        }

        Ok(RenderedDocument { document, report })
    }

    pub(super) fn render_page(
        &self,
        source: &Path,
        page_number: usize,
        size: PageSize,
    ) -> std::result::Result<RenderedPage, PageIssue> {
        let raster = self
            .rasterizer
            .rasterize(source, page_number)
            .map_err(|err| page_issue(page_number, STAGE_RASTERIZE, &err))?;

        let transform = CoordinateTransform::new(
            raster.dimensions(),
            (size.width, size.height),
            &self.calibration,
        )
        .map_err(|err| page_issue(page_number, STAGE_TRANSFORM, &err))?;

        let image = raster
            .decode_rgb()
            .map_err(|err| page_issue(page_number, STAGE_RASTERIZE, &err))?;

        let (detected, issue) = match self.detector.detect(raster.path()) {
            Ok(detected) => (detected, None),
            Err(err) => (
                DetectedPage::default(),
                Some(page_issue(page_number, STAGE_DETECT, &err)),
            ),
        };

        let texts = self.place_words(&detected, &transform, page_number);

        Ok(RenderedPage {
            page: OverlayPage {
                width: size.width,
                height: size.height,
                image,
                texts,
            },
            issue,
        })
    }

    fn place_words(
        &self,
        detected: &DetectedPage,
        transform: &CoordinateTransform,
        page_number: usize,
    ) -> Vec<PlacedText> {
        let mut placed = Vec::with_capacity(detected.word_count());

        for paragraph in detected.paragraphs() {
            for run in merge_punctuation(&paragraph.words, &self.calibration) {
                match transform.place(&run) {
                    Some(text) => placed.push(text),
                    None => debug!(page = page_number, text = %run.text, "run has no height, not placed"),
                }
            }
        }

        placed
    }
}

fn page_issue(page: usize, stage: &str, err: &anyhow::Error) -> PageIssue {
    PageIssue {
        page,
        stage: stage.to_string(),
        reason: format!("{err:#}"),
    }
}
