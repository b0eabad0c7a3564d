use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use image::RgbImage;
use regex::Regex;
use tracing::{debug, warn};

pub const DEFAULT_DPI: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A rendered page image on disk. The file is removed when the value is
/// dropped, whichever way page processing ends.
#[derive(Debug)]
pub struct PageRaster {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl PageRaster {
    pub fn open(path: PathBuf) -> Result<Self> {
        let guard = RemoveOnDrop::new(path);
        let (width, height) = image::image_dimensions(guard.path())
            .with_context(|| format!("failed to read raster size: {}", guard.path().display()))?;
        let path = guard.release();

        Ok(Self {
            path,
            width,
            height,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn decode_rgb(&self) -> Result<RgbImage> {
        let image = image::open(&self.path)
            .with_context(|| format!("failed to decode raster {}", self.path.display()))?;
        Ok(image.to_rgb8())
    }
}

impl Drop for PageRaster {
    fn drop(&mut self) {
        remove_artifact(&self.path);
    }
}

struct RemoveOnDrop {
    path: Option<PathBuf>,
}

impl RemoveOnDrop {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    fn release(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove_artifact(&path);
        }
    }
}

fn remove_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed raster artifact"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove raster artifact"),
    }
}

pub trait PageRasterizer {
    fn page_sizes(&self, pdf_path: &Path) -> Result<Vec<PageSize>>;

    fn rasterize(&self, pdf_path: &Path, page_number: usize) -> Result<PageRaster>;
}

pub struct PopplerRasterizer {
    dpi: u32,
    temp_dir: PathBuf,
}

impl PopplerRasterizer {
    pub fn new(dpi: u32, temp_dir: Option<PathBuf>) -> Self {
        Self {
            dpi,
            temp_dir: temp_dir.unwrap_or_else(std::env::temp_dir),
        }
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn page_sizes(&self, pdf_path: &Path) -> Result<Vec<PageSize>> {
        let summary = run_pdfinfo(pdf_path, None)?;
        let page_count = parse_page_count(&summary)
            .with_context(|| format!("pdfinfo reported no page count for {}", pdf_path.display()))?;
        if page_count == 0 {
            return Ok(Vec::new());
        }

        let detail = run_pdfinfo(pdf_path, Some(page_count))?;
        let sizes = parse_page_sizes(&detail)?;
        if sizes.len() != page_count {
            bail!(
                "pdfinfo reported {} page sizes for {} pages in {}",
                sizes.len(),
                page_count,
                pdf_path.display()
            );
        }

        Ok(sizes)
    }

    fn rasterize(&self, pdf_path: &Path, page_number: usize) -> Result<PageRaster> {
        let pdf_stem = pdf_path
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("pdf");
        let safe_stem = pdf_stem
            .chars()
            .map(|character| {
                if character.is_ascii_alphanumeric() {
                    character
                } else {
                    '_'
                }
            })
            .collect::<String>();

        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let output_root = self.temp_dir.join(format!(
            "scanlayer_{}_{}_{}_{}",
            safe_stem,
            std::process::id(),
            page_number,
            stamp
        ));
        let png_path = RemoveOnDrop::new(PathBuf::from(format!("{}.png", output_root.display())));

        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-singlefile")
            .arg("-png")
            .arg(pdf_path)
            .arg(&output_root)
            .output()
            .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftoppm returned non-zero exit status for {} page {}: {}",
                pdf_path.display(),
                page_number,
                stderr.trim()
            );
        }

        if !png_path.path().exists() {
            bail!(
                "pdftoppm did not produce expected image for {} page {}",
                pdf_path.display(),
                page_number
            );
        }

        PageRaster::open(png_path.release())
    }
}

fn run_pdfinfo(pdf_path: &Path, last_page: Option<usize>) -> Result<String> {
    let mut command = Command::new("pdfinfo");
    if let Some(last_page) = last_page {
        command.arg("-f").arg("1").arg("-l").arg(last_page.to_string());
    }
    command.arg(pdf_path);

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdfinfo returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub(crate) fn parse_page_count(summary: &str) -> Option<usize> {
    summary
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
}

/// Reads `Page N size` and `Page N rot` lines; quarter-turn rotations swap
/// the axes to match what the rasterizer renders.
pub(crate) fn parse_page_sizes(detail: &str) -> Result<Vec<PageSize>> {
    let size_pattern = Regex::new(r"^Page\s+(\d+)\s+size:\s+([\d.]+)\s+x\s+([\d.]+)\s+pts")
        .context("failed to compile pdfinfo size regex")?;
    let rot_pattern = Regex::new(r"^Page\s+(\d+)\s+rot:\s+(-?\d+)")
        .context("failed to compile pdfinfo rotation regex")?;

    let mut sizes: Vec<(usize, PageSize)> = Vec::new();
    let mut rotations: Vec<(usize, i32)> = Vec::new();

    for line in detail.lines() {
        if let Some(captures) = size_pattern.captures(line) {
            let page = captures[1].parse::<usize>().context("invalid page number")?;
            let width = captures[2]
                .parse::<f32>()
                .with_context(|| format!("invalid page width: {line}"))?;
            let height = captures[3]
                .parse::<f32>()
                .with_context(|| format!("invalid page height: {line}"))?;
            sizes.push((page, PageSize { width, height }));
        } else if let Some(captures) = rot_pattern.captures(line) {
            let page = captures[1].parse::<usize>().context("invalid page number")?;
            let rotation = captures[2]
                .parse::<i32>()
                .with_context(|| format!("invalid page rotation: {line}"))?;
            rotations.push((page, rotation));
        }
    }

    sizes.sort_by_key(|(page, _)| *page);

    Ok(sizes
        .into_iter()
        .map(|(page, size)| {
            let rotation = rotations
                .iter()
                .find(|(rotated_page, _)| *rotated_page == page)
                .map(|(_, rotation)| rotation.rem_euclid(360))
                .unwrap_or(0);
            if rotation == 90 || rotation == 270 {
                PageSize {
                    width: size.height,
                    height: size.width,
                }
            } else {
                size
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_is_read_from_summary() {
        let summary = "Producer:       pdfTeX\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(summary), Some(12));
        assert_eq!(parse_page_count("Title: none\n"), None);
    }

    #[test]
    fn page_sizes_follow_page_order_and_rotation() {
        let detail = "Pages:          2\n\
Page    2 size: 595.276 x 841.89 pts (A4)\n\
Page    2 rot:  90\n\
Page    1 size: 612 x 792 pts (letter)\n\
Page    1 rot:  0\n";

        let sizes = parse_page_sizes(detail).expect("sizes");

        assert_eq!(sizes.len(), 2);
        assert_eq!(
            sizes[0],
            PageSize {
                width: 612.0,
                height: 792.0
            }
        );
        assert_eq!(sizes[1].width, 841.89);
        assert_eq!(sizes[1].height, 595.276);
    }

    #[test]
    fn page_raster_removes_file_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.png");
        RgbImage::new(4, 3).save(&path).expect("save png");

        let raster = PageRaster::open(path.clone()).expect("open");
        assert_eq!(raster.dimensions(), (4, 3));
        assert!(path.exists());

        drop(raster);
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_raster_is_removed_on_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").expect("write");

        assert!(PageRaster::open(path.clone()).is_err());
        assert!(!path.exists());
    }
}
