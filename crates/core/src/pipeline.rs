use crate::error::{CoreError, CoreResult};
use crate::grounding::{self, BoundingBox};
use crate::pdf::PdfEngine;
use crate::progress::{ProgressSender, ProgressSnapshot};
use crate::provider::{InferenceClient, SizingOptions};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Per-page output, owned by the orchestrator until folded into the job's
/// persisted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub index: u32,
    pub markdown: String,
    pub raw_text: String,
    pub image_assets: Vec<String>,
    pub boxes: Vec<BoundingBox>,
}

/// Everything a completed PDF job produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfProcessingResult {
    pub markdown_file: String,
    pub raw_json_file: String,
    pub archive_file: String,
    pub pages: Vec<PageResult>,
    pub image_assets: Vec<String>,
    pub total_pages: u32,
}

/// Run the full rasterize → infer → rewrite → crop pipeline for a single
/// page. Pages are independent; nothing here reads or writes state shared
/// with any other page.
async fn run_page_pipeline(
    page_index: u32,
    page_image: DynamicImage,
    client: Arc<dyn InferenceClient>,
    prompt: String,
    sizing: SizingOptions,
    images_dir: PathBuf,
) -> CoreResult<PageResult> {
    let raw_text = client.submit(&prompt, Some(&page_image), sizing).await?;

    let rewritten = grounding::rewrite(&raw_text, &page_image, page_index, &images_dir)?;
    let boxes = grounding::parse(&raw_text, page_image.width(), page_image.height());

    Ok(PageResult {
        index: page_index,
        markdown: rewritten.markdown,
        raw_text,
        image_assets: rewritten.assets,
        boxes,
    })
}

/// Fan pages out under a concurrency cap, aggregate in page order, and
/// package the result. Page workers post their completions back on
/// `progress` rather than each mutating shared state directly; the
/// orchestrator itself is the only consumer, so no cross-task locking is
/// needed on the `pages` buffer.
pub async fn process_pdf(
    input_path: &Path,
    output_dir: &Path,
    client: Arc<dyn InferenceClient>,
    prompt: String,
    sizing: SizingOptions,
    dpi: f32,
    concurrency: usize,
    progress: ProgressSender,
) -> CoreResult<PdfProcessingResult> {
    let images_dir = output_dir.join("images");
    std::fs::create_dir_all(&images_dir)?;

    let pdf_path = input_path.to_path_buf();
    let _ = progress.send(ProgressSnapshot::new(0, 0, "rendering"));

    let pages: Vec<DynamicImage> = tokio::task::spawn_blocking(move || -> CoreResult<_> {
        let engine = PdfEngine::new()?;
        let doc = engine.open_document(&pdf_path)?;
        PdfEngine::render_all_pages(&doc, dpi)
    })
    .await
    .map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))??;

    let total = pages.len() as u32;

    if total == 0 {
        let _ = progress.send(ProgressSnapshot::new(0, 0, "no pages detected"));
        let _ = progress.send(ProgressSnapshot {
            current: 0,
            total: 0,
            percent: 100.0,
            message: "done".to_string(),
            pages_completed: Some(0),
            pages_total: Some(0),
        });
        return package_result(output_dir, Vec::new(), total);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let pages_completed = Arc::new(AtomicU32::new(0));
    let mut set: JoinSet<CoreResult<PageResult>> = JoinSet::new();

    for (index, page_image) in pages.into_iter().enumerate() {
        let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
            CoreError::State(format!("pipeline semaphore closed: {e}"))
        })?;
        let client = client.clone();
        let prompt = prompt.clone();
        let images_dir = images_dir.clone();
        let progress = progress.clone();
        let pages_completed = pages_completed.clone();
        set.spawn(async move {
            let _permit = permit;
            let result =
                run_page_pipeline(index as u32, page_image, client, prompt, sizing, images_dir)
                    .await;

            if result.is_ok() {
                let done = pages_completed.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = progress.send(
                    ProgressSnapshot::new(done, total, format!("page {}/{} done", done, total))
                        .with_pages(done, total),
                );
            }

            result
        });
    }

    let mut pages_out: Vec<PageResult> = Vec::with_capacity(total as usize);
    let mut first_error: Option<CoreError> = None;

    while let Some(joined) = set.join_next().await {
        let result = match joined {
            Ok(r) => r,
            Err(e) => Err(CoreError::State(format!("page task panicked: {e}"))),
        };
        match result {
            Ok(page) => pages_out.push(page),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                    set.abort_all();
                }
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    pages_out.sort_by_key(|p| p.index);
    let _ = progress.send(ProgressSnapshot::new(total, total, "done").with_pages(total, total));

    package_result(output_dir, pages_out, total)
}

fn package_result(
    output_dir: &Path,
    pages: Vec<PageResult>,
    total_pages: u32,
) -> CoreResult<PdfProcessingResult> {
    let mut markdown = String::new();
    for page in &pages {
        markdown.push_str(&format!("<!-- page:{} -->\n", page.index));
        markdown.push_str(&page.markdown);
        markdown.push_str("\n\n---\n\n");
    }
    let markdown = markdown.trim_end_matches("\n\n---\n\n").to_string();

    let markdown_file = "result.md".to_string();
    let raw_json_file = "raw.json".to_string();
    let archive_file = "result.zip".to_string();

    std::fs::write(output_dir.join(&markdown_file), &markdown)?;

    let image_assets: Vec<String> = pages
        .iter()
        .flat_map(|p| p.image_assets.iter().cloned())
        .collect();

    let pages_json: Vec<serde_json::Value> = pages
        .iter()
        .map(|p| {
            let mut v = serde_json::to_value(p).expect("PageResult serializes");
            v["page_number"] = serde_json::json!(p.index + 1);
            v
        })
        .collect();
    let raw_json = serde_json::json!({
        "pages": pages_json,
        "images": image_assets,
    });
    std::fs::write(
        output_dir.join(&raw_json_file),
        serde_json::to_vec_pretty(&raw_json)?,
    )?;

    write_archive(output_dir, &markdown_file, &raw_json_file, &image_assets)?;

    Ok(PdfProcessingResult {
        markdown_file,
        raw_json_file,
        archive_file,
        pages,
        image_assets,
        total_pages,
    })
}

fn write_archive(
    output_dir: &Path,
    markdown_file: &str,
    raw_json_file: &str,
    image_assets: &[String],
) -> CoreResult<()> {
    use std::io::Write as _;
    use zip::write::SimpleFileOptions;

    let archive_path = output_dir.join("result.zip");
    let file = std::fs::File::create(&archive_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for name in [markdown_file, raw_json_file] {
        let bytes = std::fs::read(output_dir.join(name))?;
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }

    for rel in image_assets {
        let bytes = std::fs::read(output_dir.join(rel))?;
        zip.start_file(rel, options)?;
        zip.write_all(&bytes)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_result_empty_pages_produces_well_formed_outputs() {
        let dir = std::env::temp_dir().join("jay-ocr-test-pipeline-empty");
        let _ = std::fs::create_dir_all(&dir);
        let result = package_result(&dir, Vec::new(), 0).unwrap();
        assert_eq!(result.pages.len(), 0);
        assert_eq!(result.total_pages, 0);
        assert!(dir.join("result.md").exists());
        assert!(dir.join("raw.json").exists());
        assert!(dir.join("result.zip").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn package_result_orders_pages_by_index() {
        let dir = std::env::temp_dir().join("jay-ocr-test-pipeline-ordered");
        let _ = std::fs::create_dir_all(&dir);
        let pages = vec![
            PageResult {
                index: 0,
                markdown: "first".into(),
                raw_text: "first".into(),
                image_assets: vec![],
                boxes: vec![],
            },
            PageResult {
                index: 1,
                markdown: "second".into(),
                raw_text: "second".into(),
                image_assets: vec![],
                boxes: vec![],
            },
        ];
        let result = package_result(&dir, pages, 2).unwrap();
        let markdown = std::fs::read_to_string(dir.join("result.md")).unwrap();
        assert!(markdown.find("first").unwrap() < markdown.find("second").unwrap());
        assert_eq!(result.pages[0].index, 0);
        assert_eq!(result.pages[1].index, 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
