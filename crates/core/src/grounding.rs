use crate::error::{CoreError, CoreResult};
use image::DynamicImage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Denominator used to rescale normalized model coordinates to pixels.
///
/// Literally 999 in the source model's training data, which is off-by-one
/// from a true `[0, 999]` inclusive range. Preserved as-is for compatibility
/// with the model — do not "fix" it.
const COORD_DENOMINATOR: f64 = 999.0;

/// A single grounded box: a text label paired with its pixel-space bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub label: String,
    #[serde(rename = "box")]
    pub box_: [u32; 4],
}

fn detection_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<\|ref\|>(.*?)<\|/ref\|>\s*<\|det\|>\s*(.*?)\s*<\|/det\|>")
            .expect("static detection regex is valid")
    })
}

/// True iff any grounding sentinel appears in `text`.
pub fn detect(text: &str) -> bool {
    text.contains("<|det|>") || text.contains("<|ref|>") || text.contains("<|grounding|>")
}

/// Normalize a parsed JSON coordinate body into zero or more `[x1,y1,x2,y2]` tuples
/// in normalized `[0,999]` space. Returns an empty vec for any shape that doesn't
/// match one of the three accepted variants — callers treat that as "malformed,
/// skip silently".
fn normalize_coords(value: &serde_json::Value) -> Vec<[f64; 4]> {
    let Some(arr) = value.as_array() else {
        return Vec::new();
    };

    let as_f64 = |v: &serde_json::Value| v.as_f64();

    // Flat list of exactly 4 numbers: [x1,y1,x2,y2]
    if arr.len() == 4 && arr.iter().all(|v| v.is_number()) {
        let nums: Vec<f64> = arr.iter().filter_map(as_f64).collect();
        if nums.len() == 4 {
            return vec![[nums[0], nums[1], nums[2], nums[3]]];
        }
        return Vec::new();
    }

    // Pair of points: [[x1,y1],[x2,y2]]
    if arr.len() == 2 && arr.iter().all(|v| v.as_array().is_some_and(|a| a.len() == 2)) {
        let p0 = arr[0].as_array().unwrap();
        let p1 = arr[1].as_array().unwrap();
        if let (Some(x1), Some(y1), Some(x2), Some(y2)) =
            (as_f64(&p0[0]), as_f64(&p0[1]), as_f64(&p1[0]), as_f64(&p1[1]))
        {
            return vec![[x1, y1, x2, y2]];
        }
        return Vec::new();
    }

    // List of boxes: [[x1,y1,x2,y2], ...]
    let mut out = Vec::new();
    for item in arr {
        let Some(inner) = item.as_array() else {
            continue;
        };
        if inner.len() != 4 {
            continue;
        }
        let nums: Vec<f64> = inner.iter().filter_map(as_f64).collect();
        if nums.len() == 4 {
            out.push([nums[0], nums[1], nums[2], nums[3]]);
        }
    }
    out
}

fn scale_and_clamp(coords: [f64; 4], width: u32, height: u32) -> [u32; 4] {
    let scale = |v: f64, dim: u32| -> u32 {
        let px = (v * dim as f64 / COORD_DENOMINATOR).floor();
        px.clamp(0.0, dim as f64) as u32
    };
    let mut x1 = scale(coords[0], width);
    let mut y1 = scale(coords[1], height);
    let mut x2 = scale(coords[2], width);
    let mut y2 = scale(coords[3], height);
    if x1 > x2 {
        std::mem::swap(&mut x1, &mut x2);
    }
    if y1 > y2 {
        std::mem::swap(&mut y1, &mut y2);
    }
    [x1, y1, x2, y2]
}

/// Parse every detection block in `text`, rescaling normalized coordinates
/// against a rendered page of size `width x height`. Malformed blocks
/// contribute zero boxes; they never abort parsing of the rest of the text.
pub fn parse(text: &str, width: u32, height: u32) -> Vec<BoundingBox> {
    let mut boxes = Vec::new();
    for caps in detection_regex().captures_iter(text) {
        let label = caps[1].to_string();
        let coords_raw = caps[2].trim();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(coords_raw) else {
            continue;
        };
        for coords in normalize_coords(&value) {
            let box_ = scale_and_clamp(coords, width, height);
            boxes.push(BoundingBox {
                label: label.clone(),
                box_,
            });
        }
    }
    boxes
}

/// Result of [`rewrite`]: the cleaned markdown plus the relative asset paths
/// it references, in insertion order.
pub struct RewriteResult {
    pub markdown: String,
    pub assets: Vec<String>,
}

/// Replace every detection block in `text` with either cropped figure
/// references (label `image`, at least one valid box) or the bare label.
/// Crops are saved under `assets_dir` as `page-{page_index}-img-{k}.jpg`
/// at JPEG quality 95; `assets_dir` is itself relative to the job's
/// `output_dir` (callers pass `images`, not an absolute path) and the
/// returned asset paths are `images/page-...` so they resolve from
/// `output_dir`.
pub fn rewrite(
    text: &str,
    page_image: &DynamicImage,
    page_index: u32,
    assets_dir: &Path,
) -> CoreResult<RewriteResult> {
    let width = page_image.width();
    let height = page_image.height();
    let mut asset_counter: u32 = 0;
    let mut assets = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0usize;

    std::fs::create_dir_all(assets_dir)?;

    for caps in detection_regex().captures_iter(text) {
        let whole = caps.get(0).unwrap();
        out.push_str(&text[last_end..whole.start()]);
        last_end = whole.end();

        let label = caps[1].trim().to_string();
        let coords_raw = caps[2].trim();
        let boxes: Vec<[f64; 4]> = serde_json::from_str::<serde_json::Value>(coords_raw)
            .ok()
            .map(|v| normalize_coords(&v))
            .unwrap_or_default();

        let mut valid_crops: Vec<[u32; 4]> = Vec::new();
        if label.eq_ignore_ascii_case("image") {
            for coords in &boxes {
                let [x1, y1, x2, y2] = scale_and_clamp(*coords, width, height);
                if x2 > x1 && y2 > y1 {
                    valid_crops.push([x1, y1, x2, y2]);
                }
            }
        }

        if !valid_crops.is_empty() {
            let mut refs = Vec::with_capacity(valid_crops.len());
            for crop in valid_crops {
                let [x1, y1, x2, y2] = crop;
                let cropped = page_image.crop_imm(x1, y1, x2 - x1, y2 - y1);
                let filename = format!("page-{page_index}-img-{asset_counter}.jpg");
                let full_path = assets_dir.join(&filename);
                cropped
                    .to_rgb8()
                    .save_with_format(&full_path, image::ImageFormat::Jpeg)
                    .map_err(|e| CoreError::Image(e.to_string()))?;
                let rel = format!("images/{filename}");
                refs.push(format!("![]({rel})"));
                assets.push(rel);
                asset_counter += 1;
            }
            out.push_str(&refs.join("\n"));
        } else {
            out.push_str(&label);
        }
    }
    out.push_str(&text[last_end..]);

    let markdown = out.replace("<|grounding|>", "").trim().to_string();
    Ok(RewriteResult { markdown, assets })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_finds_any_sentinel() {
        assert!(detect("<|det|>"));
        assert!(detect("<|ref|>x<|/ref|>"));
        assert!(detect("<|grounding|>"));
        assert!(!detect("plain text"));
    }

    #[test]
    fn parse_flat_list() {
        let text = "<|ref|>Total<|/ref|><|det|>[100,200,500,600]<|/det|>";
        let boxes = parse(text, 1000, 1000);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].label, "Total");
        assert_eq!(boxes[0].box_, [100, 200, 500, 600]);
    }

    #[test]
    fn parse_list_of_lists() {
        let text = "<|ref|>image<|/ref|><|det|>[[0,0,999,999]]<|/det|>";
        let boxes = parse(text, 1024, 1024);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].box_, [0, 0, 1024, 1024]);
    }

    #[test]
    fn parse_pair_of_points() {
        let text = "<|ref|>fig<|/ref|><|det|>[[100,200],[500,600]]<|/det|>";
        let boxes = parse(text, 1000, 1000);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].box_, [100, 200, 500, 600]);
    }

    #[test]
    fn parse_malformed_block_yields_zero_boxes() {
        let text = "<|ref|>bad<|/ref|><|det|>not json<|/det|>";
        assert!(parse(text, 100, 100).is_empty());
    }

    #[test]
    fn parse_multiple_blocks_in_order() {
        let text = "<|ref|>A<|/ref|><|det|>[0,0,10,10]<|/det|> and <|ref|>B<|/ref|><|det|>[10,10,20,20]<|/det|>";
        let boxes = parse(text, 999, 999);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].label, "A");
        assert_eq!(boxes[1].label, "B");
    }

    #[test]
    fn rewrite_non_image_label_emits_bare_label() {
        let img = DynamicImage::new_rgb8(100, 100);
        let dir = std::env::temp_dir().join("jay-ocr-test-rewrite-1");
        let text = "# Title\n<|ref|>Total<|/ref|><|det|>[0,0,10,10]<|/det|>\nbody";
        let result = rewrite(text, &img, 0, &dir).unwrap();
        assert!(result.markdown.contains("Total"));
        assert!(result.assets.is_empty());
        assert!(!result.markdown.contains("<|det|>"));
        assert!(!result.markdown.contains("<|ref|>"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rewrite_image_label_crops_and_references() {
        let img = DynamicImage::new_rgb8(1024, 1024);
        let dir = std::env::temp_dir().join("jay-ocr-test-rewrite-2");
        let text = "# Title\n<|ref|>image<|/ref|><|det|>[[0,0,999,999]]<|/det|>\nbody";
        let result = rewrite(text, &img, 0, &dir).unwrap();
        assert_eq!(result.assets, vec!["images/page-0-img-0.jpg"]);
        assert!(result.markdown.contains("![](images/page-0-img-0.jpg)"));
        assert!(dir.join("page-0-img-0.jpg").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rewrite_degenerate_box_falls_back_to_label() {
        let img = DynamicImage::new_rgb8(100, 100);
        let dir = std::env::temp_dir().join("jay-ocr-test-rewrite-3");
        let text = "<|ref|>image<|/ref|><|det|>[10,10,10,10]<|/det|>";
        let result = rewrite(text, &img, 0, &dir).unwrap();
        assert!(result.assets.is_empty());
        assert_eq!(result.markdown, "image");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rewrite_identity_with_no_detection_blocks() {
        let img = DynamicImage::new_rgb8(10, 10);
        let dir = std::env::temp_dir().join("jay-ocr-test-rewrite-4");
        let text = "  plain text, no sentinels  ";
        let result = rewrite(text, &img, 0, &dir).unwrap();
        assert_eq!(result.markdown, "plain text, no sentinels");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
