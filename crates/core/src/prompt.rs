use serde::{Deserialize, Serialize};

/// OCR mode selecting the instruction handed to the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    PlainOcr,
    Markdown,
    TablesCsv,
    TablesMd,
    KvJson,
    FigureChart,
    FindRef,
    LayoutMap,
    PiiRedact,
    Multilingual,
    Describe,
    Freeform,
}

impl OcrMode {
    /// Modes that force `grounding_enabled = true` regardless of caller input.
    fn forces_grounding(self) -> bool {
        matches!(self, OcrMode::FindRef | OcrMode::LayoutMap | OcrMode::PiiRedact)
    }
}

/// Options accepted by [`build`]. All fields are optional on the wire;
/// defaults mirror the instruction table in the mode design.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOptions {
    pub grounding: Option<bool>,
    pub include_caption: bool,
    pub find_term: Option<String>,
    pub schema: Option<String>,
    pub prompt: Option<String>,
}

fn instruction(mode: OcrMode, opts: &PromptOptions) -> String {
    match mode {
        OcrMode::PlainOcr => "Free OCR.".to_string(),
        OcrMode::Markdown => "Convert the document to markdown.".to_string(),
        OcrMode::TablesCsv => {
            "Extract tables as CSV, `---` separator between tables.".to_string()
        }
        OcrMode::TablesMd => "Extract tables as GFM.".to_string(),
        OcrMode::KvJson => {
            let schema = opts.schema.clone().unwrap_or_else(|| "{}".to_string());
            format!("Return JSON matching the following schema: {schema}")
        }
        OcrMode::FigureChart => {
            "Numeric series as (x,y) table, then `---`, then a 2-sentence summary.".to_string()
        }
        OcrMode::FindRef => {
            let term = opts.find_term.clone().unwrap_or_else(|| "Total".to_string());
            format!("Locate <|ref|>{term}<|/ref|> in the image.")
        }
        OcrMode::LayoutMap => "Return JSON blocks {type, box} — no content.".to_string(),
        OcrMode::PiiRedact => {
            "Return JSON {label, text, box} for emails, phones, addresses, IBANs.".to_string()
        }
        OcrMode::Multilingual => "Free OCR. Detect the document language.".to_string(),
        OcrMode::Describe => "Describe the image.".to_string(),
        OcrMode::Freeform => opts
            .prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "OCR this image.".to_string()),
    }
}

/// Build the final prompt string for `mode`/`opts`.
///
/// `"<image>\n" + ("<|grounding|>\n" if grounding) + instruction`, with
/// `find_ref`/`layout_map`/`pii_redact` forcing grounding on, and an
/// optional caption suffix appended for every mode but `describe`.
pub fn build(mode: OcrMode, opts: &PromptOptions) -> String {
    let grounding = mode.forces_grounding() || opts.grounding.unwrap_or(false);

    let mut prompt = String::from("<image>\n");
    if grounding {
        prompt.push_str("<|grounding|>\n");
    }
    prompt.push_str(&instruction(mode, opts));

    if opts.include_caption && mode != OcrMode::Describe {
        prompt.push_str("\nThen add a one-paragraph description of the image.");
    }
    prompt
}

/// Whether `mode` forces grounding regardless of the caller's request.
pub fn grounding_enabled(mode: OcrMode, requested: bool) -> bool {
    mode.forces_grounding() || requested
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ocr_has_no_grounding() {
        let prompt = build(OcrMode::PlainOcr, &PromptOptions::default());
        assert_eq!(prompt, "<image>\nFree OCR.");
    }

    #[test]
    fn find_ref_forces_grounding_and_uses_default_term() {
        let prompt = build(OcrMode::FindRef, &PromptOptions::default());
        assert_eq!(
            prompt,
            "<image>\n<|grounding|>\nLocate <|ref|>Total<|/ref|> in the image."
        );
    }

    #[test]
    fn find_ref_uses_custom_term() {
        let opts = PromptOptions {
            find_term: Some("Subtotal".to_string()),
            ..Default::default()
        };
        let prompt = build(OcrMode::FindRef, &opts);
        assert!(prompt.contains("<|ref|>Subtotal<|/ref|>"));
    }

    #[test]
    fn freeform_falls_back_when_empty() {
        let prompt = build(OcrMode::Freeform, &PromptOptions::default());
        assert_eq!(prompt, "<image>\nOCR this image.");
    }

    #[test]
    fn freeform_uses_user_prompt_verbatim() {
        let opts = PromptOptions {
            prompt: Some("Summarize this page.".to_string()),
            ..Default::default()
        };
        assert_eq!(build(OcrMode::Freeform, &opts), "<image>\nSummarize this page.");
    }

    #[test]
    fn include_caption_appends_suffix_except_describe() {
        let opts = PromptOptions {
            include_caption: true,
            ..Default::default()
        };
        assert!(build(OcrMode::PlainOcr, &opts).ends_with("description of the image."));
        assert!(!build(OcrMode::Describe, &opts).contains("Then add"));
    }

    #[test]
    fn grounding_flag_is_honored_for_non_forcing_modes() {
        let opts = PromptOptions {
            grounding: Some(true),
            ..Default::default()
        };
        assert!(build(OcrMode::Markdown, &opts).contains("<|grounding|>"));
        assert!(!build(OcrMode::Markdown, &PromptOptions::default()).contains("<|grounding|>"));
    }
}
