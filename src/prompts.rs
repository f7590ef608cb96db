//! Prompts sent to the vision model.
//!
//! Kept in one place so wording changes never touch retry or scheduling code,
//! and so tests can inspect what the model is asked.

use crate::output::BoundingBox;

/// System prompt for re-reading a single layout block.
pub const BLOCK_SYSTEM_PROMPT: &str = r#"You are a meticulous transcription engine. You receive a full page image and the pixel coordinates of ONE region on that page, together with text an OCR engine produced for that region.

Rules:
1. Read ONLY the text inside the given region. Ignore everything outside it.
2. Use the OCR text as a hint; fix misread characters, missing accents, broken words and wrong line breaks.
3. If the region is a table, output it as a GitHub-flavoured Markdown table.
4. Preserve numbers, units, dates, currency symbols and punctuation exactly as printed.
5. If the region contains no legible text, output an empty response.
6. Output ONLY the corrected text. No commentary, no code fences, no quotes."#;

/// System prompt for transcribing a whole page.
pub const PAGE_SYSTEM_PROMPT: &str = r#"You are an expert document converter. Convert the page image into clean, self-contained Markdown.

1. TEXT: preserve all text in natural reading order; never summarise.
2. STRUCTURE: # for the page title, ## / ### for sections, - or 1. for lists, > for blockquotes, **bold** and *italic* as printed.
3. TABLES: GitHub-flavoured pipe tables with a header separator row.
4. IGNORE: page numbers, running headers and footers, decorative lines.
5. OUTPUT: Markdown only. Do not wrap in ``` fences. Do not add commentary."#;

/// User prompt for one block: its type, pixel box and OCR text.
pub fn block_prompt(kind: &str, bbox: &BoundingBox, ocr_text: &str) -> String {
    let ocr = if ocr_text.trim().is_empty() {
        "(none)"
    } else {
        ocr_text
    };
    format!(
        "Region type: {kind}\n\
         Region (pixels): x={:.0}, y={:.0}, width={:.0}, height={:.0}\n\
         OCR text:\n\"\"\"\n{ocr}\n\"\"\"\n\n\
         Return the corrected text of this region only.",
        bbox.x, bbox.y, bbox.width, bbox.height
    )
}

/// User prompt for one full page.
pub fn page_prompt(page_number: usize, total_pages: usize) -> String {
    format!("Transcribe page {page_number} of {total_pages} to Markdown.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_prompt_embeds_box_and_ocr_text() {
        let p = block_prompt("TABLE", &BoundingBox::new(12.4, 30.0, 200.0, 55.6), "Tota1 $ 40");
        assert!(p.contains("Region type: TABLE"));
        assert!(p.contains("x=12, y=30, width=200, height=56"));
        assert!(p.contains("Tota1 $ 40"));
    }

    #[test]
    fn empty_ocr_text_is_marked() {
        let p = block_prompt("TEXT", &BoundingBox::default(), "   ");
        assert!(p.contains("(none)"));
    }
}
