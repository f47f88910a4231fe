//! OCR (Optical Character Recognition) module using rusty-tesseract

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, anyhow};
use image::RgbaImage;

use crate::config::TextOutput;

/// Orientation hint passed along with the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Rotate the image clockwise so text ends up upright
    pub fn apply(self, img: &RgbaImage) -> RgbaImage {
        match self {
            Rotation::None => img.clone(),
            Rotation::Cw90 => image::imageops::rotate90(img),
            Rotation::Cw180 => image::imageops::rotate180(img),
            Rotation::Cw270 => image::imageops::rotate270(img),
        }
    }
}

/// Pixel rectangle in the coordinates of the image handed to the recognizer
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// A single recognized word
#[derive(Clone, Debug, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub bounds: Bounds,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    /// Element text joined with single spaces
    pub text: String,
    pub elements: Vec<TextElement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    /// Line text joined with newlines
    pub text: String,
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    pub fn from_lines(lines: Vec<TextLine>) -> Self {
        let text = lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, lines }
    }
}

impl TextLine {
    pub fn from_elements(elements: Vec<TextElement>) -> Self {
        let text = elements
            .iter()
            .map(|element| element.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, elements }
    }
}

/// Block → line → element hierarchy returned by a recognizer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecognizedText {
    pub blocks: Vec<TextBlock>,
}

/// One word row of tesseract's TSV output
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizedWord {
    pub block_num: i32,
    pub par_num: i32,
    pub line_num: i32,
    pub word_num: i32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub conf: f32,
    pub text: String,
}

impl From<rusty_tesseract::Data> for RecognizedWord {
    fn from(d: rusty_tesseract::Data) -> Self {
        Self {
            block_num: d.block_num,
            par_num: d.par_num,
            line_num: d.line_num,
            word_num: d.word_num,
            left: d.left,
            top: d.top,
            width: d.width,
            height: d.height,
            conf: d.conf,
            text: d.text,
        }
    }
}

impl RecognizedText {
    /// Build the hierarchy from word rows.
    ///
    /// Coordinates are divided by `upscale_factor` so bounds refer to the
    /// image before any upscaling.
    pub fn from_words(words: impl IntoIterator<Item = RecognizedWord>, upscale_factor: f32) -> Self {
        // block_num -> (par_num, line_num) -> words
        let mut blocks: BTreeMap<i32, BTreeMap<(i32, i32), Vec<RecognizedWord>>> = BTreeMap::new();
        for word in words
            .into_iter()
            .filter(|w| !w.text.trim().is_empty() && w.conf > 0.0)
        {
            blocks
                .entry(word.block_num)
                .or_default()
                .entry((word.par_num, word.line_num))
                .or_default()
                .push(word);
        }

        let scale = if upscale_factor > 0.0 { upscale_factor } else { 1.0 };
        let blocks = blocks
            .into_values()
            .map(|lines| {
                let lines = lines
                    .into_values()
                    .map(|mut words| {
                        words.sort_by_key(|w| w.word_num);
                        let elements = words
                            .into_iter()
                            .map(|w| TextElement {
                                text: w.text.trim().to_string(),
                                bounds: Bounds {
                                    left: w.left as f32 / scale,
                                    top: w.top as f32 / scale,
                                    width: w.width as f32 / scale,
                                    height: w.height as f32 / scale,
                                },
                            })
                            .collect();
                        TextLine::from_elements(elements)
                    })
                    .collect();
                TextBlock::from_lines(lines)
            })
            .collect();

        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| block.lines.is_empty())
    }

    /// Raw text of the last block, in iteration order, that has any lines
    pub fn last_block_text(&self) -> Option<&str> {
        self.blocks
            .iter()
            .rev()
            .find(|block| !block.lines.is_empty())
            .map(|block| block.text.as_str())
    }

    /// Every element's text: spaces within a line, newlines between lines,
    /// a blank line between blocks
    pub fn full_text(&self) -> Option<String> {
        let blocks: Vec<String> = self
            .blocks
            .iter()
            .filter(|block| !block.lines.is_empty())
            .map(|block| {
                block
                    .lines
                    .iter()
                    .map(|line| {
                        line.elements
                            .iter()
                            .map(|element| element.text.as_str())
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();

        if blocks.is_empty() {
            None
        } else {
            Some(blocks.join("\n\n"))
        }
    }

    /// Text to put on screen, None when nothing was recognized
    pub fn display_text(&self, output: TextOutput) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        match output {
            TextOutput::LastBlock => self.last_block_text().map(str::to_string),
            TextOutput::FullText => self.full_text(),
        }
    }
}

/// Anything that turns an image into a block/line/element text hierarchy
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &RgbaImage, rotation: Rotation) -> anyhow::Result<RecognizedText>;
}

/// Recognizer backed by the system tesseract binary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TesseractRecognizer {
    pub language: String,
    pub page_segmentation_mode: u32,
    pub engine_mode: u32,
}

/// Upscale factor for an image whose shorter side is `min_dimension` pixels.
/// Tesseract works best with text that's at least 10-12 pixels tall.
pub fn upscale_factor_for(min_dimension: u32) -> u32 {
    if min_dimension < 100 {
        4
    } else if min_dimension < 200 {
        2
    } else {
        1
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, img: &RgbaImage, rotation: Rotation) -> anyhow::Result<RecognizedText> {
        use rusty_tesseract::{Args, Image};

        if img.width() == 0 || img.height() == 0 {
            return Err(anyhow!("Cannot run OCR on an empty image"));
        }

        let upright = rotation.apply(img);
        log::info!(
            "Running OCR with rusty-tesseract on {}x{} image (rotation {}°)...",
            upright.width(),
            upright.height(),
            rotation.degrees()
        );

        let min_dimension = upright.width().min(upright.height());
        let factor = upscale_factor_for(min_dimension);
        let dynamic_img = image::DynamicImage::ImageRgba8(upright);
        let processed_img = if factor > 1 {
            let new_width = dynamic_img.width() * factor;
            let new_height = dynamic_img.height() * factor;
            log::info!(
                "Upscaling small image {}x to {}x{}",
                factor,
                new_width,
                new_height
            );
            dynamic_img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
        } else {
            dynamic_img
        };

        let tess_img = Image::from_dynamic_image(&processed_img)
            .map_err(|e| anyhow!("Failed to create tesseract image: {}", e))?;

        // Use higher DPI for better small text recognition
        let dpi = if min_dimension < 200 { 300 } else { 150 };
        let args = Args {
            lang: self.language.clone(),
            config_variables: HashMap::new(),
            dpi: Some(dpi),
            psm: Some(self.page_segmentation_mode as i32),
            oem: Some(self.engine_mode as i32),
        };

        let data_output = rusty_tesseract::image_to_data(&tess_img, &args)
            .map_err(|e| anyhow!("Tesseract OCR failed: {}", e))
            .context("Text recognition failed")?;
        log::info!("Tesseract returned {} data entries", data_output.data.len());

        let text = RecognizedText::from_words(
            data_output.data.into_iter().map(RecognizedWord::from),
            factor as f32,
        );
        log::info!("Recognized {} text blocks", text.blocks.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(block: i32, line: i32, word_num: i32, text: &str) -> RecognizedWord {
        RecognizedWord {
            block_num: block,
            par_num: 1,
            line_num: line,
            word_num,
            left: 40,
            top: 80,
            width: 20,
            height: 12,
            conf: 90.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_words_group_into_blocks_and_lines() {
        let text = RecognizedText::from_words(
            vec![
                word(2, 1, 1, "World"),
                word(1, 2, 1, "again"),
                word(1, 1, 2, "there"),
                word(1, 1, 1, "Hello"),
            ],
            1.0,
        );

        assert_eq!(text.blocks.len(), 2);
        assert_eq!(text.blocks[0].lines.len(), 2);
        assert_eq!(text.blocks[0].lines[0].text, "Hello there");
        assert_eq!(text.blocks[0].text, "Hello there\nagain");
        assert_eq!(text.blocks[1].text, "World");
    }

    #[test]
    fn test_lines_are_keyed_per_paragraph() {
        let mut second_par = word(1, 1, 1, "two");
        second_par.par_num = 2;
        let text = RecognizedText::from_words(vec![word(1, 1, 1, "one"), second_par], 1.0);

        assert_eq!(text.blocks.len(), 1);
        assert_eq!(text.blocks[0].lines.len(), 2);
        assert_eq!(text.blocks[0].text, "one\ntwo");
    }

    #[test]
    fn test_blank_and_unconfident_words_are_dropped() {
        let mut unsure = word(1, 1, 2, "noise");
        unsure.conf = -1.0;
        let text = RecognizedText::from_words(
            vec![word(1, 1, 1, "kept"), word(1, 1, 3, "   "), unsure],
            1.0,
        );

        assert_eq!(text.blocks[0].text, "kept");
        assert!(RecognizedText::from_words(vec![word(1, 1, 1, "")], 1.0).is_empty());
    }

    #[test]
    fn test_bounds_undo_upscaling() {
        let text = RecognizedText::from_words(vec![word(1, 1, 1, "small")], 4.0);
        let bounds = text.blocks[0].lines[0].elements[0].bounds;
        assert_eq!(
            bounds,
            Bounds {
                left: 10.0,
                top: 20.0,
                width: 5.0,
                height: 3.0
            }
        );
    }

    #[test]
    fn test_last_block_text_wins_over_concatenation() {
        let text = RecognizedText::from_words(
            vec![word(1, 1, 1, "Hello"), word(2, 1, 1, "World")],
            1.0,
        );

        assert_eq!(text.display_text(TextOutput::LastBlock).as_deref(), Some("World"));
        assert_eq!(
            text.display_text(TextOutput::FullText).as_deref(),
            Some("Hello\n\nWorld")
        );
    }

    #[test]
    fn test_blocks_without_lines_are_skipped() {
        let text = RecognizedText {
            blocks: vec![
                TextBlock::from_lines(vec![TextLine::from_elements(vec![TextElement {
                    text: "kept".to_string(),
                    bounds: Bounds::default(),
                }])]),
                TextBlock {
                    text: "ghost".to_string(),
                    lines: Vec::new(),
                },
            ],
        };

        assert_eq!(text.last_block_text(), Some("kept"));
        assert_eq!(text.full_text().as_deref(), Some("kept"));
        assert_eq!(RecognizedText::default().display_text(TextOutput::FullText), None);
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = RgbaImage::new(30, 10);
        assert_eq!(Rotation::None.apply(&img).dimensions(), (30, 10));
        assert_eq!(Rotation::Cw90.apply(&img).dimensions(), (10, 30));
        assert_eq!(Rotation::Cw180.apply(&img).dimensions(), (30, 10));
        assert_eq!(Rotation::Cw270.apply(&img).dimensions(), (10, 30));
        assert_eq!(Rotation::default().degrees(), 0);
    }

    #[test]
    fn test_upscale_factor_thresholds() {
        assert_eq!(upscale_factor_for(64), 4);
        assert_eq!(upscale_factor_for(100), 2);
        assert_eq!(upscale_factor_for(199), 2);
        assert_eq!(upscale_factor_for(480), 1);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let recognizer = TesseractRecognizer {
            language: "eng".to_string(),
            page_segmentation_mode: 11,
            engine_mode: 3,
        };
        assert!(recognizer.recognize(&RgbaImage::new(0, 0), Rotation::None).is_err());
    }
}
