//! Line layout: turning recognized lines and word rectangles into blocks.

use super::OcrBlock;

/// Axis-aligned rectangle as reported for one recognized word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A recognized line before it becomes an [`OcrBlock`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub text: String,
    pub words: Vec<WordRect>,
}

/// Union of all word rectangles as `[x, y, width, height]`.
///
/// A line without words gets an all-zero box.
pub fn merge_word_boxes(words: &[WordRect]) -> [f64; 4] {
    let mut iter = words.iter();
    let Some(first) = iter.next() else {
        return [0.0; 4];
    };

    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x + first.width;
    let mut max_y = first.y + first.height;

    for word in iter {
        min_x = min_x.min(word.x);
        min_y = min_y.min(word.y);
        max_x = max_x.max(word.x + word.width);
        max_y = max_y.max(word.y + word.height);
    }

    [min_x, min_y, (max_x - min_x).max(0.0), (max_y - min_y).max(0.0)]
}

/// Build blocks in line order, skipping empty lines and stopping after
/// `max_blocks` (0 = all).
pub fn build_blocks<I>(lines: I, max_blocks: usize) -> Vec<OcrBlock>
where
    I: IntoIterator<Item = RecognizedLine>,
{
    let mut blocks = Vec::new();

    for line in lines {
        if line.text.is_empty() {
            continue;
        }

        blocks.push(OcrBlock {
            bounding_box: Some(merge_word_boxes(&line.words)),
            text: line.text,
            confidence: None,
        });

        if max_blocks > 0 && blocks.len() >= max_blocks {
            break;
        }
    }

    blocks
}
