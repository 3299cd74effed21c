//! Windows OCR provider
//!
//! Uses the built-in Windows.Media.Ocr engine. Images are decoded by WIC
//! through `BitmapDecoder`, so any format Windows can open is accepted.

use super::layout::{build_blocks, RecognizedLine, WordRect};
use super::{select_engine, OcrOptions, OcrProvider, OcrResult, OcrSupport};
use crate::error::OcrError;
use crate::text;
use std::time::Instant;
use windows::{
    core::{Error as WinError, HSTRING},
    Globalization::Language,
    Graphics::Imaging::{BitmapAlphaMode, BitmapDecoder, BitmapPixelFormat, SoftwareBitmap},
    Media::Ocr::{OcrEngine as WinOcrEngine, OcrResult as WinOcrResult},
    Storage::Streams::{DataWriter, InMemoryRandomAccessStream},
    Win32::System::WinRT::{RoInitialize, RO_INIT_MULTITHREADED},
};

const ENGINE_NAME: &str = "windows-ocr";
const DECODE_FALLBACK: &str = "Failed to decode image bytes";
const RECOGNIZE_FALLBACK: &str = "Windows OCR recognition failed";

pub struct WindowsOcr;

impl OcrProvider for WindowsOcr {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn description(&self) -> &'static str {
        "Windows.Media.Ocr - built-in Windows text recognition"
    }

    fn support(&self) -> OcrSupport {
        OcrSupport {
            supported: true,
            platform: "win32".to_string(),
            reason: None,
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        match available_languages() {
            Ok(languages) => languages,
            Err(e) => {
                tracing::warn!("Failed to list OCR languages: {}", e);
                Vec::new()
            }
        }
    }

    fn recognize(&self, options: &OcrOptions) -> Result<OcrResult, OcrError> {
        let started = Instant::now();
        init_worker_thread();

        let bitmap = decode_bitmap(&options.image)?;

        let engine = create_engine(options.language_hint.as_deref()).ok_or_else(|| {
            OcrError::EngineUnavailable("Windows OCR engine is unavailable".to_string())
        })?;

        let recognized = recognize_bitmap(&engine, &bitmap)
            .map_err(|e| OcrError::RecognizeFailed(platform_message(&e, RECOGNIZE_FALLBACK)))?;

        let text = recognized
            .Text()
            .map(|t| text::from_wide(t.as_wide()))
            .map_err(|e| OcrError::RecognizeFailed(platform_message(&e, RECOGNIZE_FALLBACK)))?;
        if text.is_empty() {
            return Err(OcrError::RecognizeFailed(
                "No text recognized from image".to_string(),
            ));
        }

        let blocks = if options.include_layout {
            let lines = read_lines(&recognized).map_err(|e| {
                OcrError::RecognizeFailed(platform_message(&e, RECOGNIZE_FALLBACK))
            })?;
            build_blocks(lines, options.max_blocks)
        } else {
            Vec::new()
        };

        let language = engine
            .RecognizerLanguage()
            .and_then(|lang| lang.LanguageTag())
            .ok()
            .map(|tag| text::from_wide(tag.as_wide()))
            .filter(|tag| !tag.is_empty());

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "Windows OCR recognized {} chars, {} blocks in {}ms",
            text.len(),
            blocks.len(),
            duration_ms
        );

        Ok(OcrResult {
            text,
            confidence: None,
            language,
            blocks,
            engine: ENGINE_NAME.to_string(),
            duration_ms,
        })
    }
}

/// Join the multi-threaded apartment. A thread that is already initialized
/// (in either apartment) is fine for the calls made here.
fn init_worker_thread() {
    // SAFETY: RoInitialize has no preconditions beyond being called on the
    // thread that will use WinRT.
    if let Err(e) = unsafe { RoInitialize(RO_INIT_MULTITHREADED) } {
        tracing::debug!("RoInitialize: {}", e);
    }
}

fn platform_message(error: &WinError, fallback: &str) -> String {
    let message = error.message().to_string();
    let message = message.trim();
    if message.is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

/// Stream the encoded bytes through `BitmapDecoder` and convert to BGRA8.
fn decode_bitmap(image: &[u8]) -> Result<SoftwareBitmap, OcrError> {
    if image.is_empty() {
        return Err(OcrError::DecodeFailed("Image payload is empty".to_string()));
    }

    decode_bitmap_inner(image)
        .map_err(|e| OcrError::DecodeFailed(platform_message(&e, DECODE_FALLBACK)))
}

fn decode_bitmap_inner(image: &[u8]) -> windows::core::Result<SoftwareBitmap> {
    let stream = InMemoryRandomAccessStream::new()?;
    let writer = DataWriter::CreateDataWriter(&stream)?;
    writer.WriteBytes(image)?;
    writer.StoreAsync()?.get()?;
    writer.FlushAsync()?.get()?;
    writer.DetachStream()?;
    stream.Seek(0)?;

    let decoder = BitmapDecoder::CreateAsync(&stream)?.get()?;
    decoder
        .GetSoftwareBitmapConvertedAsync(BitmapPixelFormat::Bgra8, BitmapAlphaMode::Ignore)?
        .get()
}

fn create_engine(language_hint: Option<&str>) -> Option<WinOcrEngine> {
    select_engine(
        language_hint,
        |tag| {
            let language = Language::CreateLanguage(&HSTRING::from(tag)).ok()?;
            WinOcrEngine::TryCreateFromLanguage(&language).ok()
        },
        || WinOcrEngine::TryCreateFromUserProfileLanguages().ok(),
    )
}

fn recognize_bitmap(
    engine: &WinOcrEngine,
    bitmap: &SoftwareBitmap,
) -> windows::core::Result<WinOcrResult> {
    engine.RecognizeAsync(bitmap)?.get()
}

fn read_lines(result: &WinOcrResult) -> windows::core::Result<Vec<RecognizedLine>> {
    let lines = result.Lines()?;
    let mut out = Vec::with_capacity(lines.Size()? as usize);

    for i in 0..lines.Size()? {
        let line = lines.GetAt(i)?;
        let words = line.Words()?;

        let mut rects = Vec::with_capacity(words.Size()? as usize);
        for j in 0..words.Size()? {
            let rect = words.GetAt(j)?.BoundingRect()?;
            rects.push(WordRect {
                x: f64::from(rect.X),
                y: f64::from(rect.Y),
                width: f64::from(rect.Width),
                height: f64::from(rect.Height),
            });
        }

        out.push(RecognizedLine {
            text: text::from_wide(line.Text()?.as_wide()),
            words: rects,
        });
    }

    Ok(out)
}

fn available_languages() -> windows::core::Result<Vec<String>> {
    let languages = WinOcrEngine::AvailableRecognizerLanguages()?;

    let mut result = Vec::new();
    for i in 0..languages.Size()? {
        if let Ok(tag) = languages.GetAt(i).and_then(|lang| lang.LanguageTag()) {
            result.push(text::from_wide(tag.as_wide()));
        }
    }

    Ok(result)
}
