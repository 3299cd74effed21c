//! OCR providers
//!
//! Each platform gets one implementation of [`OcrProvider`], picked at build
//! time by [`platform_provider`]. Platforms without a native engine get
//! [`unsupported::UnsupportedOcr`], which fails every call the same way.

pub mod layout;
pub mod unsupported;
#[cfg(windows)]
pub mod windows;

use crate::error::OcrError;
use serde::Serialize;
use std::sync::Arc;

/// Language used when neither the hint nor the user profile yields an engine.
pub const FALLBACK_LANGUAGE: &str = "en-US";

/// Input for one recognition call.
#[derive(Debug, Clone, Default)]
pub struct OcrOptions {
    pub image: Vec<u8>,
    pub language_hint: Option<String>,
    pub include_layout: bool,
    /// Cap on returned blocks; 0 means no cap.
    pub max_blocks: usize,
}

/// One recognized line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrBlock {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// `[x, y, width, height]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<[f64; 4]>,
}

/// OCR processing result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<OcrBlock>,
    pub engine: String,
    pub duration_ms: u64,
}

/// Answer of the capability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrSupport {
    pub supported: bool,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Trait that all OCR providers must implement
pub trait OcrProvider: Send + Sync {
    /// Returns the engine identifier reported in results (e.g. "windows-ocr")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Whether this provider can recognize anything on the running platform
    fn support(&self) -> OcrSupport;

    /// Recognizer languages installed on this machine
    fn supported_languages(&self) -> Vec<String>;

    /// Recognize text in an encoded image. Blocks until done.
    fn recognize(&self, options: &OcrOptions) -> Result<OcrResult, OcrError>;
}

/// The provider for the platform this binary was built for.
pub fn platform_provider() -> Arc<dyn OcrProvider> {
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsOcr)
    }

    #[cfg(not(windows))]
    {
        Arc::new(unsupported::UnsupportedOcr)
    }
}

/// Pick the first engine that can be built: the caller's hint, then the
/// user's profile languages, then [`FALLBACK_LANGUAGE`].
///
/// A hint that is empty or fails to produce an engine falls through
/// silently.
pub fn select_engine<E>(
    language_hint: Option<&str>,
    mut from_language: impl FnMut(&str) -> Option<E>,
    from_profile: impl FnOnce() -> Option<E>,
) -> Option<E> {
    if let Some(hint) = language_hint.map(str::trim).filter(|h| !h.is_empty()) {
        if let Some(engine) = from_language(hint) {
            return Some(engine);
        }
        tracing::debug!("No OCR engine for language hint '{}', falling back", hint);
    }

    from_profile().or_else(|| from_language(FALLBACK_LANGUAGE))
}
