//! Call boundary between the host and the native adapters.
//!
//! Arguments arrive loosely typed (JSON values, optional multipart fields)
//! and are validated here. OCR runs on a blocking worker so the caller only
//! awaits; search runs inline. Adapter errors pass through with their code
//! and message intact.

use crate::error::{BoundaryError, OcrError, SearchError};
use crate::everything::{EverythingSearch, SearchOptions, SearchResultItem, MAX_RESULTS_LIMIT};
use crate::ocr::{OcrOptions, OcrProvider, OcrResult, OcrSupport};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const GENERIC_OCR_FAILURE: &str = "Native OCR recognition failed";

/// Raw OCR arguments as received from the host.
#[derive(Debug, Clone, Default)]
pub struct RecognizeRequest {
    pub image: Option<Vec<u8>>,
    pub language_hint: Option<String>,
    pub include_layout: Option<bool>,
    pub max_blocks: Option<i64>,
}

impl RecognizeRequest {
    fn into_options(self) -> Result<OcrOptions, BoundaryError> {
        let image = self.image.ok_or_else(|| {
            BoundaryError::InvalidArgument(
                "recognizeImageText options.image must be a Buffer".to_string(),
            )
        })?;
        if image.is_empty() {
            return Err(BoundaryError::InvalidArgument(
                "recognizeImageText options.image cannot be empty".to_string(),
            ));
        }

        Ok(OcrOptions {
            image,
            language_hint: self.language_hint,
            include_layout: self.include_layout.unwrap_or(false),
            max_blocks: self.max_blocks.unwrap_or(0).max(0) as usize,
        })
    }
}

/// Everything the host can call into.
#[derive(Clone)]
pub struct NativeHost {
    ocr: Arc<dyn OcrProvider>,
    search: Option<Arc<EverythingSearch>>,
}

impl NativeHost {
    pub fn new(ocr: Arc<dyn OcrProvider>, search: Option<Arc<EverythingSearch>>) -> Self {
        Self { ocr, search }
    }

    /// Adapters for the platform this binary was built for.
    #[cfg_attr(not(windows), allow(unused_variables))]
    pub fn for_current_platform(everything_dll: Option<PathBuf>) -> Self {
        #[cfg(windows)]
        let search = Some(Arc::new(EverythingSearch::for_platform(everything_dll)));
        #[cfg(not(windows))]
        let search = None;

        Self::new(crate::ocr::platform_provider(), search)
    }

    pub fn ocr_provider(&self) -> &dyn OcrProvider {
        self.ocr.as_ref()
    }

    pub fn search_available(&self) -> bool {
        self.search.is_some()
    }

    /// Validate, then recognize on a blocking worker.
    pub async fn recognize_image_text(
        &self,
        request: RecognizeRequest,
    ) -> Result<OcrResult, BoundaryError> {
        let options = request.into_options()?;
        let provider = Arc::clone(&self.ocr);

        let outcome = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let mut result = provider.recognize(&options)?;
            if result.duration_ms == 0 {
                result.duration_ms = started.elapsed().as_millis() as u64;
            }
            Ok::<_, OcrError>(result)
        })
        .await
        .map_err(|e| BoundaryError::Internal(format!("{}: {}", GENERIC_OCR_FAILURE, e)))?;

        outcome.map_err(|e| BoundaryError::Ocr(with_default_message(e)))
    }

    /// Synchronous file search. Without search support on this platform the
    /// answer is always an empty list.
    pub fn search(
        &self,
        query: &Value,
        options: Option<&Value>,
    ) -> Result<Vec<SearchResultItem>, BoundaryError> {
        let Some(search) = &self.search else {
            return Ok(Vec::new());
        };

        let query = query.as_str().ok_or_else(|| {
            SearchError::InvalidArgument("Everything search expects a query string".to_string())
        })?;
        let options = parse_search_options(options);

        Ok(search.search(query, &options)?)
    }

    /// Same as [`NativeHost::search`].
    pub fn query(
        &self,
        query: &Value,
        options: Option<&Value>,
    ) -> Result<Vec<SearchResultItem>, BoundaryError> {
        self.search(query, options)
    }

    pub fn native_ocr_support(&self) -> OcrSupport {
        self.ocr.support()
    }

    pub fn everything_version(&self) -> Option<String> {
        self.search.as_ref().and_then(|search| search.version())
    }
}

fn with_default_message(error: OcrError) -> OcrError {
    if !error.message().is_empty() {
        return error;
    }
    let message = GENERIC_OCR_FAILURE.to_string();
    match error {
        OcrError::UnsupportedPlatform(_) => OcrError::UnsupportedPlatform(message),
        OcrError::DecodeFailed(_) => OcrError::DecodeFailed(message),
        OcrError::EngineUnavailable(_) => OcrError::EngineUnavailable(message),
        OcrError::RecognizeFailed(_) => OcrError::RecognizeFailed(message),
    }
}

fn int_field(options: &serde_json::Map<String, Value>, key: &str) -> Option<i64> {
    options.get(key).and_then(Value::as_f64).map(|n| n as i64)
}

fn bool_field(options: &serde_json::Map<String, Value>, key: &str) -> Option<bool> {
    options.get(key).and_then(Value::as_bool)
}

/// Read search options leniently: missing or wrongly typed fields keep
/// their defaults, numbers are truncated and clamped.
pub fn parse_search_options(raw: Option<&Value>) -> SearchOptions {
    let mut options = SearchOptions::default();
    let Some(raw) = raw.and_then(Value::as_object) else {
        return options;
    };

    if let Some(max_results) = int_field(raw, "maxResults") {
        options.max_results = max_results.clamp(1, i64::from(MAX_RESULTS_LIMIT)) as u32;
    }
    if let Some(offset) = int_field(raw, "offset") {
        options.offset = offset.clamp(0, i64::from(u32::MAX)) as u32;
    }
    if let Some(sort) = int_field(raw, "sort") {
        options.sort = sort.clamp(0, i64::from(u32::MAX)) as u32;
    }
    if let Some(regex) = bool_field(raw, "regex") {
        options.regex = regex;
    }
    if let Some(match_case) = bool_field(raw, "matchCase") {
        options.match_case = match_case;
    }
    if let Some(match_path) = bool_field(raw, "matchPath") {
        options.match_path = match_path;
    }
    if let Some(match_whole_word) = bool_field(raw, "matchWholeWord") {
        options.match_whole_word = match_whole_word;
    }

    options
}
