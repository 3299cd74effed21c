//! Provider for platforms without a native OCR engine.

use super::{OcrOptions, OcrProvider, OcrResult, OcrSupport};
use crate::error::OcrError;

pub struct UnsupportedOcr;

impl OcrProvider for UnsupportedOcr {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn description(&self) -> &'static str {
        "No native OCR engine on this platform"
    }

    fn support(&self) -> OcrSupport {
        OcrSupport {
            supported: false,
            platform: "unsupported".to_string(),
            reason: Some("platform-not-supported".to_string()),
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        Vec::new()
    }

    fn recognize(&self, _options: &OcrOptions) -> Result<OcrResult, OcrError> {
        Err(OcrError::UnsupportedPlatform(
            "Native OCR is not supported on this platform".to_string(),
        ))
    }
}
