//! UTF-8 <-> UTF-16 marshalling for wide-character platform APIs.
//!
//! Everything the Win32/WinRT side hands back is a run of `u16` code units,
//! either NUL-terminated or sized by a "how many did you copy" return value.
//! These helpers keep that bookkeeping in one place.

use thiserror::Error;

/// Upper bound for grow-and-retry buffers (the Windows long-path limit).
pub const MAX_WIDE_BUFFER: usize = 32_768;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("string is empty")]
    Empty,

    #[error("string contains an interior NUL at byte {0}")]
    InteriorNul(usize),
}

/// Encode `value` as a NUL-terminated UTF-16 string.
pub fn to_wide_nul(value: &str) -> Result<Vec<u16>, EncodingError> {
    if value.is_empty() {
        return Err(EncodingError::Empty);
    }
    if let Some(pos) = value.find('\0') {
        return Err(EncodingError::InteriorNul(pos));
    }

    let mut wide: Vec<u16> = value.encode_utf16().collect();
    wide.push(0);
    Ok(wide)
}

/// Decode UTF-16 code units, replacing unpaired surrogates if there are any.
pub fn from_wide(units: &[u16]) -> String {
    match String::from_utf16(units) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Invalid UTF-16 from platform API: {} - using lossy conversion", e);
            String::from_utf16_lossy(units)
        }
    }
}

/// Copy a NUL-terminated wide string out of foreign memory.
///
/// # Safety
///
/// `ptr` must be null or point to a readable sequence of `u16` that ends in
/// a zero unit.
pub unsafe fn read_wide_cstr(ptr: *const u16) -> Vec<u16> {
    if ptr.is_null() {
        return Vec::new();
    }

    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    std::slice::from_raw_parts(ptr, len).to_vec()
}

/// Run a "fill this buffer, tell me how much you wrote" call until the
/// result fits.
///
/// `fill` receives the whole buffer and returns the number of units it
/// produced, or the number it needs when the buffer was too small. Zero
/// means there is no value. A count strictly below the buffer length is
/// final. Otherwise the buffer grows (at least doubling, at least
/// `count + 1`) and the call is repeated, up to [`MAX_WIDE_BUFFER`].
pub fn read_with_growth<F>(initial: usize, mut fill: F) -> Vec<u16>
where
    F: FnMut(&mut [u16]) -> u32,
{
    let mut buffer = vec![0u16; initial.clamp(1, MAX_WIDE_BUFFER)];

    loop {
        let copied = fill(&mut buffer) as usize;
        if copied == 0 {
            return Vec::new();
        }

        if copied < buffer.len() {
            buffer.truncate(copied);
            return buffer;
        }

        if buffer.len() >= MAX_WIDE_BUFFER {
            tracing::warn!(
                "Wide string result needs {} units, truncating at {}",
                copied,
                buffer.len()
            );
            if let Some(nul) = buffer.iter().position(|&unit| unit == 0) {
                buffer.truncate(nul);
            }
            return buffer;
        }

        let next = (copied + 1).max(buffer.len() * 2).min(MAX_WIDE_BUFFER);
        buffer = vec![0u16; next];
    }
}
