//! Everything file search
//!
//! The SDK keeps one global query state per process: set the search
//! parameters, run the query, read the results. [`EverythingSearch`] owns
//! the loaded library and serializes that sequence behind a mutex.

pub mod api;
pub mod loader;
#[cfg(windows)]
pub mod win32;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::SearchError;
use crate::text;
use api::{EverythingApi, FileTime, FALSE, TRUE};
use loader::Resolver;
use serde::Serialize;
use std::sync::Mutex;

pub const DEFAULT_MAX_RESULTS: u32 = 50;
pub const MAX_RESULTS_LIMIT: u32 = 5000;
pub const DEFAULT_SORT: u32 = 3;

const INITIAL_PATH_BUFFER: usize = 4096;

/// 100ns intervals between 1601-01-01 and 1970-01-01.
const WINDOWS_EPOCH_OFFSET_100NS: u64 = 116_444_736_000_000_000;

/// Query parameters. Every field has a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_results: u32,
    pub offset: u32,
    pub sort: u32,
    pub regex: bool,
    pub match_case: bool,
    pub match_path: bool,
    pub match_whole_word: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            offset: 0,
            sort: DEFAULT_SORT,
            regex: false,
            match_case: false,
            match_path: false,
            match_whole_word: false,
        }
    }
}

/// One search hit. Optional fields are left out entirely when the SDK
/// cannot provide them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub full_path: String,
    /// Parent directory
    pub path: String,
    pub name: String,
    pub filename: String,
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_folder: Option<bool>,
}

/// Search executor over a lazily loaded SDK.
pub struct EverythingSearch {
    resolver: Resolver,
    query_lock: Mutex<()>,
}

impl EverythingSearch {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            query_lock: Mutex::new(()),
        }
    }

    /// Executor backed by the real SDK DLL.
    #[cfg(windows)]
    pub fn for_platform(override_path: Option<std::path::PathBuf>) -> Self {
        Self::new(Resolver::new(Box::new(win32::Win32Loader), override_path))
    }

    /// Run a blocking query. An empty query returns no results without
    /// loading the SDK.
    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResultItem>, SearchError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let api = self
            .resolver
            .ensure_loaded()
            .map_err(SearchError::SdkUnavailable)?;

        let wide_query =
            text::to_wide_nul(query).map_err(|e| SearchError::QueryEncoding(e.to_string()))?;

        let _guard = self
            .query_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        configure(&api, &wide_query, options);

        // SAFETY: blocking query on the state configured above.
        if unsafe { (api.query)(TRUE) } == FALSE {
            let code = unsafe { (api.get_last_error)() };
            return Err(SearchError::QueryFailed(code));
        }

        let total = unsafe { (api.get_num_results)() };
        tracing::debug!("Everything query '{}' returned {} results", query, total);

        Ok((0..total).filter_map(|i| read_item(&api, i)).collect())
    }

    /// SDK version: `None` when the SDK cannot be loaded, "unknown" when
    /// it is loaded but does not export its version.
    pub fn version(&self) -> Option<String> {
        match self.resolver.ensure_loaded() {
            Ok(api) => Some(api.version().to_string()),
            Err(e) => {
                tracing::debug!("Everything version unavailable: {}", e);
                None
            }
        }
    }
}

fn as_bool(value: bool) -> api::Bool {
    if value {
        TRUE
    } else {
        FALSE
    }
}

fn configure(api: &EverythingApi, wide_query: &[u16], options: &SearchOptions) {
    let flags = api::REQUEST_FILE_NAME
        | api::REQUEST_PATH
        | api::REQUEST_FULL_PATH_AND_FILE_NAME
        | api::REQUEST_SIZE
        | api::REQUEST_DATE_MODIFIED
        | api::REQUEST_DATE_CREATED;

    // SAFETY: every pointer comes from the resolved SDK table and
    // `wide_query` is NUL-terminated.
    unsafe {
        (api.set_search)(wide_query.as_ptr());
        (api.set_request_flags)(flags);

        if let Some(set_sort) = api.set_sort {
            set_sort(options.sort);
        }

        (api.set_max)(options.max_results.clamp(1, MAX_RESULTS_LIMIT));
        (api.set_offset)(options.offset);

        if let Some(set_match_case) = api.set_match_case {
            set_match_case(as_bool(options.match_case));
        }
        if let Some(set_match_path) = api.set_match_path {
            set_match_path(as_bool(options.match_path));
        }
        if let Some(set_match_whole_word) = api.set_match_whole_word {
            set_match_whole_word(as_bool(options.match_whole_word));
        }
        if let Some(set_regex) = api.set_regex {
            set_regex(as_bool(options.regex));
        }
    }
}

fn read_item(api: &EverythingApi, index: u32) -> Option<SearchResultItem> {
    let full_path = text::from_wide(&text::read_with_growth(INITIAL_PATH_BUFFER, |buf| {
        // SAFETY: `buf` is writable for `buf.len()` units.
        unsafe { (api.get_result_full_path_name)(index, buf.as_mut_ptr(), buf.len() as u32) }
    }));

    // SAFETY: the SDK returns null or a NUL-terminated string it owns.
    let reported_name = text::from_wide(&unsafe {
        text::read_wide_cstr((api.get_result_file_name)(index))
    });

    if full_path.is_empty() && reported_name.is_empty() {
        return None;
    }

    let name = if reported_name.is_empty() {
        file_name_of(&full_path).to_string()
    } else {
        reported_name
    };

    let mut item = SearchResultItem {
        path: parent_of(&full_path).to_string(),
        extension: extension_of(&name).to_string(),
        filename: name.clone(),
        name,
        full_path,
        size: None,
        date_modified: None,
        date_created: None,
        is_folder: None,
    };

    unsafe {
        if let Some(get_size) = api.get_result_size {
            let mut size = 0i64;
            if get_size(index, &mut size) != FALSE {
                item.size = Some(size);
            }
        }

        if let Some(get_modified) = api.get_result_date_modified {
            let mut modified = FileTime::default();
            if get_modified(index, &mut modified) != FALSE {
                item.date_modified = Some(filetime_to_unix_millis(modified.to_raw()));
            }
        }

        if let Some(get_created) = api.get_result_date_created {
            let mut created = FileTime::default();
            if get_created(index, &mut created) != FALSE {
                item.date_created = Some(filetime_to_unix_millis(created.to_raw()));
            }
        }

        if let Some(is_folder) = api.is_folder_result {
            item.is_folder = Some(is_folder(index) == TRUE);
        }
    }

    Some(item)
}

fn last_separator(path: &str) -> Option<usize> {
    path.rfind(['\\', '/'])
}

/// Last path segment, or the whole path when there is no usable segment.
pub fn file_name_of(full_path: &str) -> &str {
    match last_separator(full_path) {
        Some(sep) if sep + 1 < full_path.len() => &full_path[sep + 1..],
        _ => full_path,
    }
}

/// Everything before the last separator; empty without one.
pub fn parent_of(full_path: &str) -> &str {
    match last_separator(full_path) {
        Some(sep) => &full_path[..sep],
        None => "",
    }
}

/// Text after the last '.', empty when there is no dot or it ends the name.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() => &name[dot + 1..],
        _ => "",
    }
}

/// Convert a FILETIME value to Unix milliseconds, clamping pre-1970 to 0.
pub fn filetime_to_unix_millis(raw: u64) -> u64 {
    if raw <= WINDOWS_EPOCH_OFFSET_100NS {
        return 0;
    }
    (raw - WINDOWS_EPOCH_OFFSET_100NS) / 10_000
}
