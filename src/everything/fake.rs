//! In-process stand-in for the Everything SDK.
//!
//! The exports are ordinary `extern "system"` functions over one
//! process-wide state, handed out through a fake loader, so the resolver and
//! the query executor run unchanged on any platform, on whatever thread the
//! caller picks. Tests that configure or inspect that state hold a
//! [`FakeSession`].

use super::api::{Bool, FileTime, FALSE, TRUE};
use super::loader::{Library, LibraryLoader};
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;

pub const REQUIRED_SYMBOLS: &[&str] = &[
    "Everything_SetSearchW",
    "Everything_SetRequestFlags",
    "Everything_SetMax",
    "Everything_SetOffset",
    "Everything_QueryW",
    "Everything_GetLastError",
    "Everything_GetNumResults",
    "Everything_GetResultFileNameW",
    "Everything_GetResultFullPathNameW",
];

pub const OPTIONAL_SYMBOLS: &[&str] = &[
    "Everything_SetSort",
    "Everything_GetResultSize",
    "Everything_GetResultDateModified",
    "Everything_GetResultDateCreated",
    "Everything_IsFolderResult",
    "Everything_SetMatchPath",
    "Everything_SetMatchCase",
    "Everything_SetMatchWholeWord",
    "Everything_SetRegex",
    "Everything_GetMajorVersion",
    "Everything_GetMinorVersion",
    "Everything_GetRevision",
    "Everything_GetBuildNumber",
];

pub fn all_symbols() -> Vec<String> {
    REQUIRED_SYMBOLS
        .iter()
        .chain(OPTIONAL_SYMBOLS.iter())
        .map(|s| s.to_string())
        .collect()
}

/// One row the fake engine returns.
#[derive(Debug, Clone, Default)]
pub struct FakeItem {
    pub full_path: String,
    pub file_name: String,
    pub size: Option<i64>,
    pub modified: Option<u64>,
    pub created: Option<u64>,
    pub folder: bool,
}

impl FakeItem {
    pub fn file(full_path: &str, file_name: &str) -> Self {
        Self {
            full_path: full_path.to_string(),
            file_name: file_name.to_string(),
            ..Default::default()
        }
    }
}

/// Everything the fake engine saw and will answer.
#[derive(Debug, Default)]
pub struct FakeState {
    pub calls: Vec<&'static str>,
    pub search: String,
    pub request_flags: u32,
    pub sort: Option<u32>,
    pub max: Option<u32>,
    pub offset: Option<u32>,
    pub match_path: Option<bool>,
    pub match_case: Option<bool>,
    pub match_whole_word: Option<bool>,
    pub regex: Option<bool>,
    pub fail_with: Option<u32>,
    pub last_error: u32,
    pub items: Vec<FakeItem>,
    names: Vec<Vec<u16>>,
    pub full_path_calls: Vec<u32>,
    pub query_thread: Option<ThreadId>,
}

impl FakeState {
    const fn empty() -> Self {
        Self {
            calls: Vec::new(),
            search: String::new(),
            request_flags: 0,
            sort: None,
            max: None,
            offset: None,
            match_path: None,
            match_case: None,
            match_whole_word: None,
            regex: None,
            fail_with: None,
            last_error: 0,
            items: Vec::new(),
            names: Vec::new(),
            full_path_calls: Vec::new(),
            query_thread: None,
        }
    }
}

static STATE: Mutex<FakeState> = Mutex::new(FakeState::empty());
static SESSION: Mutex<()> = Mutex::new(());

/// Exclusive use of the fake engine until dropped.
#[must_use]
pub struct FakeSession {
    _guard: MutexGuard<'static, ()>,
}

/// Wait for the fake engine, then start from an empty state.
pub fn session() -> FakeSession {
    let guard = SESSION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    reset(Vec::new());
    FakeSession { _guard: guard }
}

/// Clear the engine and load it with `items`.
pub fn reset(items: Vec<FakeItem>) {
    let names = items
        .iter()
        .map(|item| item.file_name.encode_utf16().chain(std::iter::once(0)).collect())
        .collect();
    with_state(|s| {
        *s = FakeState {
            items,
            names,
            ..FakeState::empty()
        }
    });
}

/// Make the next query fail with `code`.
pub fn fail_next_query(code: u32) {
    with_state(|s| s.fail_with = Some(code));
}

pub fn with_state<R>(f: impl FnOnce(&mut FakeState) -> R) -> R {
    let mut state = STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut state)
}

fn flag(value: Bool) -> bool {
    value != FALSE
}

unsafe extern "system" fn set_search(value: *const u16) {
    let wide = crate::text::read_wide_cstr(value);
    with_state(|s| {
        s.calls.push("set_search");
        s.search = String::from_utf16_lossy(&wide);
    });
}

unsafe extern "system" fn set_request_flags(value: u32) {
    with_state(|s| {
        s.calls.push("set_request_flags");
        s.request_flags = value;
    });
}

unsafe extern "system" fn set_sort(value: u32) {
    with_state(|s| {
        s.calls.push("set_sort");
        s.sort = Some(value);
    });
}

unsafe extern "system" fn set_max(value: u32) {
    with_state(|s| {
        s.calls.push("set_max");
        s.max = Some(value);
    });
}

unsafe extern "system" fn set_offset(value: u32) {
    with_state(|s| {
        s.calls.push("set_offset");
        s.offset = Some(value);
    });
}

unsafe extern "system" fn set_match_path(value: Bool) {
    with_state(|s| {
        s.calls.push("set_match_path");
        s.match_path = Some(flag(value));
    });
}

unsafe extern "system" fn set_match_case(value: Bool) {
    with_state(|s| {
        s.calls.push("set_match_case");
        s.match_case = Some(flag(value));
    });
}

unsafe extern "system" fn set_match_whole_word(value: Bool) {
    with_state(|s| {
        s.calls.push("set_match_whole_word");
        s.match_whole_word = Some(flag(value));
    });
}

unsafe extern "system" fn set_regex(value: Bool) {
    with_state(|s| {
        s.calls.push("set_regex");
        s.regex = Some(flag(value));
    });
}

unsafe extern "system" fn query(_wait: Bool) -> Bool {
    with_state(|s| {
        s.calls.push("query");
        s.query_thread = Some(std::thread::current().id());
        match s.fail_with.take() {
            Some(code) => {
                s.last_error = code;
                FALSE
            }
            None => {
                s.last_error = 0;
                TRUE
            }
        }
    })
}

unsafe extern "system" fn get_last_error() -> u32 {
    with_state(|s| s.last_error)
}

unsafe extern "system" fn get_num_results() -> u32 {
    with_state(|s| s.items.len() as u32)
}

unsafe extern "system" fn get_result_file_name(index: u32) -> *const u16 {
    with_state(|s| match s.names.get(index as usize) {
        // The buffer stays put until the next reset.
        Some(name) if name.len() > 1 => name.as_ptr(),
        _ => std::ptr::null(),
    })
}

unsafe extern "system" fn get_result_full_path_name(index: u32, buf: *mut u16, max: u32) -> u32 {
    let wide: Vec<u16> = with_state(|s| {
        s.full_path_calls.push(max);
        s.items
            .get(index as usize)
            .map(|item| item.full_path.encode_utf16().collect())
            .unwrap_or_default()
    });

    if wide.len() >= max as usize {
        return wide.len() as u32;
    }
    std::ptr::copy_nonoverlapping(wide.as_ptr(), buf, wide.len());
    *buf.add(wide.len()) = 0;
    wide.len() as u32
}

unsafe extern "system" fn get_result_size(index: u32, out: *mut i64) -> Bool {
    match with_state(|s| s.items.get(index as usize).and_then(|i| i.size)) {
        Some(size) => {
            *out = size;
            TRUE
        }
        None => FALSE,
    }
}

unsafe extern "system" fn get_result_date_modified(index: u32, out: *mut FileTime) -> Bool {
    match with_state(|s| s.items.get(index as usize).and_then(|i| i.modified)) {
        Some(raw) => {
            *out = FileTime::from_raw(raw);
            TRUE
        }
        None => FALSE,
    }
}

unsafe extern "system" fn get_result_date_created(index: u32, out: *mut FileTime) -> Bool {
    match with_state(|s| s.items.get(index as usize).and_then(|i| i.created)) {
        Some(raw) => {
            *out = FileTime::from_raw(raw);
            TRUE
        }
        None => FALSE,
    }
}

unsafe extern "system" fn is_folder_result(index: u32) -> Bool {
    if with_state(|s| s.items.get(index as usize).is_some_and(|i| i.folder)) {
        TRUE
    } else {
        FALSE
    }
}

unsafe extern "system" fn major_version() -> u32 {
    1
}

unsafe extern "system" fn minor_version() -> u32 {
    4
}

unsafe extern "system" fn revision() -> u32 {
    1
}

unsafe extern "system" fn build_number() -> u32 {
    1024
}

fn export_address(name: &str) -> Option<usize> {
    let address = match name {
        "Everything_SetSearchW" => set_search as usize,
        "Everything_SetRequestFlags" => set_request_flags as usize,
        "Everything_SetMax" => set_max as usize,
        "Everything_SetOffset" => set_offset as usize,
        "Everything_QueryW" => query as usize,
        "Everything_GetLastError" => get_last_error as usize,
        "Everything_GetNumResults" => get_num_results as usize,
        "Everything_GetResultFileNameW" => get_result_file_name as usize,
        "Everything_GetResultFullPathNameW" => get_result_full_path_name as usize,
        "Everything_SetSort" => set_sort as usize,
        "Everything_GetResultSize" => get_result_size as usize,
        "Everything_GetResultDateModified" => get_result_date_modified as usize,
        "Everything_GetResultDateCreated" => get_result_date_created as usize,
        "Everything_IsFolderResult" => is_folder_result as usize,
        "Everything_SetMatchPath" => set_match_path as usize,
        "Everything_SetMatchCase" => set_match_case as usize,
        "Everything_SetMatchWholeWord" => set_match_whole_word as usize,
        "Everything_SetRegex" => set_regex as usize,
        "Everything_GetMajorVersion" => major_version as usize,
        "Everything_GetMinorVersion" => minor_version as usize,
        "Everything_GetRevision" => revision as usize,
        "Everything_GetBuildNumber" => build_number as usize,
        _ => return None,
    };
    Some(address)
}

/// A "module" exporting a chosen subset of the fake functions.
pub struct FakeLibrary {
    exports: HashMap<String, usize>,
    path: PathBuf,
    unloaded: Option<Arc<Mutex<Vec<PathBuf>>>>,
}

impl FakeLibrary {
    pub fn with<S: AsRef<str>>(symbols: &[S]) -> Self {
        let exports = symbols
            .iter()
            .filter_map(|s| export_address(s.as_ref()).map(|a| (s.as_ref().to_string(), a)))
            .collect();
        Self {
            exports,
            path: PathBuf::new(),
            unloaded: None,
        }
    }

    pub fn complete() -> Self {
        Self::with(all_symbols().as_slice())
    }
}

impl Library for FakeLibrary {
    fn symbol(&self, name: &CStr) -> Option<NonNull<c_void>> {
        let name = name.to_str().ok()?;
        self.exports
            .get(name)
            .and_then(|address| NonNull::new(*address as *mut c_void))
    }
}

impl Drop for FakeLibrary {
    fn drop(&mut self) {
        if let Some(unloaded) = &self.unloaded {
            unloaded.lock().unwrap().push(self.path.clone());
        }
    }
}

/// Loader over a table of "installed" fake libraries keyed by path.
#[derive(Default)]
pub struct FakeLoader {
    installed: Arc<Mutex<HashMap<PathBuf, Vec<String>>>>,
    attempts: Arc<Mutex<Vec<PathBuf>>>,
    unloaded: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library<S: AsRef<str>>(self, path: &str, symbols: &[S]) -> Self {
        let symbols = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        self.installed
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), symbols);
        self
    }

    pub fn with_complete_library(self, path: &str) -> Self {
        self.with_library(path, all_symbols().as_slice())
    }

    pub fn attempts(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.attempts)
    }

    pub fn unloaded(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.unloaded)
    }

    pub fn installed(&self) -> Arc<Mutex<HashMap<PathBuf, Vec<String>>>> {
        Arc::clone(&self.installed)
    }
}

impl LibraryLoader for FakeLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn Library>, String> {
        self.attempts.lock().unwrap().push(path.to_path_buf());

        let installed = self.installed.lock().unwrap();
        let symbols = installed
            .get(path)
            .ok_or_else(|| "The specified module could not be found. (os error 126)".to_string())?;

        let mut library = FakeLibrary::with(symbols);
        library.path = path.to_path_buf();
        library.unloaded = Some(Arc::clone(&self.unloaded));
        Ok(Box::new(library))
    }
}
