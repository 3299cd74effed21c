//! Everything SDK function table.
//!
//! Required exports are plain function pointers: if one is missing the
//! table cannot be built. Optional exports are `Option`s, checked at each
//! call site.

use super::loader::Library;
use std::ffi::{c_void, CStr};
use std::ptr::NonNull;

pub type Bool = i32;
pub const TRUE: Bool = 1;
pub const FALSE: Bool = 0;

/// Win32 `FILETIME`: 100ns intervals since 1601-01-01 UTC.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTime {
    pub low_date_time: u32,
    pub high_date_time: u32,
}

impl FileTime {
    pub fn from_raw(raw: u64) -> Self {
        Self {
            low_date_time: raw as u32,
            high_date_time: (raw >> 32) as u32,
        }
    }

    pub fn to_raw(self) -> u64 {
        (u64::from(self.high_date_time) << 32) | u64::from(self.low_date_time)
    }
}

pub const REQUEST_FILE_NAME: u32 = 0x0000_0001;
pub const REQUEST_PATH: u32 = 0x0000_0002;
pub const REQUEST_FULL_PATH_AND_FILE_NAME: u32 = 0x0000_0004;
pub const REQUEST_SIZE: u32 = 0x0000_0010;
pub const REQUEST_DATE_CREATED: u32 = 0x0000_0020;
pub const REQUEST_DATE_MODIFIED: u32 = 0x0000_0040;

pub type SetSearchW = unsafe extern "system" fn(*const u16);
pub type SetRequestFlags = unsafe extern "system" fn(u32);
pub type SetSort = unsafe extern "system" fn(u32);
pub type SetMax = unsafe extern "system" fn(u32);
pub type SetOffset = unsafe extern "system" fn(u32);
pub type QueryW = unsafe extern "system" fn(Bool) -> Bool;
pub type GetLastError = unsafe extern "system" fn() -> u32;
pub type GetNumResults = unsafe extern "system" fn() -> u32;
pub type GetResultFileNameW = unsafe extern "system" fn(u32) -> *const u16;
pub type GetResultFullPathNameW = unsafe extern "system" fn(u32, *mut u16, u32) -> u32;
pub type GetResultSize = unsafe extern "system" fn(u32, *mut i64) -> Bool;
pub type GetResultDate = unsafe extern "system" fn(u32, *mut FileTime) -> Bool;
pub type IsFolderResult = unsafe extern "system" fn(u32) -> Bool;
pub type SetFlag = unsafe extern "system" fn(Bool);
pub type GetVersionPart = unsafe extern "system" fn() -> u32;

/// Resolved Everything SDK exports, tied to the library they came from.
pub struct EverythingApi {
    pub set_search: SetSearchW,
    pub set_request_flags: SetRequestFlags,
    pub set_max: SetMax,
    pub set_offset: SetOffset,
    pub query: QueryW,
    pub get_last_error: GetLastError,
    pub get_num_results: GetNumResults,
    pub get_result_file_name: GetResultFileNameW,
    pub get_result_full_path_name: GetResultFullPathNameW,

    pub set_sort: Option<SetSort>,
    pub get_result_size: Option<GetResultSize>,
    pub get_result_date_modified: Option<GetResultDate>,
    pub get_result_date_created: Option<GetResultDate>,
    pub is_folder_result: Option<IsFolderResult>,
    pub set_match_path: Option<SetFlag>,
    pub set_match_case: Option<SetFlag>,
    pub set_match_whole_word: Option<SetFlag>,
    pub set_regex: Option<SetFlag>,

    version: Option<String>,
    // Keeps the module mapped for as long as the pointers above are reachable.
    _library: Box<dyn Library>,
}

impl std::fmt::Debug for EverythingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EverythingApi")
            .field("version", &self.version)
            .field("set_sort", &self.set_sort.is_some())
            .field("get_result_size", &self.get_result_size.is_some())
            .field("is_folder_result", &self.is_folder_result.is_some())
            .finish_non_exhaustive()
    }
}

/// # Safety
///
/// `T` must be a function pointer type whose signature matches the export.
unsafe fn cast_symbol<T: Copy>(ptr: NonNull<c_void>) -> T {
    debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());
    std::mem::transmute_copy(&ptr)
}

fn required<T: Copy>(library: &dyn Library, name: &CStr) -> Result<T, String> {
    match library.symbol(name) {
        // SAFETY: the function pointer types above mirror Everything.h.
        Some(ptr) => Ok(unsafe { cast_symbol(ptr) }),
        None => Err(format!(
            "Everything SDK missing symbol: {}",
            name.to_string_lossy()
        )),
    }
}

fn optional<T: Copy>(library: &dyn Library, name: &CStr) -> Option<T> {
    let symbol = library.symbol(name);
    if symbol.is_none() {
        tracing::debug!("Everything SDK optional symbol absent: {}", name.to_string_lossy());
    }
    // SAFETY: as in `required`.
    symbol.map(|ptr| unsafe { cast_symbol(ptr) })
}

impl EverythingApi {
    /// Build the table from an opened library. Fails on the first missing
    /// required export, handing the library back so the caller decides when
    /// it is unloaded.
    pub fn resolve(library: Box<dyn Library>) -> Result<Self, (Box<dyn Library>, String)> {
        let lib = library.as_ref();

        let resolved = (|| -> Result<_, String> {
            Ok((
                required::<SetSearchW>(lib, c"Everything_SetSearchW")?,
                required::<SetRequestFlags>(lib, c"Everything_SetRequestFlags")?,
                required::<SetMax>(lib, c"Everything_SetMax")?,
                required::<SetOffset>(lib, c"Everything_SetOffset")?,
                required::<QueryW>(lib, c"Everything_QueryW")?,
                required::<GetLastError>(lib, c"Everything_GetLastError")?,
                required::<GetNumResults>(lib, c"Everything_GetNumResults")?,
                required::<GetResultFileNameW>(lib, c"Everything_GetResultFileNameW")?,
                required::<GetResultFullPathNameW>(lib, c"Everything_GetResultFullPathNameW")?,
            ))
        })();

        let (
            set_search,
            set_request_flags,
            set_max,
            set_offset,
            query,
            get_last_error,
            get_num_results,
            get_result_file_name,
            get_result_full_path_name,
        ) = match resolved {
            Ok(table) => table,
            Err(message) => return Err((library, message)),
        };

        let version = read_version(lib);

        Ok(Self {
            set_search,
            set_request_flags,
            set_max,
            set_offset,
            query,
            get_last_error,
            get_num_results,
            get_result_file_name,
            get_result_full_path_name,
            set_sort: optional(lib, c"Everything_SetSort"),
            get_result_size: optional(lib, c"Everything_GetResultSize"),
            get_result_date_modified: optional(lib, c"Everything_GetResultDateModified"),
            get_result_date_created: optional(lib, c"Everything_GetResultDateCreated"),
            is_folder_result: optional(lib, c"Everything_IsFolderResult"),
            set_match_path: optional(lib, c"Everything_SetMatchPath"),
            set_match_case: optional(lib, c"Everything_SetMatchCase"),
            set_match_whole_word: optional(lib, c"Everything_SetMatchWholeWord"),
            set_regex: optional(lib, c"Everything_SetRegex"),
            version,
            _library: library,
        })
    }

    /// Dotted SDK version, or "unknown" when the version exports are missing.
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }
}

fn read_version(lib: &dyn Library) -> Option<String> {
    let major: GetVersionPart = optional(lib, c"Everything_GetMajorVersion")?;
    let minor: GetVersionPart = optional(lib, c"Everything_GetMinorVersion")?;
    let revision: GetVersionPart = optional(lib, c"Everything_GetRevision")?;
    let build: GetVersionPart = optional(lib, c"Everything_GetBuildNumber")?;

    // SAFETY: argument-less getters returning DWORD.
    let parts = unsafe { [major(), minor(), revision(), build()] };
    Some(format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3]))
}
