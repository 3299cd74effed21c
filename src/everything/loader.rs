//! Locating and loading the Everything SDK library.
//!
//! Candidates are tried strictly in order and the first one that opens and
//! exports every required symbol wins. Success is cached for the life of
//! the process; failure is not, so an SDK installed later is picked up by
//! the next call.

use super::api::EverythingApi;
use std::ffi::{c_void, CStr, OsString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, OnceLock};

/// Environment variable holding an explicit path to the SDK library.
pub const DLL_PATH_ENV: &str = "TALEX_EVERYTHING_DLL_PATH";

#[cfg(target_pointer_width = "64")]
const ARCH_DLL_NAME: &str = "Everything64.dll";
#[cfg(not(target_pointer_width = "64"))]
const ARCH_DLL_NAME: &str = "Everything32.dll";

const GENERIC_DLL_NAME: &str = "Everything.dll";
const NOT_FOUND: &str = "Everything SDK DLL not found";

/// An opened shared library. Dropping it unloads the module.
pub trait Library: Send + Sync {
    fn symbol(&self, name: &CStr) -> Option<NonNull<c_void>>;
}

/// Opens shared libraries by path.
pub trait LibraryLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn Library>, String>;
}

/// Candidate library locations, most specific first.
pub fn candidate_paths(
    override_path: Option<OsString>,
    program_files: Option<OsString>,
    program_files_x86: Option<OsString>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(path));
    }

    candidates.push(PathBuf::from(ARCH_DLL_NAME));
    candidates.push(PathBuf::from(GENERIC_DLL_NAME));

    if let Some(dir) = program_files.filter(|p| !p.is_empty()) {
        let dir = PathBuf::from(dir).join("Everything");
        candidates.push(dir.join("Everything64.dll"));
        candidates.push(dir.join(GENERIC_DLL_NAME));
        candidates.push(dir.join("Everything32.dll"));
    }
    if let Some(dir) = program_files_x86.filter(|p| !p.is_empty()) {
        let dir = PathBuf::from(dir).join("Everything");
        candidates.push(dir.join("Everything32.dll"));
        candidates.push(dir.join(GENERIC_DLL_NAME));
    }

    candidates
}

type CandidateSource = Box<dyn Fn() -> Vec<PathBuf> + Send + Sync>;

/// Lazily loaded Everything SDK, shared by every search call.
pub struct Resolver {
    loader: Box<dyn LibraryLoader>,
    candidates: CandidateSource,
    api: OnceLock<Arc<EverythingApi>>,
    load_lock: Mutex<()>,
}

impl Resolver {
    /// Resolver over the standard candidate list. `override_path` wins over
    /// [`DLL_PATH_ENV`], which is re-read on every load attempt.
    pub fn new(loader: Box<dyn LibraryLoader>, override_path: Option<PathBuf>) -> Self {
        Self::with_candidates(loader, move || {
            let override_path = override_path
                .clone()
                .map(PathBuf::into_os_string)
                .or_else(|| std::env::var_os(DLL_PATH_ENV));
            candidate_paths(
                override_path,
                std::env::var_os("PROGRAMFILES"),
                std::env::var_os("PROGRAMFILES(X86)"),
            )
        })
    }

    pub fn with_candidates<F>(loader: Box<dyn LibraryLoader>, candidates: F) -> Self
    where
        F: Fn() -> Vec<PathBuf> + Send + Sync + 'static,
    {
        Self {
            loader,
            candidates: Box::new(candidates),
            api: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.api.get().is_some()
    }

    /// Load the SDK if it is not loaded yet.
    ///
    /// On failure the error is the most specific message seen across all
    /// candidates, and nothing is cached.
    pub fn ensure_loaded(&self) -> Result<Arc<EverythingApi>, String> {
        if let Some(api) = self.api.get() {
            return Ok(Arc::clone(api));
        }

        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another thread may have finished loading while we waited.
        if let Some(api) = self.api.get() {
            return Ok(Arc::clone(api));
        }

        let api = Arc::new(self.load_first_candidate()?);
        tracing::info!("Everything SDK loaded, version {}", api.version());
        Ok(Arc::clone(self.api.get_or_init(|| api)))
    }

    fn load_first_candidate(&self) -> Result<EverythingApi, String> {
        let mut last_error = NOT_FOUND.to_string();

        for candidate in (self.candidates)() {
            if candidate.as_os_str().is_empty() {
                continue;
            }

            match self.load_from(&candidate) {
                Ok(api) => return Ok(api),
                Err(e) => {
                    tracing::debug!("Everything SDK candidate rejected: {}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn load_from(&self, candidate: &Path) -> Result<EverythingApi, String> {
        let library = self.loader.open(candidate).map_err(|e| {
            format!(
                "Unable to load Everything SDK DLL from {}: {}",
                candidate.display(),
                e
            )
        })?;

        EverythingApi::resolve(library).map_err(|(library, message)| {
            drop(library);
            format!("{} ({})", message, candidate.display())
        })
    }
}
