//! `LoadLibraryW`-backed loader for the real Everything SDK DLL.

use super::loader::{Library, LibraryLoader};
use std::ffi::{c_void, CStr};
use std::path::Path;
use std::ptr::NonNull;
use windows::{
    core::{HSTRING, PCSTR},
    Win32::Foundation::{FreeLibrary, HMODULE},
    Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW},
};

pub struct Win32Loader;

impl LibraryLoader for Win32Loader {
    fn open(&self, path: &Path) -> Result<Box<dyn Library>, String> {
        // SAFETY: loading a DLL runs its DllMain; the Everything SDK has no
        // initialization side effects beyond its own globals.
        let module = unsafe { LoadLibraryW(&HSTRING::from(path)) }.map_err(|e| e.to_string())?;
        Ok(Box::new(Win32Library { module }))
    }
}

struct Win32Library {
    module: HMODULE,
}

// SAFETY: an HMODULE is a process-wide handle, usable from any thread.
unsafe impl Send for Win32Library {}
unsafe impl Sync for Win32Library {}

impl Library for Win32Library {
    fn symbol(&self, name: &CStr) -> Option<NonNull<c_void>> {
        // SAFETY: `name` is NUL-terminated and the module is still loaded.
        let proc = unsafe { GetProcAddress(self.module, PCSTR(name.as_ptr().cast())) }?;
        NonNull::new(proc as *mut c_void)
    }
}

impl Drop for Win32Library {
    fn drop(&mut self) {
        // SAFETY: the module was loaded by us and nothing resolved from it
        // outlives this value.
        if let Err(e) = unsafe { FreeLibrary(self.module) } {
            tracing::warn!("FreeLibrary failed: {}", e);
        }
    }
}
