//! Raw foreign interface to the NSF emulator.
//!
//! The emulator itself is out of scope for this crate — it's assumed to
//! ship as a platform shared library (`.so`/`.dll`/`.dylib`) exposing the C
//! ABI below, the same shape FamiStudio's NotSoFatso bridge uses. This
//! module only knows how to call across that boundary; [`super::Emulator`]
//! gives it a safe, typed face.

use std::ffi::{c_char, c_void, CStr, CString};

use libloading::{Library, Symbol};

use crate::error::{NotationError, Result};

type NsfOpenFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type NsfCloseFn = unsafe extern "C" fn(*mut c_void);
type NsfGetTrackCountFn = unsafe extern "C" fn(*mut c_void) -> i32;
type NsfIsPalFn = unsafe extern "C" fn(*mut c_void) -> i32;
type NsfGetExpansionFn = unsafe extern "C" fn(*mut c_void) -> i32;
type NsfGetTitleFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type NsfGetArtistFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type NsfGetCopyrightFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type NsfGetTrackNameFn = unsafe extern "C" fn(*mut c_void, i32) -> *const c_char;
type NsfSetTrackFn = unsafe extern "C" fn(*mut c_void, i32);
type NsfRunFrameFn = unsafe extern "C" fn(*mut c_void) -> i32;
type NsfGetStateFn = unsafe extern "C" fn(*mut c_void, i32, i32, i32) -> i32;

/// Dynamically-loaded handle to the foreign NSF emulator library.
///
/// Each foreign call is resolved by symbol name on every invocation rather
/// than cached as a long-lived `Symbol`, so this type never borrows from
/// `library` across a call boundary.
pub(super) struct RawLibrary {
    library: Library,
}

macro_rules! sym {
    ($self:expr, $ty:ty, $name:literal) => {{
        let sym: Symbol<$ty> = $self
            .library
            .get($name)
            .map_err(|e| NotationError::LibraryLoadFailed {
                path: String::from_utf8_lossy($name).trim_end_matches('\0').to_string(),
                detail: e.to_string(),
            })?;
        sym
    }};
}

impl RawLibrary {
    pub(super) fn load(path: &str) -> Result<RawLibrary> {
        // SAFETY: loading an arbitrary shared library is inherently unsafe;
        // the caller is responsible for pointing this at a trusted emulator
        // build implementing the ABI above.
        let library = unsafe { Library::new(path) }.map_err(|e| NotationError::LibraryLoadFailed {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
        Ok(RawLibrary { library })
    }

    pub(super) fn open(&self, path: &str) -> Result<*mut c_void> {
        let c_path = CString::new(path).map_err(|e| NotationError::EncodingError(e.to_string()))?;
        let open: Symbol<NsfOpenFn> = sym!(self, NsfOpenFn, b"NsfOpen\0");
        // SAFETY: `c_path` outlives this call; the foreign function copies
        // or consumes it synchronously per the documented ABI.
        let handle = unsafe { open(c_path.as_ptr()) };
        if handle.is_null() {
            return Err(NotationError::NsfOpenFailed(path.to_string()));
        }
        Ok(handle)
    }

    pub(super) fn close(&self, handle: *mut c_void) {
        if let Ok(close) = self.library.get::<NsfCloseFn>(b"NsfClose\0") {
            // SAFETY: `handle` was produced by a prior successful `open` and
            // has not yet been closed.
            unsafe { close(handle) };
        }
    }

    pub(super) fn track_count(&self, handle: *mut c_void) -> Result<u8> {
        let f: Symbol<NsfGetTrackCountFn> = sym!(self, NsfGetTrackCountFn, b"NsfGetTrackCount\0");
        Ok(unsafe { f(handle) } as u8)
    }

    pub(super) fn is_pal(&self, handle: *mut c_void) -> Result<bool> {
        let f: Symbol<NsfIsPalFn> = sym!(self, NsfIsPalFn, b"NsfIsPal\0");
        Ok(unsafe { f(handle) } != 0)
    }

    pub(super) fn expansion_mask(&self, handle: *mut c_void) -> Result<u32> {
        let f: Symbol<NsfGetExpansionFn> = sym!(self, NsfGetExpansionFn, b"NsfGetExpansion\0");
        Ok(unsafe { f(handle) } as u32)
    }

    pub(super) fn title(&self, handle: *mut c_void) -> Result<String> {
        let f: Symbol<NsfGetTitleFn> = sym!(self, NsfGetTitleFn, b"NsfGetTitle\0");
        read_cstr(unsafe { f(handle) })
    }

    pub(super) fn artist(&self, handle: *mut c_void) -> Result<String> {
        let f: Symbol<NsfGetArtistFn> = sym!(self, NsfGetArtistFn, b"NsfGetArtist\0");
        read_cstr(unsafe { f(handle) })
    }

    pub(super) fn copyright(&self, handle: *mut c_void) -> Result<String> {
        let f: Symbol<NsfGetCopyrightFn> = sym!(self, NsfGetCopyrightFn, b"NsfGetCopyright\0");
        read_cstr(unsafe { f(handle) })
    }

    pub(super) fn track_name(&self, handle: *mut c_void, track: u8) -> Result<String> {
        let f: Symbol<NsfGetTrackNameFn> = sym!(self, NsfGetTrackNameFn, b"NsfGetTrackName\0");
        read_cstr(unsafe { f(handle, track as i32) })
    }

    pub(super) fn set_track(&self, handle: *mut c_void, track: u8) -> Result<()> {
        let f: Symbol<NsfSetTrackFn> = sym!(self, NsfSetTrackFn, b"NsfSetTrack\0");
        unsafe { f(handle, track as i32) };
        Ok(())
    }

    pub(super) fn run_frame(&self, handle: *mut c_void) -> Result<bool> {
        let f: Symbol<NsfRunFrameFn> = sym!(self, NsfRunFrameFn, b"NsfRunFrame\0");
        Ok(unsafe { f(handle) } != 0)
    }

    pub(super) fn get_state(
        &self,
        handle: *mut c_void,
        channel_id: u8,
        state_code: u32,
        sub_index: i32,
    ) -> Result<i32> {
        let f: Symbol<NsfGetStateFn> = sym!(self, NsfGetStateFn, b"NsfGetState\0");
        Ok(unsafe { f(handle, channel_id as i32, state_code as i32, sub_index) })
    }
}

/// Trailing NULs are stripped from strings returned across the FFI
/// boundary; the foreign library's own strings are assumed ASCII.
fn read_cstr(ptr: *const c_char) -> Result<String> {
    if ptr.is_null() {
        return Ok(String::new());
    }
    // SAFETY: the foreign function contract guarantees a NUL-terminated
    // string valid for the duration of this call.
    let cstr = unsafe { CStr::from_ptr(ptr) };
    let s = cstr
        .to_str()
        .map_err(|e| NotationError::EncodingError(e.to_string()))?;
    Ok(s.trim_end_matches('\0').to_string())
}
