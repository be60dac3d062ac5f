//! Native-convention argument vector
//!
//! The runtime's initializer expects `int argc, char **argv` with a trailing
//! NULL entry. [`ArgumentVector`] owns every string as a separate allocation
//! and keeps the pointer array next to them. Release happens on drop, so the
//! vector is freed on every exit path, including a failed initialization.

use crate::error::{HostError, Result};
use std::ffi::{c_char, c_int, CStr, CString, OsStr};
use std::ptr;

/// Owned `argc`/`argv` pair handed to the runtime's initializer
pub struct ArgumentVector {
    // Strings are freed from here, never through `ptrs`: the runtime's
    // option parser may permute the pointer array while reading it.
    strings: Vec<CString>,
    ptrs: Vec<*mut c_char>,
}

// SAFETY: every pointer in `ptrs` points into a `CString` owned by the same
// value, so moving the vector to another thread moves the allocations too.
unsafe impl Send for ArgumentVector {}

impl ArgumentVector {
    /// Build a vector from process-style arguments (index 0 = program name)
    ///
    /// Fails with [`HostError::InvalidArgument`] when an argument holds an
    /// interior NUL byte (it could not be passed without truncation) and with
    /// [`HostError::OutOfMemory`] when an allocation cannot be reserved. No
    /// partially built vector is ever returned.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args = args.into_iter();

        let mut strings: Vec<CString> = Vec::new();
        strings.try_reserve_exact(args.size_hint().0)?;
        for (index, arg) in args.enumerate() {
            let c_string = to_c_string(index, arg.as_ref())?;
            strings.try_reserve(1)?;
            strings.push(c_string);
        }

        if c_int::try_from(strings.len()).is_err() {
            return Err(HostError::InvalidArgument {
                index: strings.len(),
                reason: "too many arguments for argc".to_string(),
            });
        }

        let mut ptrs: Vec<*mut c_char> = Vec::new();
        ptrs.try_reserve_exact(strings.len() + 1)?;
        ptrs.extend(strings.iter().map(|s| s.as_ptr() as *mut c_char));
        ptrs.push(ptr::null_mut());

        Ok(Self { strings, ptrs })
    }

    /// Build a vector from the arguments of the current process
    pub fn from_env() -> Result<Self> {
        Self::from_args(std::env::args_os())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// `argc` as the runtime expects it
    pub fn argc(&self) -> c_int {
        // bounded by the check in `from_args`
        self.strings.len() as c_int
    }

    /// NULL-terminated `argv` array
    ///
    /// The runtime may reorder the pointer array; the strings themselves are
    /// never written through it.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.ptrs.as_mut_ptr()
    }

    /// Argument at `index`, in the original order
    pub fn get(&self, index: usize) -> Option<&CStr> {
        self.strings.get(index).map(CString::as_c_str)
    }

    /// Iterate over the arguments in their original order
    pub fn iter(&self) -> impl Iterator<Item = &CStr> + '_ {
        self.strings.iter().map(CString::as_c_str)
    }

    /// Arguments as (lossy) UTF-8 strings, for option parsing and logging
    pub fn to_string_lossy_vec(&self) -> Vec<String> {
        self.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Release the vector explicitly
    ///
    /// Consuming `self` makes a second release, or any use after release, a
    /// compile-time error.
    pub fn release(self) {
        drop(self);
    }
}

impl std::fmt::Debug for ArgumentVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.strings.iter()).finish()
    }
}

#[cfg(unix)]
fn os_bytes(_index: usize, arg: &OsStr) -> Result<&[u8]> {
    use std::os::unix::ffi::OsStrExt;
    Ok(arg.as_bytes())
}

#[cfg(not(unix))]
fn os_bytes(index: usize, arg: &OsStr) -> Result<&[u8]> {
    arg.to_str()
        .map(str::as_bytes)
        .ok_or_else(|| HostError::InvalidArgument {
            index,
            reason: "argument is not valid unicode".to_string(),
        })
}

fn to_c_string(index: usize, arg: &OsStr) -> Result<CString> {
    let bytes = os_bytes(index, arg)?;
    if let Some(offset) = bytes.iter().position(|&b| b == 0) {
        return Err(HostError::InvalidArgument {
            index,
            reason: format!("interior NUL byte at offset {offset}"),
        });
    }

    // Reserve room for the terminator so CString::new does not reallocate
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len() + 1)?;
    buf.extend_from_slice(bytes);
    CString::new(buf).map_err(|e| HostError::InvalidArgument {
        index,
        reason: e.to_string(),
    })
}

/// C ABI for hosts written in other languages
///
/// Mirrors the create/add/free string-array helpers the runtime ships with,
/// but frees through the owning vector instead of the pointer array.
pub mod ffi {
    use super::*;
    use crate::error::{set_error, HostErrorCode, TeoError};

    /// Build an argument vector from `count` C strings
    ///
    /// On success `*out` receives a vector that must be released with
    /// `teo_argv_free`.
    ///
    /// # Safety
    ///
    /// `args` must point to `count` valid NUL-terminated strings (it may be
    /// null when `count` is 0). `out` must be a valid pointer.
    #[no_mangle]
    pub unsafe extern "C" fn teo_argv_new(
        args: *const *const c_char,
        count: usize,
        out: *mut *mut ArgumentVector,
        err: *mut TeoError,
    ) -> i32 {
        if out.is_null() || (args.is_null() && count > 0) {
            return set_error(
                err,
                &HostError::InvalidArgument {
                    index: 0,
                    reason: "null pointer passed to teo_argv_new".to_string(),
                },
            );
        }

        let mut owned: Vec<&OsStr> = Vec::new();
        if owned.try_reserve_exact(count).is_err() {
            return set_error(err, &HostError::OutOfMemory);
        }
        for index in 0..count {
            let arg = *args.add(index);
            if arg.is_null() {
                return set_error(
                    err,
                    &HostError::InvalidArgument {
                        index,
                        reason: "null string".to_string(),
                    },
                );
            }
            owned.push(cstr_as_os_str(CStr::from_ptr(arg)));
        }

        match ArgumentVector::from_args(owned) {
            Ok(argv) => {
                *out = Box::into_raw(Box::new(argv));
                HostErrorCode::Success as i32
            }
            Err(e) => set_error(err, &e),
        }
    }

    /// Number of arguments, or 0 for a null vector
    ///
    /// # Safety
    ///
    /// `argv` must be null or a live vector from `teo_argv_new`.
    #[no_mangle]
    pub unsafe extern "C" fn teo_argv_count(argv: *const ArgumentVector) -> c_int {
        match argv.as_ref() {
            Some(argv) => argv.argc(),
            None => 0,
        }
    }

    /// NULL-terminated `char **` view, or null for a null vector
    ///
    /// # Safety
    ///
    /// `argv` must be null or a live vector from `teo_argv_new`.
    #[no_mangle]
    pub unsafe extern "C" fn teo_argv_ptr(argv: *mut ArgumentVector) -> *mut *mut c_char {
        match argv.as_mut() {
            Some(argv) => argv.as_mut_ptr(),
            None => ptr::null_mut(),
        }
    }

    /// Free a vector and reset the caller's pointer to null
    ///
    /// Because the pointer is reset, calling this again with the same
    /// location is a documented no-op. Freeing a copy of the pointer that
    /// was not reset is a contract violation.
    ///
    /// # Safety
    ///
    /// `argv` must be null or point to a location holding null or a live
    /// vector from `teo_argv_new`.
    #[no_mangle]
    pub unsafe extern "C" fn teo_argv_free(argv: *mut *mut ArgumentVector) {
        if argv.is_null() || (*argv).is_null() {
            return;
        }
        drop(Box::from_raw(*argv));
        *argv = ptr::null_mut();
    }

    #[cfg(unix)]
    fn cstr_as_os_str(s: &CStr) -> &OsStr {
        use std::os::unix::ffi::OsStrExt;
        OsStr::from_bytes(s.to_bytes())
    }

    #[cfg(not(unix))]
    fn cstr_as_os_str(s: &CStr) -> &OsStr {
        OsStr::new(s.to_str().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(argv: &mut ArgumentVector) -> Vec<Vec<u8>> {
        let argc = argv.argc() as usize;
        let raw = argv.as_mut_ptr();
        let mut out = Vec::new();
        unsafe {
            for i in 0..argc {
                out.push(CStr::from_ptr(*raw.add(i)).to_bytes().to_vec());
            }
            assert!((*raw.add(argc)).is_null(), "argv must be NULL-terminated");
        }
        out
    }

    #[test]
    fn builds_count_and_exact_bytes() {
        let mut argv = ArgumentVector::from_args(["prog", "-a", "10.0.0.1"]).unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv.argc(), 3);
        assert_eq!(
            read_back(&mut argv),
            vec![b"prog".to_vec(), b"-a".to_vec(), b"10.0.0.1".to_vec()]
        );
    }

    #[test]
    fn empty_input_is_zero_count() {
        let mut argv = ArgumentVector::from_args(Vec::<String>::new()).unwrap();
        assert!(argv.is_empty());
        assert_eq!(argv.argc(), 0);
        assert!(read_back(&mut argv).is_empty());
    }

    #[test]
    fn interior_nul_is_rejected() {
        let err = ArgumentVector::from_args(["prog", "bad\0arg"]).unwrap_err();
        match err {
            HostError::InvalidArgument { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("offset 3"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn strings_survive_pointer_permutation() {
        let mut argv = ArgumentVector::from_args(["prog", "host", "-a", "addr"]).unwrap();
        // getopt-style reordering of the pointer array
        unsafe {
            let raw = argv.as_mut_ptr();
            std::ptr::swap(raw.add(1), raw.add(3));
        }
        assert_eq!(argv.get(1).unwrap().to_bytes(), b"host");
        assert_eq!(argv.get(3).unwrap().to_bytes(), b"addr");
        argv.release();
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_bytes_are_kept_verbatim() {
        use std::os::unix::ffi::OsStrExt;
        let raw = OsStr::from_bytes(&[0x66, 0xff, 0x6f]);
        let argv = ArgumentVector::from_args([raw]).unwrap();
        assert_eq!(argv.get(0).unwrap().to_bytes(), &[0x66, 0xff, 0x6f]);
    }
}
