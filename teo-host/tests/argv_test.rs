use std::ffi::{c_char, CStr, CString};
use std::ptr;
use teo_host::argv::ffi::{teo_argv_count, teo_argv_free, teo_argv_new, teo_argv_ptr};
use teo_host::error::ffi::teo_error_message_free;
use teo_host::{ArgumentVector, HostError, HostErrorCode, TeoError};

fn collect(argv: &mut ArgumentVector) -> Vec<Vec<u8>> {
    let raw = argv.as_mut_ptr();
    (0..argv.len())
        .map(|i| unsafe { CStr::from_ptr(*raw.add(i)).to_bytes().to_vec() })
        .collect()
}

#[test]
fn count_and_bytes_match_input() {
    let inputs: Vec<Vec<&str>> = vec![
        vec!["prog"],
        vec!["prog", "-a", "10.0.0.1"],
        vec!["teogo", "teo-go", "--port", "9010", "", "ünïcode"],
    ];
    for input in inputs {
        let mut argv = ArgumentVector::from_args(&input).unwrap();
        assert_eq!(argv.len(), input.len());
        assert_eq!(argv.argc() as usize, input.len());
        let expected: Vec<Vec<u8>> = input.iter().map(|s| s.as_bytes().to_vec()).collect();
        assert_eq!(collect(&mut argv), expected);
        assert_eq!(
            argv.to_string_lossy_vec(),
            input.iter().map(|s| s.to_string()).collect::<Vec<_>>()
        );
    }
}

#[test]
fn nul_in_any_position_fails_without_partial_vector() {
    let err = ArgumentVector::from_args(["prog", "ok", "x\0y"]).unwrap_err();
    assert!(matches!(err, HostError::InvalidArgument { index: 2, .. }));
    assert_eq!(err.code(), HostErrorCode::InvalidParameters);
}

#[test]
fn c_abi_builds_and_frees_once() {
    let owned: Vec<CString> = ["prog", "-a", "10.0.0.1"]
        .iter()
        .map(|s| CString::new(*s).unwrap())
        .collect();
    let args: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();

    let mut argv: *mut ArgumentVector = ptr::null_mut();
    let mut err = TeoError::empty();
    let rc = unsafe { teo_argv_new(args.as_ptr(), args.len(), &mut argv, &mut err) };
    assert_eq!(rc, HostErrorCode::Success as i32);
    assert!(!argv.is_null());
    assert!(err.message.is_null());

    unsafe {
        assert_eq!(teo_argv_count(argv), 3);
        let raw = teo_argv_ptr(argv);
        assert_eq!(CStr::from_ptr(*raw.add(2)).to_bytes(), b"10.0.0.1");
        assert!((*raw.add(3)).is_null());

        teo_argv_free(&mut argv);
        assert!(argv.is_null());
        // second release through the same location is a no-op
        teo_argv_free(&mut argv);
        assert!(argv.is_null());
        teo_argv_free(ptr::null_mut());

        assert_eq!(teo_argv_count(argv), 0);
        assert!(teo_argv_ptr(argv).is_null());
    }
}

#[test]
fn c_abi_reports_null_entries() {
    let first = CString::new("prog").unwrap();
    let args = [first.as_ptr(), ptr::null()];

    let mut argv: *mut ArgumentVector = ptr::null_mut();
    let mut err = TeoError::empty();
    let rc = unsafe { teo_argv_new(args.as_ptr(), args.len(), &mut argv, &mut err) };
    assert_eq!(rc, HostErrorCode::InvalidParameters as i32);
    assert_eq!(err.code, rc);
    assert!(argv.is_null());

    let message = unsafe { CStr::from_ptr(err.message) }.to_str().unwrap();
    assert!(message.contains("index 1"), "{message}");
    unsafe { teo_error_message_free(&mut err) };
    assert!(err.message.is_null());
}

#[test]
fn c_abi_accepts_empty_list() {
    let mut argv: *mut ArgumentVector = ptr::null_mut();
    let rc = unsafe { teo_argv_new(ptr::null(), 0, &mut argv, ptr::null_mut()) };
    assert_eq!(rc, HostErrorCode::Success as i32);
    unsafe {
        assert_eq!(teo_argv_count(argv), 0);
        assert!((*teo_argv_ptr(argv)).is_null());
        teo_argv_free(&mut argv);
    }
}
