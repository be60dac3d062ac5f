use std::env;
use std::path::PathBuf;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR");
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let config_path = PathBuf::from(&crate_dir).join("cbindgen.toml");

    // Generate the C header for native hosts that embed the dispatcher
    let config = cbindgen::Config::from_file(&config_path).unwrap_or_default();
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("teo_host.h"));
        }
        Err(e) => println!("cargo:warning=teo_host.h was not generated: {e}"),
    }

    // libteonet is only linked when the native runtime is requested
    if env::var_os("CARGO_FEATURE_NATIVE").is_some() {
        if let Ok(dir) = env::var("TEONET_LIB_DIR") {
            println!("cargo:rustc-link-search=native={dir}");
        }
    }

    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-env-changed=TEONET_LIB_DIR");
}
