fn main() {
    // Locating or building libjsonnet is the packager's concern; we only
    // emit the link request. `JSONNET_LIB_DIR` adds a search path for
    // non-standard installs.
    if let Ok(dir) = std::env::var("JSONNET_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
    }
    println!("cargo:rerun-if-env-changed=JSONNET_LIB_DIR");
    println!("cargo:rustc-link-lib=jsonnet");
}
