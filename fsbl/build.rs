//! Zero FSBL Build Script
//!
//! Reports the build configuration for the boot loader. The linker script and
//! startup code come from the board support package on target builds; hosted
//! builds (tests, simulation) need nothing beyond the rerun triggers.

use std::env;

/// Main build script entry point
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=Cargo.toml");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());

    if env::var_os("CARGO_FEATURE_BARE_METAL").is_some() {
        println!("cargo:warning=Building Zero FSBL for target: {target}");
        println!("cargo:warning=Building profile: {profile}");
    }
}
