use guaboot_info::memory;
use std::{env, path::PathBuf};

fn main() {
    // Point to the linker script
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("stage2.ld");

    // Sanity checks (fail fast during build)
    let load = memory::STAGE2_LOAD_ADDR.as_u64();
    let stub = memory::TRANSITION_STUB_ADDR.as_u64();
    assert_eq!(load & 0xfff, 0, "STAGE2_LOAD_ADDR must be 4 KiB aligned (got {load:#x})");
    assert_eq!(stub & 0xfff, 0, "TRANSITION_STUB_ADDR must be 4 KiB aligned (got {stub:#x})");
    assert!(
        stub < load,
        "the transition stub must sit below stage 2 ({stub:#x} >= {load:#x})"
    );

    // Rebuild when inputs change
    println!("cargo:rerun-if-changed={}", ld.display());

    // Linker script
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());

    // Provide symbols to the linker script
    println!("cargo:rustc-link-arg-bins=--defsym=STAGE2_LOAD_ADDR={load:#x}");
    println!("cargo:rustc-link-arg-bins=--defsym=TRANSITION_STUB_ADDR={stub:#x}");
}
