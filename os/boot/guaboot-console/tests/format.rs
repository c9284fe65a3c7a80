use guaboot_console::write_record;
use log::{Level, Record};

#[test]
fn record_is_one_prefixed_line() {
    let mut out = String::new();
    let record = Record::builder()
        .level(Level::Warn)
        .target("guaboot_core::memory_map")
        .args(format_args!("no firmware memory map, using fallback"))
        .build();

    write_record(&mut out, &record).unwrap();

    assert_eq!(
        out,
        "[WARN] guaboot_core::memory_map: no firmware memory map, using fallback\n"
    );
}
