use core::fmt;
use log::Record;

/// Write `record` as a single `[LEVEL] target: message` line.
///
/// # Errors
/// Propagates errors from `out`.
pub fn write_record(out: &mut impl fmt::Write, record: &Record) -> fmt::Result {
    writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
}
