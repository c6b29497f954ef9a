use std::io;
use std::io::Write;

use serde::Serialize;

/// Write each record as one JSON line; returns the number written
pub fn write_json_lines<W: Write, R: Serialize>(writer: &mut W, records: &[R]) -> io::Result<usize> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}
