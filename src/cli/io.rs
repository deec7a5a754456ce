//! JSON output for CLI commands
//!
//! Every command writes a single JSON object to stdout:
//! `{"status": "ok", "data": ...}`.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_response_to(&mut out, data)
}

/// Write a success response to any writer
pub fn write_response_to(out: &mut impl Write, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    serde_json::to_writer_pretty(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
