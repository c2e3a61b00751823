// Reporting and output for partfuzz
// Exports generated requests as JSON Lines or a CSV summary

use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::error::FuzzError;
use crate::sink::GeneratedRequest;

/// Escape CSV field to prevent formula injection attacks
/// Cells starting with =, +, -, @, or tab are prefixed with single quote
fn escape_csv_field(field: &str) -> String {
    let Some(first_char) = field.chars().next() else {
        return String::new();
    };

    let needs_escaping = matches!(first_char, '=' | '+' | '-' | '@' | '\t');

    if needs_escaping {
        // Prefix with single quote to prevent formula injection
        format!("\"'{}\"", field.replace('"', "\"\""))
    } else if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write one generated request per line, serialized as JSON
pub fn write_jsonl<W: Write>(writer: &mut W, requests: &[GeneratedRequest]) -> Result<(), FuzzError> {
    for request in requests {
        serde_json::to_writer(&mut *writer, request)?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Write a `Method,URL,Part,Key,Value` summary of generated requests
pub fn write_csv<W: Write>(writer: &mut W, requests: &[GeneratedRequest]) -> Result<(), FuzzError> {
    writeln!(writer, "Method,URL,Part,Key,Value")?;
    for generated in requests {
        writeln!(
            writer,
            "{},{},{},{},{}",
            generated.request.method,
            escape_csv_field(&generated.request.url),
            generated.component,
            escape_csv_field(generated.key.as_deref().unwrap_or("")),
            escape_csv_field(generated.value.as_deref().unwrap_or(""))
        )?;
    }
    Ok(())
}

pub fn export_jsonl(requests: &[GeneratedRequest]) -> Result<String, FuzzError> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("partfuzz_requests_{}.jsonl", timestamp);
    let mut file = BufWriter::new(File::create(&filename)?);
    write_jsonl(&mut file, requests)?;
    file.flush()?;

    Ok(filename)
}

pub fn export_csv(requests: &[GeneratedRequest]) -> Result<String, FuzzError> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("partfuzz_requests_{}.csv", timestamp);
    let mut file = BufWriter::new(File::create(&filename)?);
    write_csv(&mut file, requests)?;
    file.flush()?;

    Ok(filename)
}
