use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Pdf,
}

impl ExportFormat {
    /// PDF is accepted on the command line but has no writer.
    pub fn writable(self) -> bool {
        !matches!(self, ExportFormat::Pdf)
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "JSON" => Ok(ExportFormat::Json),
            "CSV" => Ok(ExportFormat::Csv),
            "PDF" => Ok(ExportFormat::Pdf),
            _ => Err(Error::invalid("output", s, "expected JSON, CSV or PDF")),
        }
    }
}

pub fn render(format: ExportFormat, applied: &Value) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(applied)?),
        ExportFormat::Csv => {
            let mut rows = Vec::new();
            flatten("", applied, &mut rows);
            let mut out = String::from("parameter,value\n");
            for (k, v) in rows {
                out.push_str(&csv_field(&k));
                out.push(',');
                out.push_str(&csv_field(&v));
                out.push('\n');
            }
            Ok(out)
        }
        ExportFormat::Pdf => Err(Error::Export("PDF output is not supported".into())),
    }
}

pub fn write(path: &Path, format: ExportFormat, applied: &Value) -> Result<()> {
    let body = render(format, applied)?;
    fs::write(path, body).map_err(|e| Error::Export(format!("{}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), ?format, "applied parameters written");
    Ok(())
}

/// Dotted-path rows; array elements use their index as the path segment.
fn flatten(prefix: &str, v: &Value, rows: &mut Vec<(String, String)>) {
    let join = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{prefix}.{k}")
        }
    };
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                flatten(&join(k), child, rows);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), child, rows);
            }
        }
        Value::String(s) => rows.push((prefix.to_string(), s.clone())),
        other => rows.push((prefix.to_string(), other.to_string())),
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
