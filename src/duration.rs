use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::{Error, Result};

/// How a test duration is measured on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationType {
    Useconds,
    Packets,
    Bytes,
}

impl DurationType {
    pub fn as_str(self) -> &'static str {
        match self {
            DurationType::Useconds => "useconds",
            DurationType::Packets => "packets",
            DurationType::Bytes => "bytes",
        }
    }
}

impl FromStr for DurationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "useconds" | "us" => Ok(DurationType::Useconds),
            "packets" => Ok(DurationType::Packets),
            "bytes" => Ok(DurationType::Bytes),
            _ => Err(Error::invalid(
                "duration_type",
                s,
                "expected useconds, packets or bytes",
            )),
        }
    }
}

/// Convert `HH:MM:SS` to microseconds. `0` and `endless` both mean endless and map to `"0"`.
pub fn time_to_us(time: &str) -> Result<String> {
    let t = time.trim();
    if t == "0" || t.eq_ignore_ascii_case("endless") {
        return Ok("0".to_string());
    }
    let parts: Vec<&str> = t.split(':').collect();
    if parts.len() != 3 {
        return Err(Error::DurationFormat(time.to_string()));
    }
    let mut secs: u64 = 0;
    for (part, scale) in parts.iter().zip([3600u64, 60, 1]) {
        let n: u64 = part
            .parse()
            .map_err(|_| Error::DurationFormat(time.to_string()))?;
        secs = n
            .checked_mul(scale)
            .and_then(|v| v.checked_add(secs))
            .ok_or_else(|| Error::DurationFormat(time.to_string()))?;
    }
    secs.checked_mul(1_000_000)
        .map(|us| us.to_string())
        .ok_or_else(|| Error::DurationFormat(time.to_string()))
}

/// Encode a duration block with exactly one populated encoding; the other two are `"0"`.
///
/// `key` names the source parameter for error messages. A `useconds` value may be given
/// as a plain integer or in `HH:MM:SS` form.
pub fn encode(key: &str, kind: DurationType, value: &str) -> Result<Value> {
    let v = value.trim();
    let amount = match kind {
        DurationType::Useconds if v.contains(':') || v.eq_ignore_ascii_case("endless") => {
            time_to_us(v)?
        }
        _ => v
            .parse::<u64>()
            .map_err(|_| Error::invalid(key, value, "expected a non-negative integer"))?
            .to_string(),
    };
    let slot = |k: DurationType| {
        if k == kind {
            amount.clone()
        } else {
            "0".to_string()
        }
    };
    Ok(json!({
        "type": kind.as_str(),
        "useconds": slot(DurationType::Useconds),
        "packets": slot(DurationType::Packets),
        "bytes": slot(DurationType::Bytes),
    }))
}
