use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::args::CliArgumentSet;
use crate::duration::{self, DurationType};
use crate::error::{Error, Result};

pub const PROFILES: [&str; 2] = ["profile0", "profile1"];

/// Per-service flag suffixes, read as `profile{P}_service_{i}_<field>`.
pub const SERVICE_FIELDS: &[&str] = &[
    "frame_size",
    "src_mac",
    "src_ip",
    "src_udp_port",
    "dst_mac",
    "dst_ip",
    "dst_udp_port",
    "vlan_count",
    "vlan_tags",
    "mpls_count",
    "mpls_labels",
    "qos_type",
    "dscp",
    "ecn",
    "tos",
    "precedence",
    "loss_percents",
    "frame_delay_ms",
    "delay_variation_ms",
    "mfactor_mbps",
    "unordered_percents",
    "cir_rate_value",
    "cir_rate_units",
    "cir_rate_layer",
    "eir_rate_value",
    "eir_rate_units",
    "eir_rate_layer",
    "tp_rate_value",
    "tp_rate_units",
    "tp_rate_layer",
    "layer",
];

const MANDATORY_SERVICE_FIELDS: [&str; 4] = ["src_mac", "dst_mac", "src_ip", "dst_ip"];

const LOOPBACK_TYPES: [&str; 3] = ["layer2", "layer3", "layer4"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    pub frame_size: u32,
    pub header: Header,
    pub sac: Sac,
    pub bandwidth: Bandwidth,
    pub layer: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub src_mac: String,
    pub dst_mac: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_udp_port: u16,
    pub dst_udp_port: u16,
    pub vlan: Vlan,
    pub mpls: Mpls,
    pub qos: Qos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vlan {
    pub count: usize,
    pub tags: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mpls {
    pub count: usize,
    pub labels: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Qos {
    #[serde(rename = "type")]
    pub kind: String,
    pub dscp: u8,
    pub ecn: u8,
    pub tos: u8,
    pub precedence: u8,
}

/// Service acceptance criteria.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sac {
    pub loss_percents: String,
    pub frame_delay_ms: String,
    pub delay_variation_ms: String,
    pub mfactor_mbps: String,
    pub unordered_percents: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bandwidth {
    pub cir_rate: Rate,
    pub eir_rate: Rate,
    pub tp_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rate {
    pub value: String,
    pub units: String,
    pub layer: u8,
}

/// What the appliance currently holds for the profile.
#[derive(Debug, Clone, Default)]
pub struct Current {
    pub parameters: Value,
    pub loopback: Option<Value>,
}

/// Synthesized configuration, ready to be written as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesiredConfig {
    pub parameters: Value,
    pub services: BTreeMap<String, Vec<ServiceConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loopback: Option<Value>,
}

pub fn synthesize(current: &Current, args: &CliArgumentSet) -> Result<DesiredConfig> {
    let mut params = current.parameters.clone();

    set_path(
        &mut params,
        &["status"],
        Value::Bool(args.get_bool("status")?.unwrap_or(true)),
    );
    for (key, path) in [
        ("cir_enabled", ["y1564", "cir_enabled"]),
        ("eir_enabled", ["y1564", "eir_enabled"]),
        ("tp_enabled", ["y1564", "tp_enabled"]),
    ] {
        if let Some(on) = args.get_bool(key)? {
            set_path(&mut params, &path, Value::Bool(on));
        }
    }
    if let Some(block) = duration_block(args, "duration_type", "duration")? {
        set_path(&mut params, &["y1564", "duration"], block);
    }

    if args.perf {
        let block = duration_block(args, "perf_duration_type", "perf_duration")?.ok_or_else(
            || {
                Error::MissingRequiredParameter(vec![
                    "perf_duration_type".into(),
                    "perf_duration".into(),
                ])
            },
        )?;
        set_path(&mut params, &["perf", "enabled"], Value::Bool(true));
        set_path(&mut params, &["perf", "duration"], block);
    } else {
        set_path(&mut params, &["perf", "enabled"], Value::Bool(false));
    }
    for (key, raw) in args.overrides() {
        apply_override(&mut params, key, raw)?;
    }

    let mut services = BTreeMap::new();
    for profile in PROFILES {
        if let Some(count) = args.get_parsed::<usize>(&format!("{profile}_service_count"))?
            && count > 0
        {
            let list = (0..count)
                .map(|i| build_service(args, profile, i))
                .collect::<Result<Vec<_>>>()?;
            services.insert(profile.to_string(), list);
        }
    }

    let loopback = if has_loopback_args(args) {
        let base = current.loopback.clone().unwrap_or_else(|| json!({}));
        Some(synthesize_loopback(&base, args)?)
    } else {
        None
    };

    Ok(DesiredConfig {
        parameters: params,
        services,
        loopback,
    })
}

pub fn has_loopback_args(args: &CliArgumentSet) -> bool {
    args.has_prefix("loopback")
}

/// Overlay the loopback arguments onto the current loopback configuration.
pub fn synthesize_loopback(current: &Value, args: &CliArgumentSet) -> Result<Value> {
    let mut lb = current.clone();
    if let Some(on) = args.get_bool("loopback")? {
        set_path(&mut lb, &["status"], Value::Bool(on));
    }
    for iface in ["0", "1"] {
        for field in ["name", "mode", "host"] {
            if let Some(v) = args.get(&format!("loopback_iface{iface}_{field}")) {
                set_path(&mut lb, &["trial", "ifaces", iface, field], json!(v));
            }
        }
        if let Some(off) = args.get_bool(&format!("loopback_iface{iface}_disabled"))? {
            set_path(&mut lb, &["trial", "ifaces", iface, "disabled"], Value::Bool(off));
        }
    }
    for field in ["wait_time_ms", "learn_time_ms"] {
        if let Some(ms) = args.get_parsed::<u64>(&format!("loopback_{field}"))? {
            set_path(&mut lb, &["trial", field], json!(ms));
        }
    }
    if let Some(d) = args.get("loopback_duration") {
        set_path(
            &mut lb,
            &["loopback", "duration_us"],
            json!(duration::time_to_us(d)?),
        );
    }
    if let Some(kind) = args.get("loopback_type") {
        if !LOOPBACK_TYPES.contains(&kind) {
            return Err(Error::invalid(
                "loopback_type",
                kind,
                "expected layer2, layer3 or layer4",
            ));
        }
        set_path(&mut lb, &["loopback", "type"], json!(kind));
    }
    Ok(lb)
}

fn duration_block(args: &CliArgumentSet, type_key: &str, value_key: &str) -> Result<Option<Value>> {
    match (args.get(type_key), args.get(value_key)) {
        (None, None) => Ok(None),
        (Some(kind), Some(value)) => {
            let kind: DurationType = kind.parse()?;
            duration::encode(value_key, kind, value).map(Some)
        }
        (None, Some(_)) => Err(Error::MissingRequiredParameter(vec![type_key.into()])),
        (Some(_), None) => Err(Error::MissingRequiredParameter(vec![value_key.into()])),
    }
}

/// Reads `profile{P}_service_{i}_*` for one service index.
struct ServiceArgs<'a> {
    args: &'a CliArgumentSet,
    profile: &'a str,
    index: usize,
}

impl ServiceArgs<'_> {
    fn key(&self, field: &str) -> String {
        format!("{}_service_{}_{}", self.profile, self.index, field)
    }

    fn mandatory(&self, field: &str) -> Result<String> {
        self.args
            .get(&self.key(field))
            .map(str::to_string)
            .ok_or_else(|| Error::MissingField {
                profile: self.profile.to_string(),
                index: self.index,
                field: field.to_string(),
            })
    }

    fn text(&self, field: &str, default: &str) -> String {
        self.args
            .get(&self.key(field))
            .unwrap_or(default)
            .to_ascii_lowercase()
    }

    fn number<T: std::str::FromStr>(&self, field: &str, default: T) -> Result<T> {
        Ok(self.args.get_parsed(&self.key(field))?.unwrap_or(default))
    }

    /// Decimal fields go on the wire with five fractional digits.
    fn decimal(&self, field: &str, default: &str) -> Result<String> {
        let key = self.key(field);
        match self.args.get(&key) {
            None => Ok(default.to_string()),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Ok(format!("{v:.5}")),
                _ => Err(Error::invalid(&key, raw, "expected a non-negative decimal")),
            },
        }
    }

    fn list<T: std::str::FromStr>(&self, field: &str) -> Result<Vec<T>> {
        let key = self.key(field);
        let Some(raw) = self.args.get(&key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<T>()
                    .map_err(|_| Error::invalid(&key, raw, "expected comma-separated integers"))
            })
            .collect()
    }

    /// Count defaults to the list length; an explicit count must agree with it.
    fn counted<T: std::str::FromStr>(&self, count: &str, list: &str) -> Result<(usize, Vec<T>)> {
        let items = self.list::<T>(list)?;
        match self.args.get_parsed::<usize>(&self.key(count))? {
            Some(n) if n != items.len() => Err(Error::invalid(
                &self.key(count),
                &n.to_string(),
                "does not match the number of list entries",
            )),
            _ => Ok((items.len(), items)),
        }
    }

    fn rate(&self, prefix: &str, default_value: &str) -> Result<Rate> {
        Ok(Rate {
            value: self.decimal(&format!("{prefix}_value"), default_value)?,
            units: self.text(&format!("{prefix}_units"), "mbps"),
            layer: self.number(&format!("{prefix}_layer"), 2)?,
        })
    }
}

fn build_service(args: &CliArgumentSet, profile: &str, index: usize) -> Result<ServiceConfig> {
    let s = ServiceArgs {
        args,
        profile,
        index,
    };
    for field in MANDATORY_SERVICE_FIELDS {
        s.mandatory(field)?;
    }
    let (vlan_count, tags) = s.counted("vlan_count", "vlan_tags")?;
    let (mpls_count, labels) = s.counted("mpls_count", "mpls_labels")?;

    Ok(ServiceConfig {
        frame_size: s.number("frame_size", 64)?,
        header: Header {
            src_mac: s.mandatory("src_mac")?,
            dst_mac: s.mandatory("dst_mac")?,
            src_ip: s.mandatory("src_ip")?,
            dst_ip: s.mandatory("dst_ip")?,
            src_udp_port: s.number("src_udp_port", 0)?,
            dst_udp_port: s.number("dst_udp_port", 0)?,
            vlan: Vlan {
                count: vlan_count,
                tags,
            },
            mpls: Mpls {
                count: mpls_count,
                labels,
            },
            qos: Qos {
                kind: s.text("qos_type", "diffserv"),
                dscp: s.number("dscp", 0)?,
                ecn: s.number("ecn", 0)?,
                tos: s.number("tos", 0)?,
                precedence: s.number("precedence", 0)?,
            },
        },
        sac: Sac {
            loss_percents: s.decimal("loss_percents", "0.10000")?,
            frame_delay_ms: s.decimal("frame_delay_ms", "1.00000")?,
            delay_variation_ms: s.decimal("delay_variation_ms", "1.00000")?,
            mfactor_mbps: s.decimal("mfactor_mbps", "0.10000")?,
            unordered_percents: s.decimal("unordered_percents", "0.44000")?,
        },
        bandwidth: Bandwidth {
            cir_rate: s.rate("cir_rate", "10.00000")?,
            eir_rate: s.rate("eir_rate", "1.00000")?,
            tp_rate: s.rate("tp_rate", "11.00000")?,
        },
        layer: s.number("layer", 2)?,
    })
}

/// `--param a.b.c=value`: booleans and numbers keep their JSON type, anything else is a string.
fn apply_override(params: &mut Value, key: &str, raw: &str) -> Result<()> {
    let path: Vec<&str> = key.split('.').collect();
    if path.iter().any(|seg| seg.trim().is_empty()) {
        return Err(Error::invalid("param", key, "expected dotted key=value"));
    }
    let value = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => json!(raw),
    };
    set_path(params, &path, value);
    Ok(())
}

fn set_path(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = root;
    for key in parents {
        node = object_mut(node)
            .entry(*key)
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(node).insert(last.to_string(), value);
}

fn object_mut(v: &mut Value) -> &mut Map<String, Value> {
    if !v.is_object() {
        *v = Value::Object(Map::new());
    }
    match v {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
