use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Args, Command, CommandFactory, FromArgMatches, Parser};

use crate::args::CliArgumentSet;
use crate::synth::{PROFILES, SERVICE_FIELDS};

/// Service indices that get their own `--profile{P}_service_{i}_*` flags.
pub const MAX_SERVICES: usize = 4;

const EXAMPLES: &str = "\
Examples:
  Y.1564 test:
    y1564-ctl --url http://192.0.2.1/ubus -u root -p secret --profile_id profile0 --output JSON \\
        -c true -e false -t false --duration_type useconds --duration 10000000

  Force start (minimal):
    y1564-ctl --url http://192.0.2.1/ubus -u root -p secret --profile_id profile0 --output JSON -f

  Loopback test:
    y1564-ctl --url http://192.0.2.1/ubus -u root -p secret --profile_id profile0 --output JSON \\
        -l --loopback true --loopback_iface0_name porta --loopback_iface0_mode reflect \\
        --loopback_iface0_host 192.0.2.10 --loopback_iface0_disabled false \\
        --loopback_iface1_name portb --loopback_iface1_mode reflect \\
        --loopback_iface1_host 192.0.2.11 --loopback_iface1_disabled true \\
        --loopback_duration 00:10:00 --loopback_type layer4

  Force loopback:
    y1564-ctl --url http://192.0.2.1/ubus -u root -p secret --profile_id profile0 --output JSON --loopback_force";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "y1564-ctl",
    rename_all = "snake_case",
    about = "Configure and launch Y.1564 / loopback tests on a remote appliance",
    after_long_help = EXAMPLES
)]
pub struct Cli {
    #[command(flatten)]
    pub auth: AuthOpts,
    #[command(flatten)]
    pub mode: ModeOpts,
    #[command(flatten)]
    pub y1564: Y1564Opts,
    #[command(flatten)]
    pub loopback: LoopbackOpts,
    /// Write the applied parameters to this file, in the --output format
    #[arg(long)]
    pub output_file: Option<PathBuf>,
    /// HTTP timeout per request, seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Authentication", rename_all = "snake_case")]
pub struct AuthOpts {
    /// JSON-RPC endpoint URL
    #[arg(long)]
    pub url: Option<String>,
    #[arg(short, long)]
    pub username: Option<String>,
    #[arg(short, long, env = "Y1564_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Test profile to configure, e.g. profile0
    #[arg(long)]
    pub profile_id: Option<String>,
    /// Output format: JSON, CSV or PDF
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Operation mode", rename_all = "snake_case")]
pub struct ModeOpts {
    /// Start the already configured test; only base parameters needed
    #[arg(short, long)]
    pub force_start: bool,
    /// Configure the loopback trial only
    #[arg(short, long)]
    pub loopback_only: bool,
    /// Force enable loopback for the profile
    #[arg(long)]
    pub loopback_force: bool,
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Y.1564 test", rename_all = "snake_case")]
pub struct Y1564Opts {
    /// Enable CIR (true/false)
    #[arg(short = 'c', long, visible_alias = "cir")]
    pub cir_enabled: Option<String>,
    /// Enable EIR (true/false)
    #[arg(short = 'e', long, visible_alias = "eir")]
    pub eir_enabled: Option<String>,
    /// Enable TP (true/false)
    #[arg(short = 't', long, visible_alias = "tp")]
    pub tp_enabled: Option<String>,
    /// useconds, packets or bytes
    #[arg(long)]
    pub duration_type: Option<String>,
    /// Duration value; useconds also accept HH:MM:SS
    #[arg(long)]
    pub duration: Option<String>,
    /// Profile status (true/false), default true
    #[arg(long)]
    pub status: Option<String>,
    /// Start the test after applying the configuration
    #[arg(long)]
    pub start: bool,
    /// Enable the performance test
    #[arg(long)]
    pub perf: bool,
    #[arg(long)]
    pub perf_duration_type: Option<String>,
    #[arg(long)]
    pub perf_duration: Option<String>,
    /// Number of services to configure in profile0
    #[arg(long)]
    pub profile0_service_count: Option<String>,
    /// Number of services to configure in profile1
    #[arg(long)]
    pub profile1_service_count: Option<String>,
    /// Extra profile parameter, dotted path: --param y1564.cir_enabled=true
    #[arg(long = "param", value_name = "KEY=VALUE", num_args = 1.., value_parser = parse_override)]
    pub params: Vec<(String, String)>,
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Loopback", rename_all = "snake_case")]
pub struct LoopbackOpts {
    /// Enable/disable the loopback trial (true/false)
    #[arg(long)]
    pub loopback: Option<String>,
    #[arg(long)]
    pub loopback_iface0_name: Option<String>,
    #[arg(long)]
    pub loopback_iface0_mode: Option<String>,
    #[arg(long)]
    pub loopback_iface0_host: Option<String>,
    #[arg(long)]
    pub loopback_iface0_disabled: Option<String>,
    #[arg(long)]
    pub loopback_iface1_name: Option<String>,
    #[arg(long)]
    pub loopback_iface1_mode: Option<String>,
    #[arg(long)]
    pub loopback_iface1_host: Option<String>,
    #[arg(long)]
    pub loopback_iface1_disabled: Option<String>,
    /// HH:MM:SS, or 0/endless
    #[arg(long)]
    pub loopback_duration: Option<String>,
    /// layer2, layer3 or layer4
    #[arg(long)]
    pub loopback_type: Option<String>,
    #[arg(long)]
    pub loopback_wait_time_ms: Option<String>,
    #[arg(long)]
    pub loopback_learn_time_ms: Option<String>,
}

/// Parsed command line: the derive part plus the generated per-service flags.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub cli: Cli,
    pub services: Vec<(String, String)>,
}

fn service_ids() -> impl Iterator<Item = String> {
    PROFILES.into_iter().flat_map(|p| {
        (0..MAX_SERVICES)
            .flat_map(move |i| SERVICE_FIELDS.iter().map(move |f| format!("{p}_service_{i}_{f}")))
    })
}

fn service_args() -> Vec<Arg> {
    service_ids()
        .map(|id| {
            Arg::new(id.clone())
                .long(id)
                .value_name("VALUE")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(String))
                .help_heading("Per-service (profile{0,1}_service_{0..3}_*)")
                .hide_short_help(true)
        })
        .collect()
}

pub fn command() -> Command {
    Cli::command().args(service_args())
}

impl Invocation {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let cli = Cli::from_arg_matches(matches)?;
        let services = service_ids()
            .filter_map(|id| {
                matches
                    .get_one::<String>(&id)
                    .map(|v| (id.clone(), v.clone()))
            })
            .collect();
        Ok(Self { cli, services })
    }

    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches()).unwrap_or_else(|e| e.exit())
    }

    /// Flatten into the key/value set the workflow consumes.
    pub fn argument_set(&self) -> CliArgumentSet {
        let Cli {
            auth,
            mode,
            y1564,
            loopback,
            ..
        } = &self.cli;
        let mut set = CliArgumentSet::new();
        let pairs = [
            ("url", &auth.url),
            ("username", &auth.username),
            ("password", &auth.password),
            ("profile_id", &auth.profile_id),
            ("output", &auth.output),
            ("cir_enabled", &y1564.cir_enabled),
            ("eir_enabled", &y1564.eir_enabled),
            ("tp_enabled", &y1564.tp_enabled),
            ("duration_type", &y1564.duration_type),
            ("duration", &y1564.duration),
            ("status", &y1564.status),
            ("perf_duration_type", &y1564.perf_duration_type),
            ("perf_duration", &y1564.perf_duration),
            ("profile0_service_count", &y1564.profile0_service_count),
            ("profile1_service_count", &y1564.profile1_service_count),
            ("loopback", &loopback.loopback),
            ("loopback_iface0_name", &loopback.loopback_iface0_name),
            ("loopback_iface0_mode", &loopback.loopback_iface0_mode),
            ("loopback_iface0_host", &loopback.loopback_iface0_host),
            ("loopback_iface0_disabled", &loopback.loopback_iface0_disabled),
            ("loopback_iface1_name", &loopback.loopback_iface1_name),
            ("loopback_iface1_mode", &loopback.loopback_iface1_mode),
            ("loopback_iface1_host", &loopback.loopback_iface1_host),
            ("loopback_iface1_disabled", &loopback.loopback_iface1_disabled),
            ("loopback_duration", &loopback.loopback_duration),
            ("loopback_type", &loopback.loopback_type),
            ("loopback_wait_time_ms", &loopback.loopback_wait_time_ms),
            ("loopback_learn_time_ms", &loopback.loopback_learn_time_ms),
        ];
        for (key, value) in pairs {
            if let Some(v) = value {
                set.set(key, v.as_str());
            }
        }
        for (key, value) in &self.services {
            set.set(key.as_str(), value.as_str());
        }
        for (key, value) in &y1564.params {
            set.add_override(key.as_str(), value.as_str());
        }
        set.force_start = mode.force_start;
        set.loopback_only = mode.loopback_only;
        set.loopback_force = mode.loopback_force;
        set.start = y1564.start;
        set.perf = y1564.perf;
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(argv: &[&str]) -> Invocation {
        let m = command()
            .try_get_matches_from(std::iter::once("y1564-ctl").chain(argv.iter().copied()))
            .unwrap();
        Invocation::from_matches(&m).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn flags_flatten_into_argument_set() {
        let inv = invoke(&[
            "--url",
            "http://192.0.2.1/ubus",
            "-u",
            "root",
            "-p",
            "secret",
            "--profile_id",
            "profile0",
            "--output",
            "JSON",
            "-c",
            "true",
            "--eir",
            "false",
            "-t",
            "false",
            "--duration_type",
            "useconds",
            "--duration",
            "10000000",
            "--start",
        ]);
        let set = inv.argument_set();
        assert_eq!(set.get("username"), Some("root"));
        assert_eq!(set.get("cir_enabled"), Some("true"));
        assert_eq!(set.get("eir_enabled"), Some("false"));
        assert!(set.start);
        assert!(!set.force_start);
        assert!(!set.has("loopback"));
    }

    #[test]
    fn service_flags_collected() {
        let inv = invoke(&[
            "--profile1_service_count",
            "1",
            "--profile1_service_0_src_mac",
            "00:11:22:33:44:55",
            "--profile1_service_3_layer",
            "3",
        ]);
        let set = inv.argument_set();
        assert_eq!(set.get("profile1_service_count"), Some("1"));
        assert_eq!(set.get("profile1_service_0_src_mac"), Some("00:11:22:33:44:55"));
        assert_eq!(set.get("profile1_service_3_layer"), Some("3"));
    }

    #[test]
    fn param_overrides_collected_in_order() {
        let inv = invoke(&[
            "--param",
            "y1564.cir_enabled=true",
            "note=a=b",
            "--param",
            "y1564.cir_enabled=false",
        ]);
        let set = inv.argument_set();
        assert_eq!(
            set.overrides().collect::<Vec<_>>(),
            vec![
                ("y1564.cir_enabled", "true"),
                ("note", "a=b"),
                ("y1564.cir_enabled", "false"),
            ]
        );
        assert!(command().try_get_matches_from(["y1564-ctl", "--param", "novalue"]).is_err());
    }

    #[test]
    fn mode_flags_parse() {
        let inv = invoke(&["-f", "-l", "--loopback_force"]);
        let set = inv.argument_set();
        assert!(set.force_start && set.loopback_only && set.loopback_force);
    }

    #[test]
    fn unknown_service_index_rejected() {
        let res = command().try_get_matches_from([
            "y1564-ctl",
            "--profile0_service_9_src_mac",
            "00:11:22:33:44:55",
        ]);
        assert!(res.is_err());
    }
}
