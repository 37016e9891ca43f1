use crate::args::CliArgumentSet;
use crate::error::{Error, Result};

pub const BASE_PARAMS: &[&str] = &["url", "username", "password", "profile_id", "output"];

pub const Y1564_PARAMS: &[&str] = &[
    "cir_enabled",
    "eir_enabled",
    "tp_enabled",
    "duration_type",
    "duration",
];

pub const LOOPBACK_PARAMS: &[&str] = &[
    "loopback",
    "loopback_iface0_name",
    "loopback_iface0_mode",
    "loopback_iface0_host",
    "loopback_iface0_disabled",
    "loopback_iface1_name",
    "loopback_iface1_mode",
    "loopback_iface1_host",
    "loopback_iface1_disabled",
    "loopback_duration",
    "loopback_type",
];

/// Operating mode selected by the mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Full,
    ForceStart,
    LoopbackForce,
    LoopbackOnly,
}

impl Mode {
    /// Resolve the mode from the flags; more than one flag is rejected.
    pub fn from_args(args: &CliArgumentSet) -> Result<Self> {
        let set: Vec<(&'static str, Mode)> = [
            (args.force_start, "force_start", Mode::ForceStart),
            (args.loopback_only, "loopback_only", Mode::LoopbackOnly),
            (args.loopback_force, "loopback_force", Mode::LoopbackForce),
        ]
        .into_iter()
        .filter(|(on, _, _)| *on)
        .map(|(_, name, mode)| (name, mode))
        .collect();

        match set.as_slice() {
            [] => Ok(Mode::Full),
            [(_, mode)] => Ok(*mode),
            _ => Err(Error::ConflictingModes(
                set.iter().map(|(name, _)| *name).collect(),
            )),
        }
    }

    /// Mode-specific parameters on top of [`BASE_PARAMS`].
    pub fn extra_params(self) -> &'static [&'static str] {
        match self {
            Mode::Full => Y1564_PARAMS,
            Mode::ForceStart | Mode::LoopbackForce => &[],
            Mode::LoopbackOnly => LOOPBACK_PARAMS,
        }
    }

    pub fn required_params(self) -> Vec<&'static str> {
        BASE_PARAMS
            .iter()
            .chain(self.extra_params())
            .copied()
            .collect()
    }
}

/// Gate run before any network access: resolves the mode and checks every parameter
/// it requires is present.
pub fn validate(args: &CliArgumentSet) -> Result<Mode> {
    let mode = Mode::from_args(args)?;
    let missing: Vec<String> = mode
        .required_params()
        .into_iter()
        .filter(|k| !args.has(k))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingRequiredParameter(missing));
    }
    tracing::debug!(?mode, "parameters validated");
    Ok(mode)
}
