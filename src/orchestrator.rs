use std::path::PathBuf;

use serde_json::{Value, json};

use crate::api::{Appliance, Y1564, profile_ids, service_ids};
use crate::args::CliArgumentSet;
use crate::error::{Error, Result};
use crate::export::{self, ExportFormat};
use crate::loopback::LoopbackController;
use crate::report::{RunReport, Stage, Step};
use crate::rpc::RemoteClient;
use crate::synth::{self, Current, DesiredConfig};
use crate::validate::{self, Mode};

/// Root toggles compared against the read-back after a full apply.
const VERIFIED_FIELDS: [&str; 5] = [
    "/status",
    "/y1564/cir_enabled",
    "/y1564/eir_enabled",
    "/y1564/tp_enabled",
    "/perf/enabled",
];

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub output_file: Option<PathBuf>,
}

/// Run the whole workflow. Never panics on appliance errors; the outcome is in the report.
pub fn run(client: &mut dyn RemoteClient, args: &CliArgumentSet, opts: &RunOptions) -> RunReport {
    let mut report = RunReport::default();
    if let Err(error) = execute(client, args, opts, &mut report) {
        report.abort(error);
    }
    report.log();
    report
}

fn execute(
    client: &mut dyn RemoteClient,
    args: &CliArgumentSet,
    opts: &RunOptions,
    report: &mut RunReport,
) -> Result<()> {
    report.begin(Step::Validate);
    let mode = validate::validate(args)?;
    let format: ExportFormat = args.get("output").unwrap_or_default().parse()?;
    let export_to = match &opts.output_file {
        Some(path) if format.writable() => Some(path.clone()),
        Some(path) => {
            tracing::warn!(path = %path.display(), ?format, "no writer for this format, export skipped");
            None
        }
        None => None,
    };
    report.mode = Some(mode);
    report.complete(format!("{mode:?}"));

    // Presence was checked by the validator.
    let profile = args.get("profile_id").unwrap_or_default();
    let username = args.get("username").unwrap_or_default();
    let password = args.get("password").unwrap_or_default();

    report.begin(Step::Authenticate);
    let mut api = Appliance::login(client, username, password)?;
    report.reach(Stage::Authenticated);
    report.complete("session established");

    report.begin(Step::ReadProfile(profile.to_string()));
    let current = api.get_params(Y1564, profile)?;
    report.reach(Stage::ProfileVerified);
    report.complete("profile exists");

    let applied = match mode {
        Mode::ForceStart => {
            force_start(&mut api, profile, report)?;
            None
        }
        Mode::LoopbackForce => {
            report.begin(Step::ForceLoopback);
            let ack = LoopbackController::new(&mut api).force_enable(profile)?;
            report.reach(Stage::Applied);
            report.complete(ack.message);
            None
        }
        Mode::LoopbackOnly => Some(loopback_only(&mut api, profile, args, report)?),
        Mode::Full => Some(full(&mut api, profile, current, args, report)?),
    };

    if let (Some(applied), Some(path)) = (applied, export_to) {
        report.begin(Step::Export);
        export::write(&path, format, &applied)?;
        report.complete(path.display().to_string());
    }

    report.reach(Stage::Done);
    Ok(())
}

fn force_start(api: &mut Appliance<'_>, profile: &str, report: &mut RunReport) -> Result<()> {
    report.begin(Step::StartTest);
    let ack = api.start(Y1564, profile)?;
    report.complete(ack.message);

    report.begin(Step::StartLoopback);
    let ack = LoopbackController::new(api).start(profile)?;
    report.complete(ack.message);
    Ok(())
}

fn loopback_only(
    api: &mut Appliance<'_>,
    profile: &str,
    args: &CliArgumentSet,
    report: &mut RunReport,
) -> Result<Value> {
    let mut lb = LoopbackController::new(api);

    report.begin(Step::ReadLoopback);
    let current = lb.get_config(profile)?;
    report.complete("loopback configuration read");

    report.begin(Step::Synthesize);
    let desired = synth::synthesize_loopback(&current, args)?;
    report.complete("loopback block built");

    report.begin(Step::ApplyLoopback);
    let ack = lb.set_config(profile, &desired)?;
    report.reach(Stage::Applied);
    report.complete(ack.message);

    if args.start {
        report.begin(Step::StartLoopback);
        let ack = lb.start(profile)?;
        report.complete(ack.message);
    }
    Ok(json!({ "loopback": desired }))
}

fn full(
    api: &mut Appliance<'_>,
    profile: &str,
    current: Value,
    args: &CliArgumentSet,
    report: &mut RunReport,
) -> Result<Value> {
    let loopback = if synth::has_loopback_args(args) {
        report.begin(Step::ReadLoopback);
        let lb = LoopbackController::new(api).get_config(profile)?;
        report.complete("loopback configuration read");
        Some(lb)
    } else {
        None
    };

    report.begin(Step::Synthesize);
    let desired = synth::synthesize(
        &Current {
            parameters: current,
            loopback,
        },
        args,
    )?;
    report.complete(format!(
        "{} service(s)",
        desired.services.values().map(Vec::len).sum::<usize>()
    ));

    // Service writes may target the other profile; it must be read before anything is written.
    for other in desired.services.keys().filter(|p| p.as_str() != profile) {
        report.begin(Step::ReadProfile(other.clone()));
        api.get_params(Y1564, other)?;
        report.complete("profile exists");
    }

    report.begin(Step::WriteRoot);
    let ack = api.set_params(Y1564, profile_ids(profile), &desired.parameters)?;
    report.reach(Stage::Applied);
    report.complete(ack.message);

    for (svc_profile, services) in &desired.services {
        for (index, svc) in services.iter().enumerate() {
            report.begin(Step::WriteService {
                profile: svc_profile.clone(),
                index,
            });
            let ack = api.set_params(
                Y1564,
                service_ids(svc_profile, index),
                &serde_json::to_value(svc)?,
            )?;
            report.complete(ack.message);
        }
    }

    if let Some(lb) = &desired.loopback {
        report.begin(Step::ApplyLoopback);
        let ack = LoopbackController::new(api).set_config(profile, lb)?;
        report.complete(ack.message);
    } else {
        tracing::info!("no loopback parameters given, loopback left unchanged");
    }

    if args.start {
        report.begin(Step::StartTest);
        let ack = api.start(Y1564, profile)?;
        report.complete(ack.message);
    }

    report.begin(Step::Verify);
    let readback = api.get_params(Y1564, profile)?;
    verify(&desired, &readback)?;
    report.reach(Stage::Verified);
    report.complete("read-back matches");

    Ok(serde_json::to_value(&desired)?)
}

fn verify(desired: &DesiredConfig, readback: &Value) -> Result<()> {
    for field in VERIFIED_FIELDS {
        let Some(expected) = desired.parameters.pointer(field) else {
            continue;
        };
        let actual = readback.pointer(field).unwrap_or(&Value::Null);
        if actual != expected {
            return Err(Error::VerificationMismatch {
                field: field.trim_start_matches('/').replace('/', "."),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}
