use std::fmt;

use crate::error::Error;
use crate::validate::Mode;

/// Workflow milestones, in the order a full run reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    Authenticated,
    ProfileVerified,
    Applied,
    Verified,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Validate,
    Authenticate,
    ReadProfile(String),
    ReadLoopback,
    Synthesize,
    WriteRoot,
    WriteService { profile: String, index: usize },
    ForceLoopback,
    ApplyLoopback,
    StartTest,
    StartLoopback,
    Verify,
    Export,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Validate => write!(f, "validate"),
            Step::Authenticate => write!(f, "authenticate"),
            Step::ReadProfile(p) => write!(f, "read {p}"),
            Step::ReadLoopback => write!(f, "read loopback"),
            Step::Synthesize => write!(f, "synthesize"),
            Step::WriteRoot => write!(f, "write root config"),
            Step::WriteService { profile, index } => write!(f, "write {profile} service {index}"),
            Step::ForceLoopback => write!(f, "force loopback"),
            Step::ApplyLoopback => write!(f, "apply loopback"),
            Step::StartTest => write!(f, "start test"),
            Step::StartLoopback => write!(f, "start loopback test"),
            Step::Verify => write!(f, "verify"),
            Step::Export => write!(f, "export"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub detail: String,
}

#[derive(Debug)]
pub struct Failure {
    pub step: Option<Step>,
    pub error: Error,
}

/// What a run did: completed steps in order, and the step that aborted it, if any.
///
/// Steps completed before a failure are not rolled back; the appliance keeps whatever the
/// last acknowledged write left behind.
#[derive(Debug)]
pub struct RunReport {
    pub mode: Option<Mode>,
    pub stage: Stage,
    pub completed: Vec<StepRecord>,
    pub failure: Option<Failure>,
    pending: Option<Step>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            mode: None,
            stage: Stage::Init,
            completed: Vec::new(),
            failure: None,
            pending: None,
        }
    }
}

impl RunReport {
    pub fn begin(&mut self, step: Step) {
        tracing::debug!(%step, "begin");
        self.pending = Some(step);
    }

    pub fn complete(&mut self, detail: impl Into<String>) {
        if let Some(step) = self.pending.take() {
            self.completed.push(StepRecord {
                step,
                detail: detail.into(),
            });
        }
    }

    pub fn reach(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn abort(&mut self, error: Error) {
        let step = self.pending.take();
        match &step {
            Some(s) => tracing::error!(step = %s, error = %error, "run aborted"),
            None => tracing::error!(error = %error, "run aborted"),
        }
        self.failure = Some(Failure { step, error });
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.stage == Stage::Done
    }

    #[cfg(test)]
    pub fn steps(&self) -> Vec<&Step> {
        self.completed.iter().map(|r| &r.step).collect()
    }

    pub fn exit_code(&self) -> u8 {
        if self.succeeded() { 0 } else { 1 }
    }

    pub fn log(&self) {
        for rec in &self.completed {
            tracing::info!(step = %rec.step, detail = %rec.detail, "ok");
        }
        match &self.failure {
            None => tracing::info!(mode = ?self.mode, stage = ?self.stage, "PASS"),
            Some(Failure { step, error }) => tracing::error!(
                mode = ?self.mode,
                stage = ?self.stage,
                step = %step.as_ref().map(ToString::to_string).unwrap_or_default(),
                %error,
                "FAIL"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_attributed_to_pending_step() {
        let mut r = RunReport::default();
        r.begin(Step::Authenticate);
        r.complete("ok");
        r.begin(Step::WriteRoot);
        r.abort(Error::ProfileNotFound("p".into()));
        assert_eq!(r.steps(), vec![&Step::Authenticate]);
        assert_eq!(r.failure.as_ref().unwrap().step, Some(Step::WriteRoot));
        assert_eq!(r.exit_code(), 1);
    }

    #[test]
    fn done_without_failure_passes() {
        let mut r = RunReport::default();
        r.reach(Stage::Done);
        assert!(r.succeeded());
        assert_eq!(r.exit_code(), 0);
    }

    #[test]
    fn step_display() {
        let s = Step::WriteService {
            profile: "profile1".into(),
            index: 3,
        };
        assert_eq!(s.to_string(), "write profile1 service 3");
    }
}
