use serde_json::{Value, json};

use crate::api::{Ack, Appliance, LOOPBACK, profile_ids};
use crate::error::Result;

/// Loopback layout the appliance is parked in before any loopback change.
pub fn canonical(status: bool) -> Value {
    json!({
        "status": status,
        "trial": {
            "ifaces": {
                "0": {"name": "porta", "disabled": false},
                "1": {"name": "portb", "disabled": true}
            },
            "wait_time_ms": 1000,
            "learn_time_ms": 1000
        },
        "loopback": {
            "duration_us": "0",
            "type": "layer4"
        }
    })
}

/// Loopback operations. Every state change first writes [`canonical`]`(false)` and only
/// continues when that write is acknowledged.
pub struct LoopbackController<'s, 'c> {
    api: &'s mut Appliance<'c>,
}

impl<'s, 'c> LoopbackController<'s, 'c> {
    pub fn new(api: &'s mut Appliance<'c>) -> Self {
        Self { api }
    }

    pub fn get_config(&mut self, profile: &str) -> Result<Value> {
        self.api.get_params(LOOPBACK, profile)
    }

    fn disable(&mut self, profile: &str) -> Result<Ack> {
        tracing::info!(profile, "disabling loopback");
        self.api
            .set_params(LOOPBACK, profile_ids(profile), &canonical(false))
            .inspect_err(|e| tracing::error!(profile, error = %e, "failed to disable loopback"))
    }

    pub fn force_enable(&mut self, profile: &str) -> Result<Ack> {
        tracing::info!(profile, "force enabling loopback");
        self.disable(profile)?;
        self.api
            .set_params(LOOPBACK, profile_ids(profile), &canonical(true))
    }

    pub fn set_config(&mut self, profile: &str, desired: &Value) -> Result<Ack> {
        self.disable(profile)?;
        tracing::info!(profile, "applying loopback configuration");
        self.api.set_params(LOOPBACK, profile_ids(profile), desired)
    }

    pub fn start(&mut self, profile: &str) -> Result<Ack> {
        self.api.start(LOOPBACK, profile)
    }
}
