use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::rpc::{RemoteClient, Session};

pub const Y1564: &str = "y1564";
pub const LOOPBACK: &str = "loopback";

/// Successful write/start acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

pub fn profile_ids(profile: &str) -> Value {
    json!({ "profile": profile })
}

pub fn service_ids(profile: &str, service: usize) -> Value {
    json!({ "profile": profile, "service": service })
}

/// Typed operations on an authenticated appliance session.
pub struct Appliance<'a> {
    client: &'a mut dyn RemoteClient,
    session: Session,
}

impl<'a> Appliance<'a> {
    pub fn new(client: &'a mut dyn RemoteClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn login(client: &'a mut dyn RemoteClient, username: &str, password: &str) -> Result<Self> {
        let session = client.authenticate(username, password)?;
        tracing::info!("authentication successful");
        Ok(Self::new(client, session))
    }

    /// `getprm`: the profile's parameters, found at `answer[0].parameters`.
    ///
    /// A missing or empty parameter object means the profile does not exist.
    pub fn get_params(&mut self, object: &str, profile: &str) -> Result<Value> {
        let payload = self.client.call(
            &self.session,
            object,
            "getprm",
            json!({ "ids": profile_ids(profile) }),
        )?;
        match payload.pointer("/answer/0/parameters") {
            Some(Value::Object(map)) if !map.is_empty() => Ok(Value::Object(map.clone())),
            _ => Err(Error::ProfileNotFound(format!("{object}/{profile}"))),
        }
    }

    /// `setprm` with the given ids; a non-zero `retcode` is a [`Error::RemoteApply`].
    pub fn set_params(&mut self, object: &str, ids: Value, parameters: &Value) -> Result<Ack> {
        let operation = format!("{object} setprm {ids}");
        let payload = self.client.call(
            &self.session,
            object,
            "setprm",
            json!({ "ids": ids, "parameters": parameters }),
        )?;
        check_retcode(&operation, &payload)
    }

    pub fn start(&mut self, object: &str, profile: &str) -> Result<Ack> {
        let operation = format!("{object} start {profile}");
        let payload = self.client.call(
            &self.session,
            object,
            "start",
            json!({ "ids": profile_ids(profile) }),
        )?;
        check_retcode(&operation, &payload)
    }
}

pub fn check_retcode(operation: &str, payload: &Value) -> Result<Ack> {
    let Some(code) = payload.get("retcode").and_then(Value::as_i64) else {
        return Err(Error::MalformedResponse(format!("{operation}: no retcode")));
    };
    let message = payload
        .get("retmsg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if code != 0 {
        tracing::error!(operation, code, %message, "remote call rejected");
        return Err(Error::RemoteApply {
            operation: operation.to_string(),
            code,
            message,
        });
    }
    tracing::info!(operation, %message, "ok");
    Ok(Ack { message })
}
