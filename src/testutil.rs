//! In-memory appliance used by the workflow tests.
//!
//! Records every call, answers `getprm` from stored parameters, acknowledges writes with
//! `retcode=0` unless a reply was queued with [`MockClient::respond`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::rpc::{RemoteClient, Session};

pub const TOKEN: &str = "0123456789abcdef0123456789abcdef";

#[derive(Debug, Clone)]
pub struct Call {
    pub session: String,
    pub object: String,
    pub method: String,
    pub args: Value,
}

impl Call {
    pub fn op(&self) -> String {
        format!("{} {}", self.object, self.method)
    }
}

pub struct MockClient {
    calls: Vec<Call>,
    reject_login: bool,
    params: BTreeMap<String, Value>,
    missing: BTreeSet<String>,
    queued: BTreeMap<(String, String), VecDeque<Value>>,
    broken: BTreeSet<(String, String)>,
}

impl MockClient {
    pub fn new() -> Self {
        let mut params = BTreeMap::new();
        params.insert(
            "y1564".to_string(),
            json!({
                "status": false,
                "y1564": {"cir_enabled": false, "eir_enabled": false, "tp_enabled": false},
                "perf": {"enabled": false},
            }),
        );
        params.insert(
            "loopback".to_string(),
            json!({
                "status": false,
                "trial": {
                    "ifaces": {
                        "0": {"name": "porta", "disabled": false},
                        "1": {"name": "portb", "disabled": true}
                    },
                    "wait_time_ms": 1000,
                    "learn_time_ms": 1000
                },
                "loopback": {"duration_us": "0", "type": "layer4"}
            }),
        );
        Self {
            calls: Vec::new(),
            reject_login: false,
            params,
            missing: BTreeSet::new(),
            queued: BTreeMap::new(),
            broken: BTreeSet::new(),
        }
    }

    pub fn reject_login(&mut self) {
        self.reject_login = true;
    }

    pub fn set_params(&mut self, object: &str, params: Value) {
        self.params.insert(object.to_string(), params);
    }

    /// Make `getprm` for `profile` come back empty.
    pub fn missing_profile(&mut self, profile: &str) {
        self.missing.insert(profile.to_string());
    }

    /// Queue the next payload returned for `object method`.
    pub fn respond(&mut self, object: &str, method: &str, payload: Value) {
        self.queued
            .entry((object.to_string(), method.to_string()))
            .or_default()
            .push_back(payload);
    }

    /// Every later `object method` call fails at the transport.
    pub fn break_transport(&mut self, object: &str, method: &str) {
        self.broken.insert((object.to_string(), method.to_string()));
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls.iter().map(Call::op).collect()
    }

    fn answer(&mut self, object: &str, method: &str, args: &Value) -> Value {
        let profile = args
            .pointer("/ids/profile")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match method {
            "getprm" if self.missing.contains(&profile) => json!({"answer": []}),
            "getprm" => {
                let params = self.params.get(object).cloned().unwrap_or(json!({}));
                json!({"answer": [{"parameters": params}]})
            }
            "setprm" => {
                let root_write = args.pointer("/ids/service").is_none();
                if root_write && let Some(p) = args.get("parameters") {
                    self.params.insert(object.to_string(), p.clone());
                }
                json!({"retcode": 0, "retmsg": "OK"})
            }
            _ => json!({"retcode": 0, "retmsg": "OK"}),
        }
    }
}

impl RemoteClient for MockClient {
    fn authenticate(&mut self, _username: &str, _password: &str) -> Result<Session> {
        self.calls.push(Call {
            session: String::new(),
            object: "session".into(),
            method: "login".into(),
            args: Value::Null,
        });
        if self.reject_login {
            return Err(Error::AuthenticationFailed("access denied".into()));
        }
        Ok(Session::new(TOKEN))
    }

    fn call(
        &mut self,
        session: &Session,
        object: &str,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        self.calls.push(Call {
            session: session.as_str().to_string(),
            object: object.to_string(),
            method: method.to_string(),
            args: args.clone(),
        });
        let key = (object.to_string(), method.to_string());
        if self.broken.contains(&key) {
            return Err(Error::Transport("connection reset".into()));
        }
        if let Some(payload) = self.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return Ok(payload);
        }
        Ok(self.answer(object, method, &args))
    }
}
