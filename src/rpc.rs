use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Session id the appliance accepts for the login call itself.
pub const ANON_SESSION: &str = "00000000000000000000000000000000";
/// Idle timeout (seconds) requested for the session at login.
pub const SESSION_TIMEOUT_S: u64 = 300;

/// Opaque session token returned by login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Session(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Capability the workflow needs from the appliance connection.
///
/// `call` returns the payload object found at `result[1]` of the JSON-RPC reply.
pub trait RemoteClient {
    fn authenticate(&mut self, username: &str, password: &str) -> Result<Session>;

    fn call(&mut self, session: &Session, object: &str, method: &str, args: Value)
    -> Result<Value>;
}

/// Build the `call` envelope: `params = [session, object, method, args]`.
pub fn build_request(session: &str, object: &str, method: &str, args: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "call",
        "params": [session, object, method, args],
    })
}

pub fn login_request(username: &str, password: &str) -> Value {
    let args = json!({
        "username": username,
        "password": password,
        "timeout": SESSION_TIMEOUT_S,
    });
    build_request(ANON_SESSION, "session", "login", &args)
}

/// Pull the payload out of a reply. `result` is `[status, payload]`.
pub fn extract_payload(reply: Value) -> Result<Value> {
    if let Some(err) = reply.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(Error::Transport(format!("rpc error {code}: {msg}")));
    }
    let Some(result) = reply.get("result").and_then(Value::as_array) else {
        return Err(Error::MalformedResponse("no result array".into()));
    };
    match result.get(1) {
        Some(payload) if payload.is_object() => Ok(payload.clone()),
        _ => {
            let status = result.first().and_then(Value::as_i64).unwrap_or(-1);
            Err(Error::MalformedResponse(format!(
                "no payload in result (status {status})"
            )))
        }
    }
}

pub fn session_from_login(payload: &Value) -> Result<Session> {
    match payload.get("ubus_rpc_session").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(Session::new(token)),
        _ => Err(Error::AuthenticationFailed(
            "no ubus_rpc_session in login reply".into(),
        )),
    }
}

/// Blocking HTTP JSON-RPC connection to the appliance.
pub struct HttpClient {
    url: String,
    http: Client,
}

impl HttpClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("client {url}: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            http,
        })
    }

    fn post(&self, body: &Value) -> Result<Value> {
        tracing::trace!(request = %body, "rpc request");
        let resp = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {status}")));
        }
        let reply: Value = resp
            .json()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        tracing::trace!(response = %reply, "rpc response");
        Ok(reply)
    }
}

impl RemoteClient for HttpClient {
    fn authenticate(&mut self, username: &str, password: &str) -> Result<Session> {
        tracing::info!(url = %self.url, username, "authenticating");
        let reply = self.post(&login_request(username, password))?;
        let payload = extract_payload(reply)
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        session_from_login(&payload)
    }

    fn call(
        &mut self,
        session: &Session,
        object: &str,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        tracing::debug!(object, method, "rpc call");
        let reply = self.post(&build_request(session.as_str(), object, method, &args))?;
        extract_payload(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_envelope_shape() {
        let req = login_request("admin", "secret");
        assert_eq!(req["jsonrpc"], "2.0");
        assert_eq!(req["id"], 1);
        assert_eq!(req["method"], "call");
        assert_eq!(req["params"][0], ANON_SESSION);
        assert_eq!(req["params"][1], "session");
        assert_eq!(req["params"][2], "login");
        assert_eq!(req["params"][3]["timeout"], 300);
        assert_eq!(req["params"][3]["username"], "admin");
    }

    #[test]
    fn call_envelope_threads_session() {
        let args = json!({"ids": {"profile": "profile0"}});
        let req = build_request("abc", "y1564", "getprm", &args);
        assert_eq!(req["params"], json!(["abc", "y1564", "getprm", args]));
    }

    #[test]
    fn payload_extracted_from_second_slot() {
        let reply = json!({"jsonrpc": "2.0", "id": 1, "result": [0, {"retcode": 0}]});
        assert_eq!(extract_payload(reply).unwrap(), json!({"retcode": 0}));
    }

    #[test]
    fn status_only_result_is_malformed() {
        let reply = json!({"jsonrpc": "2.0", "id": 1, "result": [6]});
        let err = extract_payload(reply).unwrap_err();
        assert!(err.to_string().contains("status 6"));
    }

    #[test]
    fn rpc_error_member_is_transport_failure() {
        let reply = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32002, "message": "Access denied"}});
        assert!(matches!(extract_payload(reply), Err(Error::Transport(_))));
    }

    #[test]
    fn session_token_required() {
        let ok = session_from_login(&json!({"ubus_rpc_session": "deadbeef"})).unwrap();
        assert_eq!(ok.as_str(), "deadbeef");
        assert!(matches!(
            session_from_login(&json!({"ubus_rpc_session": ""})),
            Err(Error::AuthenticationFailed(_))
        ));
        assert!(session_from_login(&json!({})).is_err());
    }

    mod http {
        use super::*;
        use tokio::runtime::Runtime;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        // The blocking client must run outside the runtime; the server lives on its workers.
        fn serve(rt: &Runtime, reply: ResponseTemplate) -> MockServer {
            rt.block_on(async {
                let server = MockServer::start().await;
                Mock::given(method("POST"))
                    .and(path("/ubus"))
                    .respond_with(reply)
                    .mount(&server)
                    .await;
                server
            })
        }

        fn client(server: &MockServer) -> HttpClient {
            HttpClient::new(&format!("{}/ubus", server.uri()), Duration::from_secs(5)).unwrap()
        }

        #[test]
        fn login_returns_session() {
            let rt = Runtime::new().unwrap();
            let server = serve(
                &rt,
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": [0, {"ubus_rpc_session": "c0ffee"}]
                })),
            );
            let session = client(&server).authenticate("root", "secret").unwrap();
            assert_eq!(session.as_str(), "c0ffee");
        }

        #[test]
        fn server_error_is_transport_failure() {
            let rt = Runtime::new().unwrap();
            let server = serve(&rt, ResponseTemplate::new(500));
            let err = client(&server)
                .call(&Session::new("abc"), "y1564", "getprm", json!({}))
                .unwrap_err();
            assert!(matches!(err, Error::Transport(ref m) if m.contains("500")), "{err}");
        }

        #[test]
        fn non_json_body_is_malformed() {
            let rt = Runtime::new().unwrap();
            let server = serve(&rt, ResponseTemplate::new(200).set_body_string("<html>login</html>"));
            let err = client(&server)
                .call(&Session::new("abc"), "y1564", "getprm", json!({}))
                .unwrap_err();
            assert!(matches!(err, Error::MalformedResponse(_)), "{err}");
        }

        #[test]
        fn unreachable_host_is_transport_failure() {
            let mut c = HttpClient::new("http://127.0.0.1:9/ubus", Duration::from_secs(2)).unwrap();
            assert!(matches!(
                c.call(&Session::new("abc"), "y1564", "getprm", json!({})),
                Err(Error::Transport(_))
            ));
        }
    }
}
