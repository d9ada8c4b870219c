// ABOUTME: Data structures for VPN Wizard API requests and responses
// ABOUTME: These are serialized to JSON for API communication

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RequestError;

/// Name the server assigns when a provisioning request carries none.
pub const DEFAULT_CLIENT_NAME: &str = "client1";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshPayload {
    pub host: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_content: Option<String>,
}

impl fmt::Debug for SshPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshPayload")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_content", &self.key_content.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub auto_mtu: bool,
    pub tune: bool,
    pub check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            client_name: None,
            auto_mtu: true,
            tune: true,
            check: true,
            listen_port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionRequest {
    pub ssh: SshPayload,
    pub options: ProvisionOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct SshOnlyRequest {
    pub ssh: SshPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientRequest {
    pub ssh: SshPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobCreated {
    pub job_id: String,
}

/// Job state reported by the service. Unknown values are kept verbatim and
/// treated as "still in progress".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            _ => JobStatus::Other(raw),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct JobStatusResponse {
    pub job_id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Vec<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub config_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckItem {
    pub name: String,
    pub ok: bool,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    pub ok: Option<bool>,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub qr_png_base64: String,
    #[serde(default)]
    pub checks: Vec<CheckItem>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerStatus {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub configured: bool,
    pub protocol: Option<String>,
    pub listen_port: Option<u16>,
    pub clients_count: Option<u32>,
    pub tyumen_port: Option<u16>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub ip: Option<String>,
    pub interface: Option<String>,
    pub latest_handshake: Option<String>,
    pub transfer_rx: Option<String>,
    pub transfer_tx: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientList {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub clients: Vec<ClientInfo>,
    pub error: Option<String>,
}

/// Response of add, export and rotate: a ready client profile.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub qr_png_base64: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollbackAck {
    #[serde(default)]
    pub ok: bool,
    pub backup: Option<String>,
    pub error: Option<String>,
}

/// Bodies that report success with an `ok` flag.
pub trait Acknowledged: Sized {
    fn is_ok(&self) -> bool;
    fn error_message(&self) -> Option<&str>;

    /// Turns `ok:false` into a logical failure.
    fn accept(self) -> Result<Self, RequestError> {
        if self.is_ok() {
            Ok(self)
        } else {
            let message = self.error_message().unwrap_or("unknown error").to_string();
            Err(RequestError::Logical(message))
        }
    }
}

macro_rules! acknowledged {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Acknowledged for $ty {
                fn is_ok(&self) -> bool {
                    self.ok
                }

                fn error_message(&self) -> Option<&str> {
                    self.error.as_deref()
                }
            }
        )*
    };
}

acknowledged!(ServerStatus, ClientList, ClientConfig, Ack, RollbackAck);

impl Acknowledged for JobResult {
    fn is_ok(&self) -> bool {
        self.ok.unwrap_or(true)
    }

    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_keeps_unknown_values() {
        let parsed: JobStatusResponse =
            serde_json::from_value(json!({"status": "provisioning"})).unwrap();
        assert_eq!(parsed.status, JobStatus::Other("provisioning".to_string()));
        assert!(parsed.progress.is_empty());
    }

    #[test]
    fn test_ssh_payload_skips_missing_secrets() {
        let payload = SshPayload {
            host: "1.2.3.4".to_string(),
            user: "root".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"host": "1.2.3.4", "user": "root"}));
    }

    #[test]
    fn test_ssh_payload_debug_redacts() {
        let payload = SshPayload {
            host: "h".to_string(),
            user: "u".to_string(),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", payload);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_accept_rejects_ok_false() {
        let ack: Ack = serde_json::from_value(json!({"ok": false, "error": "no such client"})).unwrap();
        assert_eq!(
            ack.accept().unwrap_err(),
            RequestError::Logical("no such client".to_string())
        );

        let bare: Ack = serde_json::from_value(json!({"ok": false})).unwrap();
        assert_eq!(bare.accept().unwrap_err().message(), "unknown error");
    }

    #[test]
    fn test_job_result_without_ok_is_accepted() {
        let result: JobResult =
            serde_json::from_value(json!({"config": "[Interface]", "qr_png_base64": "AA=="}))
                .unwrap();
        assert!(result.accept().is_ok());
    }

    #[test]
    fn test_provision_request_shape() {
        let request = ProvisionRequest {
            ssh: SshPayload {
                host: "1.2.3.4".to_string(),
                user: "root".to_string(),
                password: Some("pw".to_string()),
                ..Default::default()
            },
            options: ProvisionOptions::default(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "ssh": {"host": "1.2.3.4", "user": "root", "password": "pw"},
                "options": {"auto_mtu": true, "tune": true, "check": true}
            })
        );
    }
}
