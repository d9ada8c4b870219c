// ABOUTME: Request gateway trait shared by the HTTP client and test doubles
// ABOUTME: Typed helpers build each endpoint call and decode its response

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::models::{
    Ack, Acknowledged, ClientConfig, ClientList, ClientRequest, JobCreated, JobResult,
    JobStatusResponse, ProvisionOptions, ProvisionRequest, RollbackAck, ServerStatus,
    SshOnlyRequest, SshPayload,
};
use crate::error::RequestError;

/// One outbound call to the remote job service.
///
/// Implementors only provide [`Gateway::call`]; the typed endpoint helpers
/// are built on top of it. No retries happen at this layer.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, RequestError>;

    async fn health(&self) -> Result<bool, RequestError> {
        let value = self.call(Method::GET, "/health", None).await?;
        Ok(value.get("ok").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn provision(
        &self,
        ssh: &SshPayload,
        options: &ProvisionOptions,
    ) -> Result<JobCreated, RequestError> {
        let request = ProvisionRequest {
            ssh: ssh.clone(),
            options: options.clone(),
        };
        let value = self
            .call(Method::POST, "/api/provision", Some(encode(&request)?))
            .await?;
        decode(value, "provision")
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, RequestError> {
        let value = self
            .call(Method::GET, &format!("/api/jobs/{}", job_id), None)
            .await?;
        decode(value, "job status")
    }

    async fn job_result(&self, job_id: &str) -> Result<JobResult, RequestError> {
        let value = self
            .call(Method::GET, &format!("/api/jobs/{}/result", job_id), None)
            .await?;
        decode::<JobResult>(value, "job result")?.accept()
    }

    async fn server_status(&self, ssh: &SshPayload) -> Result<ServerStatus, RequestError> {
        let value = self
            .call(Method::POST, "/api/server/status", Some(ssh_only(ssh)?))
            .await?;
        decode::<ServerStatus>(value, "server status")?.accept()
    }

    async fn list_clients(&self, ssh: &SshPayload) -> Result<ClientList, RequestError> {
        let value = self
            .call(Method::POST, "/api/clients/list", Some(ssh_only(ssh)?))
            .await?;
        decode::<ClientList>(value, "client list")?.accept()
    }

    async fn add_client(
        &self,
        ssh: &SshPayload,
        client_name: Option<&str>,
        listen_port: Option<u16>,
    ) -> Result<ClientConfig, RequestError> {
        let body = client_request(ssh, client_name, listen_port)?;
        let value = self.call(Method::POST, "/api/clients/add", Some(body)).await?;
        decode::<ClientConfig>(value, "add client")?.accept()
    }

    async fn export_client(
        &self,
        ssh: &SshPayload,
        client_name: &str,
    ) -> Result<ClientConfig, RequestError> {
        let body = client_request(ssh, Some(client_name), None)?;
        let value = self
            .call(Method::POST, "/api/clients/export", Some(body))
            .await?;
        decode::<ClientConfig>(value, "export client")?.accept()
    }

    async fn rotate_client(
        &self,
        ssh: &SshPayload,
        client_name: &str,
        listen_port: Option<u16>,
    ) -> Result<ClientConfig, RequestError> {
        let body = client_request(ssh, Some(client_name), listen_port)?;
        let value = self
            .call(Method::POST, "/api/clients/rotate", Some(body))
            .await?;
        decode::<ClientConfig>(value, "rotate client")?.accept()
    }

    async fn remove_client(&self, ssh: &SshPayload, client_name: &str) -> Result<Ack, RequestError> {
        let body = client_request(ssh, Some(client_name), None)?;
        let value = self
            .call(Method::POST, "/api/clients/remove", Some(body))
            .await?;
        decode::<Ack>(value, "remove client")?.accept()
    }

    async fn rollback(&self, ssh: &SshPayload) -> Result<RollbackAck, RequestError> {
        let value = self
            .call(Method::POST, "/api/rollback", Some(ssh_only(ssh)?))
            .await?;
        decode::<RollbackAck>(value, "rollback")?.accept()
    }
}

fn encode<T: Serialize>(body: &T) -> Result<Value, RequestError> {
    serde_json::to_value(body)
        .map_err(|e| RequestError::logical(format!("Failed to encode request: {}", e)))
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, RequestError> {
    serde_json::from_value(value)
        .map_err(|e| RequestError::logical(format!("Failed to parse {} response: {}", what, e)))
}

fn ssh_only(ssh: &SshPayload) -> Result<Value, RequestError> {
    encode(&SshOnlyRequest { ssh: ssh.clone() })
}

fn client_request(
    ssh: &SshPayload,
    client_name: Option<&str>,
    listen_port: Option<u16>,
) -> Result<Value, RequestError> {
    encode(&ClientRequest {
        ssh: ssh.clone(),
        client_name: client_name.map(str::to_string),
        listen_port,
    })
}
