// ABOUTME: Remote API module
// ABOUTME: HTTP gateway to the VPN Wizard job service and its wire types

pub mod client;
pub mod gateway;
pub mod models;

pub use client::ApiClient;
pub use gateway::Gateway;
pub use models::{
    CheckItem, ClientConfig, ClientInfo, JobResult, JobStatus, JobStatusResponse,
    ProvisionOptions, ServerStatus, SshPayload, DEFAULT_CLIENT_NAME,
};
