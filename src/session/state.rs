// ABOUTME: In-memory session model: target identity, server flags, roster, job and status
// ABOUTME: Mutated only through SessionStore; rendered by view::render

use std::collections::BTreeMap;
use std::fmt;

use crate::i18n::Lang;
use crate::remote::{CheckItem, ClientInfo, JobStatus};

/// Per-client action kinds that lock a client while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientAction {
    Export,
    Qr,
    Rotate,
    Remove,
}

impl fmt::Display for ClientAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientAction::Export => "export",
            ClientAction::Qr => "qr",
            ClientAction::Rotate => "rotate",
            ClientAction::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A provisioning job as last observed. `progress_lines` is always the
/// latest payload from the service, never an accumulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub status: Option<JobStatus>,
    pub progress_lines: Vec<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            progress_lines: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    #[default]
    Idle,
    Polling,
    Done,
    Errored,
}

/// Structured status line; the renderer localizes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusLine {
    #[default]
    Idle,
    CheckingServer,
    Server { configured: bool },
    CreatingJob,
    Provisioning,
    Job { status: String, last: String },
    Failed(String),
    Ready { checks: Vec<CheckItem> },
    ProfileReady(String),
    Removed(String),
    RollbackOk(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPanel {
    pub download_name: String,
    pub config: String,
    pub qr_png_base64: String,
    pub checks: Vec<CheckItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub host: String,
    pub user: String,
    pub server_checked: bool,
    pub server_configured: bool,
    pub client_roster: Vec<ClientInfo>,
    pub busy_by_client: BTreeMap<String, ClientAction>,
    /// Job the poll engine currently owns, or last owned once `phase` is back
    /// to idle.
    pub job: Option<Job>,
    pub phase: PollPhase,
    pub generation: u64,
    pub status: StatusLine,
    pub progress_percent: u8,
    pub action_enabled: bool,
    pub result: Option<ResultPanel>,
    pub lang: Lang,
}

impl SessionState {
    pub fn new(lang: Lang) -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            server_checked: false,
            server_configured: false,
            client_roster: Vec::new(),
            busy_by_client: BTreeMap::new(),
            job: None,
            phase: PollPhase::Idle,
            generation: 0,
            status: StatusLine::Idle,
            progress_percent: progress_percent(None),
            action_enabled: true,
            result: None,
            lang,
        }
    }

    /// The job being polled right now, if any.
    pub fn active_job(&self) -> Option<&Job> {
        match self.phase {
            PollPhase::Polling | PollPhase::Done => self.job.as_ref(),
            PollPhase::Idle | PollPhase::Errored => None,
        }
    }

    pub fn progress_lines(&self) -> &[String] {
        self.job
            .as_ref()
            .map(|job| job.progress_lines.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Lang::default())
    }
}

/// Coarse progress for a job status.
pub fn progress_percent(status: Option<&JobStatus>) -> u8 {
    match status {
        Some(JobStatus::Queued) => 20,
        Some(JobStatus::Running) => 65,
        Some(JobStatus::Done) | Some(JobStatus::Error) => 100,
        Some(JobStatus::Other(_)) | None => 8,
    }
}
