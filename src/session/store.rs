// ABOUTME: Session state store with an explicit mutation API
// ABOUTME: Every mutation re-renders; poll engine writes are fenced by job generation

use std::sync::{Arc, Mutex, MutexGuard};

use super::state::{
    progress_percent, ClientAction, Job, PollPhase, ResultPanel, SessionState, StatusLine,
};
use crate::error::RequestError;
use crate::i18n::Lang;
use crate::remote::{ClientInfo, JobResult, JobStatus, JobStatusResponse};
use crate::view::{render, Surface};

pub struct SessionStore {
    state: Mutex<SessionState>,
    surface: Arc<dyn Surface>,
}

impl SessionStore {
    pub fn new(lang: Lang, surface: Arc<dyn Surface>) -> Self {
        Self {
            state: Mutex::new(SessionState::new(lang)),
            surface,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.lock();
        let out = mutate(&mut state);
        self.surface.show(&render(&state));
        out
    }

    /// Updates the target identity. Any change to host or user invalidates
    /// what was observed about the previous target.
    pub fn set_identity(&self, host: &str, user: &str) {
        self.update(|state| {
            if state.host != host || state.user != user {
                tracing::debug!(host, user, "Target identity changed");
                state.host = host.to_string();
                state.user = user.to_string();
                reset_identity(state);
            }
        })
    }

    pub fn reset_on_identity_change(&self) {
        self.update(reset_identity)
    }

    pub fn set_checked(&self, checked: bool) {
        self.update(|state| state.server_checked = checked)
    }

    pub fn set_configured(&self, configured: bool) {
        self.update(|state| state.server_configured = configured)
    }

    pub fn replace_roster(&self, clients: Vec<ClientInfo>) {
        self.update(|state| state.client_roster = clients)
    }

    /// Returns false when the client already has an action in flight.
    pub fn mark_busy(&self, name: &str, action: ClientAction) -> bool {
        self.update(|state| {
            if state.busy_by_client.contains_key(name) {
                return false;
            }
            state.busy_by_client.insert(name.to_string(), action);
            true
        })
    }

    pub fn clear_busy(&self, name: &str) {
        self.update(|state| {
            state.busy_by_client.remove(name);
        })
    }

    pub fn busy_action(&self, name: &str) -> Option<ClientAction> {
        self.lock().busy_by_client.get(name).copied()
    }

    pub fn set_status(&self, status: StatusLine) {
        self.update(|state| state.status = status)
    }

    /// Disables the provisioning action and clears the previous outcome.
    /// Bumps the generation so a loop still finishing an older job can no
    /// longer write.
    pub fn begin_action(&self) {
        self.update(|state| {
            state.generation += 1;
            state.phase = PollPhase::Idle;
            state.action_enabled = false;
            state.result = None;
            state.job = None;
            state.status = StatusLine::CreatingJob;
            state.progress_percent = progress_percent(None);
        })
    }

    pub fn release_action(&self, status: StatusLine) {
        self.update(|state| {
            state.action_enabled = true;
            state.status = status;
        })
    }

    /// Hands a new job to the poll engine and returns its generation. Writes
    /// carrying an older generation are ignored from here on.
    pub fn begin_job(&self, job_id: &str) -> u64 {
        self.update(|state| {
            state.generation += 1;
            state.job = Some(Job::new(job_id));
            state.phase = PollPhase::Polling;
            state.status = StatusLine::Provisioning;
            state.progress_percent = progress_percent(None);
            state.action_enabled = false;
            state.result = None;
            state.generation
        })
    }

    /// Applies one status payload. Returns the status when it was applied,
    /// or `None` when the write is stale or the job already left polling.
    pub fn apply_status(&self, generation: u64, payload: &JobStatusResponse) -> Option<JobStatus> {
        self.update(|state| {
            if state.generation != generation || state.phase != PollPhase::Polling {
                return None;
            }
            let job = state.job.as_mut()?;
            job.status = Some(payload.status.clone());
            job.progress_lines = payload.progress.clone();
            job.error = payload.error.clone();
            state.progress_percent = progress_percent(Some(&payload.status));

            match payload.status {
                JobStatus::Error => {
                    let message = payload
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string());
                    state.phase = PollPhase::Errored;
                    state.status = StatusLine::Failed(message);
                    state.action_enabled = true;
                }
                JobStatus::Done => {
                    state.phase = PollPhase::Done;
                    state.status = job_line(&payload.status, &payload.progress);
                }
                _ => {
                    state.status = job_line(&payload.status, &payload.progress);
                }
            }
            Some(payload.status.clone())
        })
    }

    /// Opens the result panel for a finished job. Runs its side effects only
    /// once per job.
    pub fn complete_job(&self, generation: u64, result: &JobResult, download_name: &str) -> bool {
        self.update(|state| {
            if state.generation != generation
                || state.phase != PollPhase::Done
                || state.result.is_some()
            {
                return false;
            }
            state.result = Some(ResultPanel {
                download_name: download_name.to_string(),
                config: result.config.clone(),
                qr_png_base64: result.qr_png_base64.clone(),
                checks: result.checks.clone(),
            });
            state.status = StatusLine::Ready {
                checks: result.checks.clone(),
            };
            state.server_configured = true;
            state.action_enabled = true;
            true
        })
    }

    /// Returns a cancelled job to idle. The job's last observed state stays
    /// visible; only the phase changes.
    pub fn abandon_job(&self, generation: u64) -> bool {
        self.update(|state| {
            let in_flight = matches!(state.phase, PollPhase::Polling | PollPhase::Done)
                && state.result.is_none();
            if state.generation != generation || !in_flight {
                return false;
            }
            state.phase = PollPhase::Idle;
            true
        })
    }

    /// Ends the job with a failure raised outside the status payload
    /// (a failed poll request or result fetch).
    pub fn fail_job(&self, generation: u64, err: &RequestError) -> bool {
        self.update(|state| {
            let in_flight = matches!(state.phase, PollPhase::Polling | PollPhase::Done)
                && state.result.is_none();
            if state.generation != generation || !in_flight {
                return false;
            }
            if let Some(job) = state.job.as_mut() {
                job.error = Some(err.message().to_string());
            }
            state.phase = PollPhase::Errored;
            state.status = StatusLine::Failed(err.message().to_string());
            state.action_enabled = true;
            true
        })
    }
}

fn reset_identity(state: &mut SessionState) {
    state.server_checked = false;
    state.server_configured = false;
    state.client_roster.clear();
}

fn job_line(status: &JobStatus, progress: &[String]) -> StatusLine {
    let last = progress
        .last()
        .cloned()
        .unwrap_or_else(|| status.as_str().to_string());
    StatusLine::Job {
        status: status.as_str().to_string(),
        last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSurface;

    fn store() -> (SessionStore, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        (SessionStore::new(Lang::En, surface.clone()), surface)
    }

    fn payload(status: &str, progress: &[&str], error: Option<&str>) -> JobStatusResponse {
        JobStatusResponse {
            job_id: Some("j1".to_string()),
            status: JobStatus::from(status.to_string()),
            progress: progress.iter().map(|s| s.to_string()).collect(),
            error: error.map(str::to_string),
            config_ready: false,
        }
    }

    fn client(name: &str) -> ClientInfo {
        ClientInfo {
            name: name.to_string(),
            ip: None,
            interface: None,
            latest_handshake: None,
            transfer_rx: None,
            transfer_tx: None,
        }
    }

    #[test]
    fn test_reset_on_identity_change_clears_observations() {
        let (store, _) = store();
        store.set_checked(true);
        store.set_configured(true);
        store.replace_roster(vec![client("a"), client("b")]);

        store.reset_on_identity_change();

        let state = store.snapshot();
        assert!(!state.server_checked);
        assert!(!state.server_configured);
        assert!(state.client_roster.is_empty());
    }

    #[test]
    fn test_identity_change_resets_only_on_difference() {
        let (store, _) = store();
        store.set_identity("1.2.3.4", "root");
        store.set_checked(true);

        store.set_identity("1.2.3.4", "root");
        assert!(store.snapshot().server_checked);

        store.set_identity("1.2.3.4", "admin");
        assert!(!store.snapshot().server_checked);
    }

    #[test]
    fn test_every_mutation_renders() {
        let (store, surface) = store();
        store.set_checked(true);
        store.set_configured(false);
        store.replace_roster(Vec::new());
        store.mark_busy("a", ClientAction::Rotate);
        store.clear_busy("a");
        store.reset_on_identity_change();
        assert_eq!(surface.screens().len(), 6);
    }

    #[test]
    fn test_busy_is_exclusive_per_client() {
        let (store, _) = store();
        assert!(store.mark_busy("phone", ClientAction::Export));
        assert!(!store.mark_busy("phone", ClientAction::Remove));
        assert!(store.mark_busy("laptop", ClientAction::Remove));
        assert_eq!(store.busy_action("phone"), Some(ClientAction::Export));

        store.clear_busy("phone");
        assert_eq!(store.busy_action("phone"), None);
        assert!(store.mark_busy("phone", ClientAction::Qr));
    }

    #[test]
    fn test_apply_status_replaces_progress() {
        let (store, _) = store();
        let generation = store.begin_job("j1");

        store.apply_status(generation, &payload("running", &["a", "b"], None));
        store.apply_status(generation, &payload("running", &["c"], None));

        let state = store.snapshot();
        assert_eq!(state.progress_lines(), ["c".to_string()]);
        assert_eq!(state.progress_percent, 65);
        assert_eq!(
            state.status,
            StatusLine::Job {
                status: "running".to_string(),
                last: "c".to_string()
            }
        );
    }

    #[test]
    fn test_same_payload_twice_is_idempotent() {
        let (store, surface) = store();
        let generation = store.begin_job("j1");
        let running = payload("running", &["step1"], None);

        store.apply_status(generation, &running);
        let first = store.snapshot();
        store.apply_status(generation, &running);
        assert_eq!(store.snapshot(), first);

        let screens = surface.screens();
        assert_eq!(screens[screens.len() - 1], screens[screens.len() - 2]);
    }

    #[test]
    fn test_error_payload_applies_once() {
        let (store, surface) = store();
        let generation = store.begin_job("j1");
        let failed = payload("error", &["boom"], Some("apt failed"));

        assert_eq!(
            store.apply_status(generation, &failed),
            Some(JobStatus::Error)
        );
        assert_eq!(store.apply_status(generation, &failed), None);

        let state = store.snapshot();
        assert_eq!(state.phase, PollPhase::Errored);
        assert_eq!(state.status, StatusLine::Failed("apt failed".to_string()));
        assert_eq!(surface.enable_transitions(), 1);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let (store, _) = store();
        let old = store.begin_job("a");
        let current = store.begin_job("b");

        assert_eq!(store.apply_status(old, &payload("running", &["from a"], None)), None);
        assert!(!store.fail_job(old, &RequestError::logical("late")));

        let state = store.snapshot();
        assert_eq!(state.job.as_ref().unwrap().id, "b");
        assert!(state.progress_lines().is_empty());
        assert_eq!(state.generation, current);
        assert_eq!(state.phase, PollPhase::Polling);
    }

    #[test]
    fn test_begin_action_fences_finishing_job() {
        let (store, _) = store();
        let generation = store.begin_job("a");
        store.apply_status(generation, &payload("done", &[], None));

        store.begin_action();
        let result = JobResult {
            ok: Some(true),
            config: "A-CONFIG".to_string(),
            qr_png_base64: String::new(),
            checks: Vec::new(),
            error: None,
        };

        assert!(!store.complete_job(generation, &result, "client1"));
        let state = store.snapshot();
        assert!(state.result.is_none());
        assert!(!state.action_enabled);
        assert!(!state.server_configured);
        assert_eq!(state.status, StatusLine::CreatingJob);
    }

    #[test]
    fn test_complete_job_marks_configured_once() {
        let (store, surface) = store();
        let generation = store.begin_job("j1");
        store.apply_status(generation, &payload("done", &["finished"], None));

        let result = JobResult {
            ok: Some(true),
            config: "[Interface]".to_string(),
            qr_png_base64: "AA==".to_string(),
            checks: Vec::new(),
            error: None,
        };
        assert!(store.complete_job(generation, &result, "client1"));
        assert!(!store.complete_job(generation, &result, "client1"));

        let state = store.snapshot();
        assert!(state.server_configured);
        assert!(state.action_enabled);
        assert_eq!(state.result.unwrap().download_name, "client1");
        assert_eq!(surface.enable_transitions(), 1);
    }
}
