// ABOUTME: User-facing operations: server probe, provisioning and client roster actions
// ABOUTME: Ties the gateway, session store, poll engine and saved-server registry together

use std::future::Future;
use std::sync::Arc;

use crate::error::{RequestError, WizardError};
use crate::poll::{PollEngine, PollOutcome, PollSettings};
use crate::remote::{
    ClientConfig, ClientInfo, Gateway, ProvisionOptions, ServerStatus, SshPayload,
    DEFAULT_CLIENT_NAME,
};
use crate::session::{ClientAction, SavedServer, ServerRegistry, SessionStore, StatusLine};

const MAX_CLIENT_NAME_LEN: usize = 32;

/// Client names the server accepts: 1-32 of letters, digits, `-` and `_`.
pub fn validate_client_name(name: &str) -> Result<(), WizardError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_CLIENT_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WizardError::Validation(format!(
            "Invalid client name '{}'. Use letters, numbers, dash, underscore (max {})",
            name, MAX_CLIENT_NAME_LEN
        )))
    }
}

/// Name to save a freshly added profile under. The server's answer is only
/// trusted when it is a valid client name.
fn issued_name(returned: &str, requested: Option<&str>) -> String {
    if validate_client_name(returned).is_ok() {
        return returned.to_string();
    }
    tracing::warn!(returned, "Server returned an unusable client name");
    requested.unwrap_or(DEFAULT_CLIENT_NAME).to_string()
}

pub struct Wizard<G> {
    gateway: Arc<G>,
    store: Arc<SessionStore>,
    engine: PollEngine<G>,
    registry: ServerRegistry,
    /// Credentials live here for the duration of the process only.
    ssh: SshPayload,
}

impl<G: Gateway + 'static> Wizard<G> {
    pub fn new(
        gateway: Arc<G>,
        store: Arc<SessionStore>,
        registry: ServerRegistry,
        settings: PollSettings,
    ) -> Self {
        let engine = PollEngine::new(Arc::clone(&gateway), Arc::clone(&store), settings);
        Self {
            gateway,
            store,
            engine,
            registry,
            ssh: SshPayload::default(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Points the wizard at a server. A different host or user drops what
    /// was learned about the previous one.
    pub fn set_target(&mut self, ssh: SshPayload) {
        self.store.set_identity(&ssh.host, &ssh.user);
        self.ssh = ssh;
    }

    pub async fn health(&self) -> Result<bool, WizardError> {
        Ok(self.gateway.health().await?)
    }

    /// Probes the server. The server counts as checked once the probe
    /// completes, whether or not it succeeded.
    pub async fn check_server(&mut self) -> Result<ServerStatus, WizardError> {
        self.store.set_status(StatusLine::CheckingServer);
        let probe = self.gateway.server_status(&self.ssh).await;
        self.store.set_checked(true);

        match probe {
            Ok(status) => {
                tracing::info!(
                    host = %self.ssh.host,
                    configured = status.configured,
                    protocol = status.protocol.as_deref().unwrap_or("-"),
                    "Server status"
                );
                self.store.set_configured(status.configured);
                self.store.set_status(StatusLine::Server {
                    configured: status.configured,
                });
                self.remember(SavedServer {
                    listen_port: status.listen_port,
                    clients_count: status.clients_count,
                    ..SavedServer::new(&self.ssh.host).with_user(&self.ssh.user)
                });
                Ok(status)
            }
            Err(err) => Err(self.surface_error(err)),
        }
    }

    /// Submits a provisioning job and hands it to the poll engine. Returns
    /// the job id; use [`Wizard::wait`] to follow it to the end.
    pub async fn provision(&mut self, options: ProvisionOptions) -> Result<String, WizardError> {
        if !self.store.snapshot().server_checked {
            return Err(WizardError::ServerNotChecked);
        }
        if let Some(name) = &options.client_name {
            validate_client_name(name)?;
        }

        self.engine.cancel();
        self.store.begin_action();
        match self.gateway.provision(&self.ssh, &options).await {
            Ok(created) => {
                let download_name = options
                    .client_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string());
                self.engine.start(&created.job_id, &download_name);
                self.remember(SavedServer {
                    listen_port: options.listen_port,
                    ..SavedServer::new(&self.ssh.host).with_user(&self.ssh.user)
                });
                Ok(created.job_id)
            }
            Err(err) => {
                tracing::warn!(host = %self.ssh.host, error = %err, "Provisioning request failed");
                self.engine.cancel();
                self.store
                    .release_action(StatusLine::Failed(err.message().to_string()));
                Err(err.into())
            }
        }
    }

    /// Probes the server, then provisions it whatever the probe reported.
    /// A failed probe still counts as a check.
    pub async fn probe_and_provision(
        &mut self,
        options: ProvisionOptions,
    ) -> Result<String, WizardError> {
        if let Err(err) = self.check_server().await {
            tracing::warn!(
                host = %self.ssh.host,
                error = %err,
                "Server probe failed, provisioning anyway"
            );
        }
        self.provision(options).await
    }

    pub async fn wait(&mut self) -> PollOutcome {
        self.engine.join().await
    }

    pub fn cancel(&mut self) {
        self.engine.cancel();
    }

    pub async fn refresh_clients(&mut self) -> Result<Vec<ClientInfo>, WizardError> {
        match self.fetch_roster().await {
            Ok(clients) => Ok(clients),
            Err(err) => Err(self.surface_error(err)),
        }
    }

    async fn fetch_roster(&mut self) -> Result<Vec<ClientInfo>, RequestError> {
        let list = self.gateway.list_clients(&self.ssh).await?;
        self.store.replace_roster(list.clients.clone());
        self.remember(SavedServer {
            clients_count: u32::try_from(list.clients.len()).ok(),
            ..SavedServer::new(&self.ssh.host)
        });
        Ok(list.clients)
    }

    /// Re-reads the roster after a change the server already applied. On
    /// failure the previous roster stays; the change and its result stand.
    async fn refresh_after_change(&mut self) {
        if let Err(err) = self.fetch_roster().await {
            tracing::warn!(
                host = %self.ssh.host,
                error = %err,
                "Client list refresh failed, roster may be stale"
            );
        }
    }

    pub async fn add_client(
        &mut self,
        name: Option<&str>,
        listen_port: Option<u16>,
    ) -> Result<ClientConfig, WizardError> {
        if let Some(name) = name {
            validate_client_name(name)?;
        }
        let mut profile = match self.gateway.add_client(&self.ssh, name, listen_port).await {
            Ok(profile) => profile,
            Err(err) => return Err(self.surface_error(err)),
        };
        profile.client_name = issued_name(&profile.client_name, name);
        self.store
            .set_status(StatusLine::ProfileReady(profile.client_name.clone()));
        self.refresh_after_change().await;
        Ok(profile)
    }

    pub async fn export_client(&self, name: &str) -> Result<ClientConfig, WizardError> {
        let mut profile = self
            .with_busy(
                name,
                ClientAction::Export,
                self.gateway.export_client(&self.ssh, name),
            )
            .await?;
        profile.client_name = name.to_string();
        self.store.set_status(StatusLine::ProfileReady(name.to_string()));
        Ok(profile)
    }

    /// Same call as export; kept as its own action so the roster shows what
    /// the client is busy with.
    pub async fn client_qr(&self, name: &str) -> Result<ClientConfig, WizardError> {
        let mut profile = self
            .with_busy(
                name,
                ClientAction::Qr,
                self.gateway.export_client(&self.ssh, name),
            )
            .await?;
        profile.client_name = name.to_string();
        self.store.set_status(StatusLine::ProfileReady(name.to_string()));
        Ok(profile)
    }

    pub async fn rotate_client(
        &mut self,
        name: &str,
        listen_port: Option<u16>,
    ) -> Result<ClientConfig, WizardError> {
        let mut profile = self
            .with_busy(
                name,
                ClientAction::Rotate,
                self.gateway.rotate_client(&self.ssh, name, listen_port),
            )
            .await?;
        profile.client_name = name.to_string();
        self.store.set_status(StatusLine::ProfileReady(name.to_string()));
        self.refresh_after_change().await;
        Ok(profile)
    }

    pub async fn remove_client(&mut self, name: &str) -> Result<(), WizardError> {
        self.with_busy(
            name,
            ClientAction::Remove,
            self.gateway.remove_client(&self.ssh, name),
        )
        .await?;
        self.store.set_status(StatusLine::Removed(name.to_string()));
        self.refresh_after_change().await;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<Option<String>, WizardError> {
        match self.gateway.rollback(&self.ssh).await {
            Ok(ack) => {
                self.store.set_status(StatusLine::RollbackOk(ack.backup.clone()));
                Ok(ack.backup)
            }
            Err(err) => Err(self.surface_error(err)),
        }
    }

    /// Runs one per-client request while the client is marked busy. The mark
    /// is cleared whether the request succeeds or fails.
    async fn with_busy<T>(
        &self,
        name: &str,
        action: ClientAction,
        request: impl Future<Output = Result<T, RequestError>>,
    ) -> Result<T, WizardError> {
        validate_client_name(name)?;
        if !self.store.mark_busy(name, action) {
            let current = self.store.busy_action(name).unwrap_or(action);
            return Err(WizardError::Busy {
                client: name.to_string(),
                action: current,
            });
        }

        tracing::debug!(client = name, %action, "Client action started");
        let outcome = request.await;
        self.store.clear_busy(name);

        outcome.map_err(|err| self.surface_error(err))
    }

    fn surface_error(&self, err: RequestError) -> WizardError {
        tracing::warn!(host = %self.ssh.host, error = %err, "Request failed");
        self.store
            .set_status(StatusLine::Failed(err.message().to_string()));
        err.into()
    }

    fn remember(&mut self, entry: SavedServer) {
        if let Err(err) = self.registry.upsert(entry) {
            tracing::warn!(error = %err, "Failed to save server list");
        }
    }
}
