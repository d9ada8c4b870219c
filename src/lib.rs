// ABOUTME: Library root for the VPN Wizard client
// ABOUTME: Exposes the gateway, session store, poll engine and renderer used by the vpnw binary

pub mod artifacts;
pub mod config;
pub mod error;
pub mod i18n;
pub mod poll;
pub mod remote;
pub mod session;
pub mod storage;
pub mod view;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use error::{RequestError, WizardError};
pub use poll::{PollEngine, PollOutcome, PollSettings};
pub use remote::{ApiClient, Gateway};
pub use session::SessionStore;
pub use wizard::Wizard;
