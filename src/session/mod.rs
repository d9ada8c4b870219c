// ABOUTME: Session module
// ABOUTME: In-memory session state and its store, plus persisted preferences and servers

pub mod prefs;
pub mod registry;
pub mod state;
pub mod store;

pub use prefs::{PreferenceStore, Preferences};
pub use registry::{SavedServer, ServerRegistry, MAX_SAVED_SERVERS};
pub use state::{
    progress_percent, ClientAction, Job, PollPhase, ResultPanel, SessionState, StatusLine,
};
pub use store::SessionStore;
