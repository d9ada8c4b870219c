// ABOUTME: Pure rendering of session state into a screen, plus output surfaces
// ABOUTME: The terminal surface drives an indicatif progress bar on stderr

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::i18n::{t, Label, Lang};
use crate::remote::CheckItem;
use crate::session::{SessionState, StatusLine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub status: String,
    pub progress_percent: u8,
    pub progress_lines: Vec<String>,
    pub action_enabled: bool,
    pub server: Option<String>,
    pub result: Option<ResultView>,
    pub roster: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub download_name: String,
    pub has_qr: bool,
}

/// Something that can show a rendered screen. Neither the store nor the
/// poll engine depends on a particular surface existing.
pub trait Surface: Send + Sync {
    fn show(&self, screen: &Screen);
}

pub struct NullSurface;

impl Surface for NullSurface {
    fn show(&self, _screen: &Screen) {}
}

pub fn render(state: &SessionState) -> Screen {
    let lang = state.lang;
    let server = if state.server_checked {
        let label = if state.server_configured {
            Label::ServerReady
        } else {
            Label::ServerNotConfigured
        };
        Some(format!("{}@{}: {}", state.user, state.host, t(lang, label)))
    } else {
        None
    };

    let roster = state
        .client_roster
        .iter()
        .map(|client| {
            let mut row = client.name.clone();
            if let Some(ip) = &client.ip {
                row.push_str(&format!("  {}", ip));
            }
            if let Some(iface) = &client.interface {
                row.push_str(&format!("  [{}]", iface));
            }
            if let Some(handshake) = &client.latest_handshake {
                row.push_str(&format!("  {}", handshake));
            }
            if let (Some(rx), Some(tx)) = (&client.transfer_rx, &client.transfer_tx) {
                row.push_str(&format!("  rx {} / tx {}", rx, tx));
            }
            if let Some(action) = state.busy_by_client.get(&client.name) {
                row.push_str(&format!("  ({} {})", t(lang, Label::Busy), action));
            }
            row
        })
        .collect();

    Screen {
        status: status_text(lang, &state.status),
        progress_percent: state.progress_percent,
        progress_lines: state.progress_lines().to_vec(),
        action_enabled: state.action_enabled,
        server,
        result: state.result.as_ref().map(|panel| ResultView {
            download_name: panel.download_name.clone(),
            has_qr: !panel.qr_png_base64.is_empty(),
        }),
        roster,
    }
}

fn status_text(lang: Lang, status: &StatusLine) -> String {
    match status {
        StatusLine::Idle => t(lang, Label::Idle).to_string(),
        StatusLine::CheckingServer => t(lang, Label::CheckingServer).to_string(),
        StatusLine::Server { configured: true } => t(lang, Label::ServerReady).to_string(),
        StatusLine::Server { configured: false } => {
            t(lang, Label::ServerNotConfigured).to_string()
        }
        StatusLine::CreatingJob => t(lang, Label::CreatingJob).to_string(),
        StatusLine::Provisioning => t(lang, Label::Provisioning).to_string(),
        StatusLine::Job { status, last } => format!("{}: {}", status, last),
        StatusLine::Failed(message) => format!("{}: {}", t(lang, Label::Failed), message),
        StatusLine::Ready { checks } if checks.is_empty() => {
            format!("{} {}", t(lang, Label::Ready), t(lang, Label::ReadyHint))
        }
        StatusLine::Ready { checks } => {
            format!("{} {}", t(lang, Label::Ready), checks_text(lang, checks))
        }
        StatusLine::ProfileReady(name) => format!("{}: {}", t(lang, Label::ProfileReady), name),
        StatusLine::Removed(name) => format!("{}: {}", t(lang, Label::Removed), name),
        StatusLine::RollbackOk(backup) => match backup {
            Some(path) => format!("{}: {}", t(lang, Label::RollbackOk), path),
            None => t(lang, Label::RollbackOk).to_string(),
        },
    }
}

fn checks_text(lang: Lang, checks: &[CheckItem]) -> String {
    checks
        .iter()
        .map(|item| {
            let verdict = if item.ok { Label::CheckOk } else { Label::CheckFail };
            format!("{}: {}", item.name, t(lang, verdict))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Progress bar plus a running log of job progress lines.
pub struct TerminalSurface {
    bar: ProgressBar,
    printed: Mutex<Vec<String>>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self {
            bar,
            printed: Mutex::new(Vec::new()),
        }
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn show(&self, screen: &Screen) {
        self.bar.set_position(u64::from(screen.progress_percent));
        self.bar.set_message(screen.status.clone());

        let mut printed = self.printed.lock().unwrap_or_else(|p| p.into_inner());
        // The service resends the whole log each time; print only what is new.
        let fresh = if screen.progress_lines.starts_with(&printed) {
            &screen.progress_lines[printed.len()..]
        } else {
            &screen.progress_lines[..]
        };
        for line in fresh {
            self.bar.println(format!("  {}", line));
        }
        *printed = screen.progress_lines.clone();
    }
}
