// ABOUTME: Localized labels for status lines and terminal output
// ABOUTME: Lookup is a pure function of language and label key

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Ru,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ru => "ru",
        }
    }

    /// Picks a language from a locale string such as `ru_RU.UTF-8`.
    pub fn from_locale(locale: &str) -> Option<Self> {
        let lower = locale.trim().to_ascii_lowercase();
        if lower.starts_with("ru") {
            Some(Lang::Ru)
        } else if lower.starts_with("en") {
            Some(Lang::En)
        } else {
            None
        }
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lang::from_locale(s).ok_or_else(|| format!("Unsupported language: {}", s))
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Idle,
    CheckingServer,
    ServerReady,
    ServerNotConfigured,
    CreatingJob,
    Provisioning,
    Failed,
    Ready,
    ReadyHint,
    CheckOk,
    CheckFail,
    Busy,
    Clients,
    NoClients,
    Saved,
    ProfileReady,
    Removed,
    RollbackOk,
}

pub fn t(lang: Lang, label: Label) -> &'static str {
    match lang {
        Lang::En => en(label),
        Lang::Ru => ru(label),
    }
}

fn en(label: Label) -> &'static str {
    match label {
        Label::Idle => "Ready to start",
        Label::CheckingServer => "Checking server...",
        Label::ServerReady => "Server is configured",
        Label::ServerNotConfigured => "Server is not configured yet",
        Label::CreatingJob => "Creating job...",
        Label::Provisioning => "Provisioning... this can take a few minutes.",
        Label::Failed => "Failed",
        Label::Ready => "Ready.",
        Label::ReadyHint => "Download your config and scan the QR.",
        Label::CheckOk => "ok",
        Label::CheckFail => "fail",
        Label::Busy => "busy",
        Label::Clients => "Clients",
        Label::NoClients => "No clients yet",
        Label::Saved => "Saved",
        Label::ProfileReady => "Profile ready",
        Label::Removed => "Removed",
        Label::RollbackOk => "Rollback OK",
    }
}

fn ru(label: Label) -> &'static str {
    match label {
        Label::Idle => "Готово к запуску",
        Label::CheckingServer => "Проверяем сервер...",
        Label::ServerReady => "Сервер настроен",
        Label::ServerNotConfigured => "Сервер ещё не настроен",
        Label::CreatingJob => "Создаём задачу...",
        Label::Provisioning => "Настраиваем сервер... это может занять несколько минут.",
        Label::Failed => "Ошибка",
        Label::Ready => "Готово.",
        Label::ReadyHint => "Скачайте конфиг и отсканируйте QR.",
        Label::CheckOk => "ок",
        Label::CheckFail => "сбой",
        Label::Busy => "занят",
        Label::Clients => "Клиенты",
        Label::NoClients => "Клиентов пока нет",
        Label::Saved => "Сохранено",
        Label::ProfileReady => "Профиль готов",
        Label::Removed => "Удалён",
        Label::RollbackOk => "Откат выполнен",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_parsing() {
        assert_eq!(Lang::from_locale("ru_RU.UTF-8"), Some(Lang::Ru));
        assert_eq!(Lang::from_locale("en-US"), Some(Lang::En));
        assert_eq!(Lang::from_locale("C"), None);
        assert!("de".parse::<Lang>().is_err());
    }

    #[test]
    fn test_labels_differ_per_language() {
        assert_eq!(t(Lang::En, Label::Failed), "Failed");
        assert_ne!(t(Lang::Ru, Label::Failed), t(Lang::En, Label::Failed));
    }
}
