use std::fmt;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// A transient, non-blocking user notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warn => "warn",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Sending half of the notification channel. Never blocks; notices sent
/// after the receiver is gone are only logged.
#[derive(Debug, Clone)]
pub struct NoticeSender {
    tx: UnboundedSender<Notice>,
}

pub type NoticeReceiver = UnboundedReceiver<Notice>;

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    let (tx, rx) = unbounded_channel();
    (NoticeSender { tx }, rx)
}

impl NoticeSender {
    pub fn send(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        match level {
            NoticeLevel::Warn | NoticeLevel::Error => warn!("notice: {}", notice.message),
            _ => info!("notice: {}", notice.message),
        }
        let _ = self.tx.send(notice);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Error, message);
    }
}

/// Everything currently queued, without waiting.
pub fn drain(rx: &mut NoticeReceiver) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}
