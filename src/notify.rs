// src/notify.rs

use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-facing message about an import (the dashboard's toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(level: Level, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sends notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Success | Level::Info => info!(title = %n.title, "{}", n.message),
            Level::Warning => warn!(title = %n.title, "{}", n.message),
            Level::Error => error!(title = %n.title, "{}", n.message),
        }
    }
}

/// Keeps every notification so the caller can inspect or replay them.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, n: Notification) {
        LogNotifier.notify(n.clone());
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(n);
    }
}
