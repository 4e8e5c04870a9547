use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

use crate::constants::ACTION_LOG_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
            LogLevel::Debug => "debug",
        }
    }
}

/// One user-facing log line of an action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionLog {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl ActionLog {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

/// Append-only log with a fixed capacity; the oldest entry is evicted first
#[derive(Debug, Clone)]
pub struct ActionLogBuffer {
    entries: VecDeque<ActionLog>,
    capacity: usize,
}

impl ActionLogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ActionLog) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ActionLog> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ActionLogBuffer {
    fn default() -> Self {
        Self::new(ACTION_LOG_CAPACITY)
    }
}
