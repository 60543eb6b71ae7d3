//! Sandbox audit logging
//!
//! Structured records of every security decision the sandbox makes
//! (static rejections, guard denials, refused imports, run outcomes),
//! so an embedding application can reconstruct what a fragment attempted.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Sandbox audit event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// Source rejected before execution began
    StaticRejection { detail: String },
    /// A guard vetoed a mediated operation
    GuardDenied { capability: String, detail: String },
    /// Import refused (allow-list or import guard)
    ImportDenied { module: String },
    /// Run finished normally
    RunCompleted { bindings: usize },
    /// Run terminated with a fault
    RunFaulted { kind: String },
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::StaticRejection { detail } => {
                write!(f, "Static rejection: {}", detail)
            }
            AuditEvent::GuardDenied { capability, detail } => {
                write!(f, "Guard denied: {} on {}", capability, detail)
            }
            AuditEvent::ImportDenied { module } => {
                write!(f, "Import denied: module '{}'", module)
            }
            AuditEvent::RunCompleted { bindings } => {
                write!(f, "Run completed: {} binding(s)", bindings)
            }
            AuditEvent::RunFaulted { kind } => {
                write!(f, "Run faulted: {}", kind)
            }
        }
    }
}

/// Audit log entry with timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Event timestamp (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Audit event
    pub event: AuditEvent,
}

impl AuditEntry {
    /// Create a new audit entry with current timestamp
    pub fn new(event: AuditEvent) -> Self {
        Self {
            timestamp: current_timestamp_ms(),
            event,
        }
    }

    /// Format as log line
    pub fn to_log_line(&self) -> String {
        format!("[{}] {}", format_timestamp(self.timestamp), self.event)
    }
}

/// Get current Unix timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before Unix epoch")
        .as_millis() as u64
}

/// Format timestamp as seconds + milliseconds since epoch
fn format_timestamp(timestamp_ms: u64) -> String {
    let seconds = timestamp_ms / 1000;
    let millis = timestamp_ms % 1000;
    format!("{}+{:03}ms", seconds, millis)
}

/// Audit logger trait for customizable logging backends
pub trait AuditLogger: Send + Sync {
    /// Log an audit event
    fn log(&self, event: AuditEvent);

    /// Get all logged entries (for testing)
    fn entries(&self) -> Vec<AuditEntry>;

    /// Clear all logged entries (for testing)
    fn clear(&self);
}

/// In-memory audit logger (default implementation)
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLogger {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLogger {
    /// Create a new in-memory audit logger
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn log(&self, event: AuditEvent) {
        let entry = AuditEntry::new(event);
        self.entries.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Null audit logger (no-op, for performance)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditLogger;

impl NullAuditLogger {
    /// Create a new null audit logger
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NullAuditLogger {
    fn log(&self, _event: AuditEvent) {
        // No-op
    }

    fn entries(&self) -> Vec<AuditEntry> {
        Vec::new()
    }

    fn clear(&self) {
        // No-op
    }
}
