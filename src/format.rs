//! Turns an execution result into the single message sent back to the user.

use crate::consts::{INSTALLED_PREVIEW, MESSAGE_LIMIT};
use crate::runner::{ExecutionResult, OutputLimits, truncate};

#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    pub limits: OutputLimits,
    /// Final cap on the whole message, in bytes.
    pub message_limit: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            limits: OutputLimits::default(),
            message_limit: MESSAGE_LIMIT,
        }
    }
}

impl Formatter {
    pub fn new(limits: OutputLimits, message_limit: usize) -> Self {
        Self {
            limits,
            message_limit,
        }
    }

    pub fn format(&self, installed: &[String], result: &ExecutionResult) -> String {
        let body = result.render(&self.limits);
        let message = match installed_line(installed) {
            Some(line) => format!("{line}\n\n{body}"),
            None => body,
        };
        truncate(&message, self.message_limit).to_string()
    }
}

/// `Installed: a, b, c` naming at most the first few packages.
fn installed_line(installed: &[String]) -> Option<String> {
    if installed.is_empty() {
        return None;
    }
    let shown = installed
        .iter()
        .take(INSTALLED_PREVIEW)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let more = if installed.len() > INSTALLED_PREVIEW {
        " ..."
    } else {
        ""
    };
    Some(format!("Installed: {shown}{more}"))
}
