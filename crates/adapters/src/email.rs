// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched operator email.
//!
//! Infrastructure failures are queued during a scheduling cycle and sent as
//! a single message at the end of it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Separator between queued notifications in one batch.
const SEPARATOR: &str = "----------------------------------------";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: std::process::ExitStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// RFC 822 text with headers.
    pub fn to_rfc822(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\n\n{}\n",
            self.from,
            self.to.join(", "),
            self.subject,
            self.body
        )
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Hands messages to the local mail relay through its `sendmail` binary.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    program: PathBuf,
}

impl SendmailTransport {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for SendmailTransport {
    fn default() -> Self {
        Self::new("/usr/sbin/sendmail")
    }
}

#[async_trait]
impl MailTransport for SendmailTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let program = self.program.display().to_string();
        let spawn_err = |source| MailError::Spawn { program: program.clone(), source };
        let mut child = tokio::process::Command::new(&self.program)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.to_rfc822().as_bytes()).await.map_err(spawn_err)?;
        }
        let status = child.wait().await.map_err(spawn_err)?;
        if !status.success() {
            return Err(MailError::Exit { program, status });
        }
        Ok(())
    }
}

/// Split a recipient setting on commas, semicolons, colons and whitespace.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c == ':' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Login name of the user running the scheduler.
pub fn current_user() -> String {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|user| user.name)
        .unwrap_or_else(|| "tbd".to_string())
}

fn local_hostname() -> String {
    hostname::get().map(|h| h.to_string_lossy().into_owned()).unwrap_or_else(|_| "localhost".into())
}

/// Queues notification emails and sends them as one batch.
pub struct EmailNotificationManager {
    from: String,
    to: Vec<String>,
    hostname: String,
    queued: Vec<String>,
    transport: Arc<dyn MailTransport>,
}

impl EmailNotificationManager {
    /// `from` defaults to the current user; `to` is a delimited recipient list.
    pub fn new(from: Option<String>, to: &str, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            from: from.filter(|f| !f.is_empty()).unwrap_or_else(current_user),
            to: parse_recipients(to),
            hostname: local_hostname(),
            queued: Vec::new(),
            transport,
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    pub fn queued(&self) -> &[String] {
        &self.queued
    }

    /// Queue one notification. Does nothing when no recipient is configured.
    pub fn enqueue_notify_email(&mut self, subject: &str, message: &str) {
        warn!(%subject, "notification: {message}");
        if self.to.is_empty() {
            return;
        }
        let body = format!(
            "Subject: {subject}\nHost: {}\nPID: {}\nTimestamp: {}\n{message}",
            self.hostname,
            std::process::id(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        );
        self.queued.push(body);
    }

    /// Record an unexpected error and queue it for the operators.
    pub fn log_stacktrace(&mut self, reason: &str, err: &dyn std::error::Error) {
        let mut chain = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push_str(&format!("\ncaused by: {cause}"));
            source = cause.source();
        }
        error!(%reason, error = %chain, "unexpected scheduler error");
        self.enqueue_notify_email(&format!("EXCEPTION: {reason}"), &chain);
    }

    /// Send everything queued as one message, then clear the queue.
    pub async fn send_queued_emails(&mut self) {
        if self.queued.is_empty() {
            return;
        }
        let message = MailMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: format!("Scheduler notifications from {}", self.hostname),
            body: self.queued.join(&format!("\n{SEPARATOR}\n")),
        };
        let count = self.queued.len();
        self.queued.clear();
        match self.transport.send(&message).await {
            Ok(()) => info!(count, recipients = message.to.len(), "sent notification email"),
            Err(e) => error!(count, error = %e, "failed to send notification email"),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{MailError, MailMessage, MailTransport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records messages instead of sending them.
    #[derive(Clone, Default)]
    pub struct FakeMailTransport {
        sent: Arc<Mutex<Vec<MailMessage>>>,
    }

    impl FakeMailTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<MailMessage> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl MailTransport for FakeMailTransport {
        async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMailTransport;

#[cfg(test)]
#[path = "email_tests.rs"]
mod tests;
