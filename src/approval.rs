//! Approval of proposed device changes.
//!
//! The gate is chosen once per run: [`ForceApproval`] confirms everything,
//! [`InteractiveApproval`] asks an operator on a line-oriented stream.

use async_trait::async_trait;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::types::{DesiredInterface, MutationAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Confirmed,
    Declined,
    /// The operator went away (end of input); the run should stop.
    Cancelled,
}

/// A change waiting for approval.
#[derive(Debug, Clone)]
pub struct ApprovalRequest<'a> {
    pub desired: &'a DesiredInterface,
    pub action: MutationAction,
    /// What the device currently reports, for display.
    pub observed: &'a str,
}

impl ApprovalRequest<'_> {
    fn question(&self) -> &'static str {
        match self.action {
            MutationAction::Create => "Do you confirm to add interface and IP address? (Y/N) ",
            MutationAction::Update => "Do you confirm to change IP address? (Y/N) ",
            MutationAction::Delete => "Do you confirm to delete interface? (Y/N) ",
        }
    }
}

#[async_trait]
pub trait ApprovalGate: Send {
    async fn approve(&mut self, request: &ApprovalRequest<'_>) -> Result<Approval>;

    /// True when approvals are granted without asking anyone.
    fn is_automatic(&self) -> bool;
}

/// Force mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForceApproval;

#[async_trait]
impl ApprovalGate for ForceApproval {
    async fn approve(&mut self, request: &ApprovalRequest<'_>) -> Result<Approval> {
        info!(
            "Force mode: {} of {} {} approved",
            request.action,
            request.desired.interface_name,
            request.desired.cidr()
        );
        Ok(Approval::Confirmed)
    }

    fn is_automatic(&self) -> bool {
        true
    }
}

/// Asks on `output`, reads answers from `input` until it gets `y` or `n`.
pub struct InteractiveApproval<R, W> {
    input: R,
    output: W,
}

impl<R, W> InteractiveApproval<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl InteractiveApproval<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

#[async_trait]
impl<R, W> ApprovalGate for InteractiveApproval<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn approve(&mut self, request: &ApprovalRequest<'_>) -> Result<Approval> {
        let summary = format!(
            "{} {}: inventory {}, device {}\n",
            request.desired.device_name,
            request.desired.interface_name,
            request.desired.cidr(),
            request.observed
        );
        self.output.write_all(summary.as_bytes()).await?;

        loop {
            self.output.write_all(request.question().as_bytes()).await?;
            self.output.flush().await?;

            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                warn!("Approval input closed, cancelling run");
                return Ok(Approval::Cancelled);
            }

            match line.trim().to_ascii_lowercase().as_str() {
                "y" => return Ok(Approval::Confirmed),
                "n" => return Ok(Approval::Declined),
                _ => {
                    self.output
                        .write_all(b"Please answer with 'y' or 'n'.\n")
                        .await?;
                }
            }
        }
    }

    fn is_automatic(&self) -> bool {
        false
    }
}
