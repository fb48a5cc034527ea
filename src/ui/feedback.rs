//! Terminal implementations of the confirm and notify capabilities.
//!
//! Both post to the app's event loop; the loop owns the modal and the
//! toast line, so background tasks never touch UI state directly.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::cache::{Confirm, Notify};
use crate::event::{ConfirmRequest, Event};

/// How long a toast stays on screen
pub const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
  Success,
  Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
  pub message: String,
  pub level: ToastLevel,
  pub shown_at: Instant,
}

impl Toast {
  pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level,
      shown_at: Instant::now(),
    }
  }

  pub fn is_expired(&self) -> bool {
    self.shown_at.elapsed() >= TOAST_TTL
  }
}

/// Raises the in-app confirmation modal and waits for the answer.
pub struct ModalConfirm {
  tx: mpsc::UnboundedSender<Event>,
}

impl ModalConfirm {
  pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
    Self { tx }
  }
}

#[async_trait]
impl Confirm for ModalConfirm {
  async fn confirm(&self, message: &str) -> bool {
    let (reply, answer) = oneshot::channel();
    let request = ConfirmRequest {
      message: message.to_string(),
      reply,
    };
    if self.tx.send(Event::Confirm(request)).is_err() {
      debug!("event loop gone, treating confirmation as declined");
      return false;
    }
    // A dismissed modal drops the sender
    answer.await.unwrap_or(false)
  }
}

/// Shows mutation outcomes on the toast line.
pub struct ToastNotify {
  tx: mpsc::UnboundedSender<Event>,
}

impl ToastNotify {
  pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
    Self { tx }
  }

  fn post(&self, level: ToastLevel, message: &str) {
    let _ = self.tx.send(Event::Toast(Toast::new(level, message)));
  }
}

impl Notify for ToastNotify {
  fn success(&self, message: &str) {
    self.post(ToastLevel::Success, message);
  }

  fn error(&self, message: &str) {
    self.post(ToastLevel::Error, message);
  }
}
