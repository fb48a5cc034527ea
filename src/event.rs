use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::ui::feedback::Toast;

/// A yes/no question raised from a background task, answered by the modal.
#[derive(Debug)]
pub struct ConfirmRequest {
  pub message: String,
  pub reply: oneshot::Sender<bool>,
}

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and subscription polling
  Tick,
  /// Outcome message from a mutation
  Toast(Toast),
  /// A mutation waits for the user to confirm
  Confirm(ConfirmRequest),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal reads block, keep them off the runtime workers
    let reader = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if key.kind == KeyEventKind::Press && reader.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if reader.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Sender for background tasks that need to reach the event loop
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
