use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::api::AuthEvent;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal was resized; redraw
  Resize,
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// Authentication state changed
  Auth(AuthEvent),
  /// Backend reachability changed
  Online(bool),
}

/// Merges terminal input, a tick timer and service state changes into one
/// stream.
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll blocks, so the reader gets its own thread
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          Ok(CrosstermEvent::Resize(_, _)) => Event::Resize,
          _ => continue,
        }
      } else {
        Event::Tick
      };
      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Forward every change on a watch channel as an event.
  pub fn forward<T, F>(&self, mut source: watch::Receiver<T>, wrap: F)
  where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Event + Send + 'static,
  {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while source.changed().await.is_ok() {
        let value = source.borrow_and_update().clone();
        if tx.send(wrap(value)).is_err() {
          break;
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_forward_relays_watch_changes() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut handler = EventHandler { tx, rx };
    let (online_tx, online_rx) = watch::channel(true);

    handler.forward(online_rx, Event::Online);
    online_tx.send_replace(false);

    match handler.next().await {
      Some(Event::Online(online)) => assert!(!online),
      other => panic!("unexpected event: {:?}", other),
    }
  }
}
