use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::fs::watcher::WatchEvent;

/// Events processed by the driver loop, one at a time.
#[derive(Debug)]
pub enum Event {
    /// Directory-watch service output.
    Watch(WatchEvent),
    /// Periodic tick for deferred work.
    Tick,
    /// Ctrl-C.
    Interrupt,
}

/// Single queue all event sources feed, so the model is only touched from
/// the loop that drains it.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler that ticks every `tick_rate` and reports
    /// Ctrl-C.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let tick_tx = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            loop {
                interval.tick().await;
                if tick_tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        let signal_tx = tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = signal_tx.send(Event::Interrupt);
                }
                Err(e) => log::warn!("cannot listen for Ctrl-C: {}", e),
            }
        });

        Self { rx, tx }
    }

    /// Sender for the watcher and other producers.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (waits until one is available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx.recv().await.ok_or(AppError::ChannelClosed)
    }
}
