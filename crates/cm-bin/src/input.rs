//! Async keyboard input for the presentation loop: a spawned task reads
//! crossterm's `EventStream`, maps presses onto presenter commands, and
//! pushes them into the runtime channel until told to stop.

use crossterm::event::{
    Event as CEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterKey {
    Advance,
    Back,
    Reconnect,
    Quit,
}

#[derive(Clone, Debug)]
pub struct InputShutdown {
    notify: Arc<Notify>,
}

impl InputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

pub fn spawn_input_task(tx: Sender<PresenterKey>) -> (JoinHandle<()>, InputShutdown) {
    let notify = Arc::new(Notify::new());
    let shutdown = InputShutdown {
        notify: notify.clone(),
    };
    let handle = tokio::spawn(async move {
        let mut stream = EventStream::new();
        loop {
            tokio::select! {
                _ = notify.notified() => {
                    trace!(target: "runtime.input", "input_task_shutdown");
                    break;
                }
                event = stream.next() => match event {
                    Some(Ok(CEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(mapped) = map_key(&key) {
                            if tx.send(mapped).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(target: "runtime.input", ?err, "input_stream_error");
                        break;
                    }
                    None => break,
                }
            }
        }
    });
    (handle, shutdown)
}

fn map_key(key: &KeyEvent) -> Option<PresenterKey> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(PresenterKey::Quit);
    }
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Right | KeyCode::Down => {
            Some(PresenterKey::Advance)
        }
        KeyCode::Char('b') | KeyCode::Left => Some(PresenterKey::Back),
        KeyCode::Char('r') => Some(PresenterKey::Reconnect),
        KeyCode::Char('q') | KeyCode::Esc => Some(PresenterKey::Quit),
        _ => None,
    }
}
