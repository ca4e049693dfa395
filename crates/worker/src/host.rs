//! JSON-lines host transport.
//!
//! The host (the process embedding the application's pages) writes one
//! [`Inbound`] envelope per line and reads [`Outbound`] lines back: a reply
//! per event, plus commands such as "show this notification". Each event
//! runs on its own task; replies are written in completion order and carry
//! the event id.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use minaret_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::controller::{ActivateReport, CacheController, InstallReport, Lifecycle};
use crate::error::WireError;
use crate::events::{EventOutcome, WorkerEvent};
use crate::notify::{Clients, Notification, Notifier, WindowClient};

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    pub id: u64,
    pub event: WorkerEvent,
}

/// One outbound line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    Reply {
        /// Absent only when the inbound line was too broken to carry an id.
        id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<EventOutcome>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<WireError>,
    },
    ShowNotification {
        notification: Notification,
    },
    CloseNotification {
        tag: String,
    },
    FocusWindow {
        client_id: String,
    },
    OpenWindow {
        url: String,
    },
    Claimed {
        client_ids: Vec<String>,
    },
    /// Lifecycle change the host did not ask for directly.
    StateChanged {
        state: Lifecycle,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report: Option<ActivateReport>,
    },
}

impl Outbound {
    pub fn reply(id: u64, result: &Result<EventOutcome, Error>) -> Self {
        match result {
            Ok(outcome) => Outbound::Reply { id: Some(id), outcome: Some(outcome.clone()), error: None },
            Err(e) => Outbound::Reply { id: Some(id), outcome: None, error: Some(WireError::from(e)) },
        }
    }

    pub fn error(id: Option<u64>, error: WireError) -> Self {
        Outbound::Reply { id, outcome: None, error: Some(error) }
    }
}

/// Notifier and window registry that forward everything to the host.
#[derive(Debug)]
pub struct StdioHost {
    outbox: mpsc::UnboundedSender<Outbound>,
    windows: Mutex<Vec<WindowClient>>,
}

impl StdioHost {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { outbox, windows: Mutex::new(Vec::new()) }), rx)
    }

    pub fn send(&self, message: Outbound) -> Result<(), Error> {
        self.outbox.send(message).map_err(|_| Error::HostClosed)
    }

    fn windows(&self) -> std::sync::MutexGuard<'_, Vec<WindowClient>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for StdioHost {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        self.send(Outbound::ShowNotification { notification: notification.clone() })
    }

    async fn close(&self, tag: &str) -> Result<(), Error> {
        self.send(Outbound::CloseNotification { tag: tag.to_string() })
    }
}

#[async_trait]
impl Clients for StdioHost {
    async fn register(&self, client: WindowClient) -> Result<(), Error> {
        let mut windows = self.windows();
        windows.retain(|w| w.id != client.id);
        windows.push(client);
        Ok(())
    }

    async fn unregister(&self, id: &str) -> Result<bool, Error> {
        let mut windows = self.windows();
        let before = windows.len();
        windows.retain(|w| w.id != id);
        Ok(windows.len() != before)
    }

    async fn match_all(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.windows().clone())
    }

    async fn claim(&self) -> Result<usize, Error> {
        let client_ids: Vec<String> = self.windows().iter().map(|w| w.id.clone()).collect();
        let count = client_ids.len();
        self.send(Outbound::Claimed { client_ids })?;
        Ok(count)
    }

    async fn focus(&self, id: &str) -> Result<(), Error> {
        if !self.windows().iter().any(|w| w.id == id) {
            return Err(Error::InvalidInput(format!("unknown client {id}")));
        }
        self.send(Outbound::FocusWindow { client_id: id.to_string() })
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        self.send(Outbound::OpenWindow { url: url.to_string() })
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, message: &Outbound) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}

/// Dispatch one event and report back. After a successful install the
/// generation activates straight away, as it asked to skip waiting.
async fn handle(controller: Arc<CacheController>, host: Arc<StdioHost>, inbound: Inbound) {
    let Inbound { id, event } = inbound;
    let span = tracing::info_span!("event", id, kind = event.kind());

    async move {
        let result = controller.dispatch(event).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "event failed");
        }

        let skip_waiting = matches!(&result, Ok(EventOutcome::Installed(InstallReport { skip_waiting: true, .. })));
        if host.send(Outbound::reply(id, &result)).is_err() {
            return;
        }

        if skip_waiting {
            match controller.skip_waiting().await {
                Ok(Some(report)) => {
                    let _ = host.send(Outbound::StateChanged { state: controller.state(), report: Some(report) });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "activation after install failed"),
            }
        }
    }
    .instrument(span)
    .await
}

/// Serve events from `input` until EOF, writing replies and commands to
/// `output`.
///
/// On EOF, or when reading `input` fails, every in-flight event is allowed
/// to finish, pending snoozes are cancelled and the remaining outbound
/// messages are flushed. A read failure is returned after that.
pub async fn serve<R, W>(
    controller: Arc<CacheController>, host: Arc<StdioHost>, mut outbox: mpsc::UnboundedReceiver<Outbound>, mut input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (done_tx, mut done_rx) = oneshot::channel::<()>();

    let writer = async {
        loop {
            tokio::select! {
                message = outbox.recv() => match message {
                    Some(message) => write_line(&mut output, &message).await?,
                    None => break,
                },
                _ = &mut done_rx => {
                    while let Ok(message) = outbox.try_recv() {
                        write_line(&mut output, &message).await?;
                    }
                    break;
                }
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    let reader = async {
        let mut frame = Vec::new();
        let mut in_flight = JoinSet::new();

        let read_result = loop {
            frame.clear();
            match input.read_until(b'\n', &mut frame).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }

            let line = frame.trim_ascii();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<Inbound>(line) {
                Ok(inbound) => {
                    in_flight.spawn(handle(controller.clone(), host.clone(), inbound));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparseable line");
                    let id = serde_json::from_slice::<Value>(line)
                        .ok()
                        .and_then(|v| v.get("id").and_then(Value::as_u64));
                    let _ = host.send(Outbound::error(id, WireError::parse(e.to_string())));
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "event task panicked");
                }
            }
        };

        match &read_result {
            Ok(()) => tracing::info!(in_flight = in_flight.len(), "input closed; finishing in-flight events"),
            Err(e) => tracing::error!(error = %e, in_flight = in_flight.len(), "reading input failed; finishing in-flight events"),
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "event task panicked");
            }
        }

        controller.shutdown();
        let _ = done_tx.send(());
        read_result.map_err(anyhow::Error::from)
    };

    let (read, written) = tokio::join!(reader, writer);
    read?;
    written?;
    Ok(())
}
