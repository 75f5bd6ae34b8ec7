//! Tokio driver wrapping an edit session.
//!
//! One task per open session: it owns the state machine, ticks the flush
//! timer and relays flushed edits to the engine, keeping at most one
//! submission in flight. Session owners talk to the task through
//! [`SessionHandle`] and hear back through the signal channel returned at
//! open time.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{Instrument, debug, info_span, warn};

use crate::Result;
use crate::card::CardId;
use crate::delta::Delta;
use crate::sync::EngineHandle;

use super::{EditSession, SessionSignal, errors::SessionError};

/// Commands a handle can send to its driver task
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Record one delta into the session
    Record {
        delta: Delta,
        reply: oneshot::Sender<std::result::Result<(), SessionError>>,
    },
    /// Flush accumulated changes now instead of on the next tick
    Flush { reply: oneshot::Sender<()> },
    /// Close the session, flushing anything still pending
    Close { reply: oneshot::Sender<()> },
}

/// Start the driver task for `session` and return its front end.
pub(crate) fn spawn(
    session: EditSession,
    engine: EngineHandle,
    flush_interval: Duration,
    command_capacity: usize,
    signal_capacity: usize,
) -> (SessionHandle, mpsc::Receiver<SessionSignal>) {
    let (command_tx, command_rx) = mpsc::channel(command_capacity);
    let (signal_tx, signal_rx) = mpsc::channel(signal_capacity);
    let card = session.card();

    let driver = SessionDriver {
        session,
        engine,
        signal_tx,
        command_rx,
    };
    tokio::spawn(driver.run(flush_interval));

    (SessionHandle { card, command_tx }, signal_rx)
}

/// Cloneable front end of a running edit session.
///
/// Every method is a round trip to the driver task. A
/// [`SessionError::Disconnected`] means the driver has stopped, which
/// happens after a close or when the engine goes away.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    card: CardId,
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The card this session edits.
    pub fn card(&self) -> CardId {
        self.card
    }

    /// Record one delta over the session's view of the card.
    pub async fn record_change(&self, delta: Delta) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Record { delta, reply: tx })
            .await
            .map_err(|_| SessionError::Disconnected)?;
        rx.await.map_err(|_| SessionError::Disconnected)??;
        Ok(())
    }

    /// Flush accumulated changes now instead of waiting for the timer.
    ///
    /// Returns once the flush, if one was due, has been answered by the
    /// engine.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Flush { reply: tx })
            .await
            .map_err(|_| SessionError::Disconnected)?;
        rx.await.map_err(|_| SessionError::Disconnected)?;
        Ok(())
    }

    /// Close the session, flushing anything still pending.
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Close { reply: tx })
            .await
            .map_err(|_| SessionError::Disconnected)?;
        rx.await.map_err(|_| SessionError::Disconnected)?;
        Ok(())
    }
}

/// The task side: one session, one engine connection, one timer.
struct SessionDriver {
    session: EditSession,
    engine: EngineHandle,
    signal_tx: mpsc::Sender<SessionSignal>,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionDriver {
    /// Main event loop: commands interleaved with flush ticks.
    async fn run(mut self, flush_interval: Duration) {
        let card = self.session.card();
        async move {
            let mut flush_timer = interval(flush_interval);
            // Skip the initial tick; there is nothing to flush yet
            flush_timer.tick().await;

            loop {
                tokio::select! {
                    cmd = self.command_rx.recv() => match cmd {
                        Some(SessionCommand::Record { delta, reply }) => {
                            let _ = reply.send(self.session.record_change(&delta));
                        }
                        Some(SessionCommand::Flush { reply }) => {
                            let engine_alive = self.flush_once().await;
                            let _ = reply.send(());
                            if !engine_alive {
                                self.close_out().await;
                                break;
                            }
                        }
                        Some(SessionCommand::Close { reply }) => {
                            self.close_out().await;
                            let _ = reply.send(());
                            break;
                        }
                        // All handles dropped: close out with a final flush
                        None => {
                            self.close_out().await;
                            break;
                        }
                    },

                    _ = flush_timer.tick() => {
                        if !self.flush_once().await {
                            self.close_out().await;
                            break;
                        }
                    }
                }
            }
        }
        .instrument(info_span!("edit_session", card = %card))
        .await
    }

    /// Submit the accumulated changes, if any, and feed back the outcome.
    ///
    /// Returns false when the engine is unreachable and the session should
    /// wind down.
    async fn flush_once(&mut self) -> bool {
        let Some(edit) = self.session.take_flush() else {
            return true;
        };
        match self.engine.content_edit(edit).await {
            Ok(outcome) => {
                if let Some(signal) = self.session.resolve(&outcome) {
                    self.send_signal(signal);
                }
                true
            }
            Err(e) => {
                warn!("Flush failed, engine is gone: {e}");
                false
            }
        }
    }

    /// Final flush, then tell the owner the session is over.
    async fn close_out(&mut self) {
        let card = self.session.card();
        if let Some(edit) = self.session.close() {
            match self.engine.content_edit(edit).await {
                Ok(outcome) => {
                    if let Some(signal) = self.session.resolve(&outcome) {
                        self.send_signal(signal);
                    }
                }
                Err(e) => debug!("Final flush for card {card} not delivered: {e}"),
            }
        }
        self.send_signal(SessionSignal::Closed { card });
    }

    /// Hand a signal to the owner without ever blocking the driver.
    fn send_signal(&self, signal: SessionSignal) {
        if let Err(e) = self.signal_tx.try_send(signal) {
            debug!("Session signal not delivered: {e}");
        }
    }
}
