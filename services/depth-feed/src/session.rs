//! Session loop
//!
//! Serializes every input to the engine on one task: book frames, trade
//! frames, highlight deadlines and shutdown. After each input the current
//! [`BookView`] is published on a watch channel, which is all readers see.
//!
//! Control messages returned by the engine are routed to the transport that
//! owns their channel (book or trades).

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::{BookView, ReconciliationEngine};
use crate::events::{Channel, ControlMessage};

/// Senders for outbound control messages, one per transport.
#[derive(Debug, Clone)]
pub struct ControlRoutes {
    pub book: mpsc::Sender<ControlMessage>,
    pub trades: mpsc::Sender<ControlMessage>,
}

impl ControlRoutes {
    async fn dispatch(&self, messages: Vec<ControlMessage>) {
        for msg in messages {
            let target = match msg.channel() {
                Some(Channel::Book { .. }) => &self.book,
                Some(Channel::Trades { .. }) => &self.trades,
                None => {
                    warn!(args = ?msg.args, "Control message without a known channel");
                    continue;
                }
            };
            debug!(op = ?msg.op, args = ?msg.args, "Routing control message");
            if target.send(msg).await.is_err() {
                warn!("Transport control channel closed");
            }
        }
    }
}

/// The session's side of the transport channels.
#[derive(Debug)]
pub struct FeedChannels {
    pub book_frames: mpsc::Receiver<String>,
    pub trade_frames: mpsc::Receiver<String>,
    pub control: ControlRoutes,
}

/// A transport's side: raw frames in, control messages out.
#[derive(Debug)]
pub struct TransportEnds {
    pub inbound: mpsc::Sender<String>,
    pub control: mpsc::Receiver<ControlMessage>,
}

/// Wire up the session with one book and one trade transport.
pub fn feed_channels(capacity: usize) -> (FeedChannels, TransportEnds, TransportEnds) {
    let (book_tx, book_rx) = mpsc::channel(capacity);
    let (trade_tx, trade_rx) = mpsc::channel(capacity);
    let (book_ctl_tx, book_ctl_rx) = mpsc::channel(capacity);
    let (trade_ctl_tx, trade_ctl_rx) = mpsc::channel(capacity);

    let channels = FeedChannels {
        book_frames: book_rx,
        trade_frames: trade_rx,
        control: ControlRoutes {
            book: book_ctl_tx,
            trades: trade_ctl_tx,
        },
    };
    let book = TransportEnds {
        inbound: book_tx,
        control: book_ctl_rx,
    };
    let trades = TransportEnds {
        inbound: trade_tx,
        control: trade_ctl_rx,
    };
    (channels, book, trades)
}

pub struct Session {
    engine: ReconciliationEngine,
    view: watch::Sender<BookView>,
}

impl Session {
    pub fn new(engine: ReconciliationEngine) -> (Self, watch::Receiver<BookView>) {
        let (view, view_rx) = watch::channel(engine.view());
        (Self { engine, view }, view_rx)
    }

    fn publish(&self) {
        self.view.send_replace(self.engine.view());
    }

    /// Run until shutdown or until both frame streams end. Returns the closed
    /// engine.
    pub async fn run(
        mut self,
        channels: FeedChannels,
        mut shutdown: watch::Receiver<bool>,
    ) -> ReconciliationEngine {
        let FeedChannels {
            mut book_frames,
            mut trade_frames,
            control,
        } = channels;

        control.dispatch(self.engine.open()).await;
        self.publish();

        let mut book_open = true;
        let mut trades_open = true;

        while book_open || trades_open {
            if *shutdown.borrow() {
                break;
            }
            let deadline = self.engine.next_highlight_deadline();

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = sleep_until_or_pending(deadline) => {
                    let cleared = self.engine.expire_highlights(Instant::now());
                    if cleared > 0 {
                        self.publish();
                    }
                }

                frame = book_frames.recv(), if book_open => match frame {
                    Some(raw) => {
                        let out = self.engine.handle_book_message(&raw, Instant::now());
                        control.dispatch(out).await;
                        self.publish();
                    }
                    None => {
                        info!("Book stream ended");
                        book_open = false;
                    }
                },

                frame = trade_frames.recv(), if trades_open => match frame {
                    Some(raw) => {
                        if self.engine.handle_trade_message(&raw) {
                            self.publish();
                        }
                    }
                    None => {
                        info!("Trade stream ended");
                        trades_open = false;
                    }
                },
            }
        }

        control.dispatch(self.engine.close()).await;
        self.publish();
        info!(stats = ?self.engine.stats(), "Session stopped");
        self.engine
    }
}

async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
