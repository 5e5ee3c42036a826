//! Ports: single-producer, single-consumer `i64` channels between engines.
//!
//! A port is a sender/receiver pair. Neither half is `Clone`, so each port has
//! exactly one producer and one consumer. Values arrive in send order.
//!
//! | Capacity | Backing | `send` blocks |
//! |----------|---------|---------------|
//! | [`Capacity::Rendezvous`] | `mpsc::channel(1)` plus an ack | until the value is received |
//! | [`Capacity::Bounded`] | `mpsc::channel(n)` | while `n` values are buffered |
//! | [`Capacity::Unbounded`] | `mpsc::unbounded_channel` | never |
//!
//! Only the producer closes a port, by calling [`PortSender::close`] or by
//! dropping the sender. Once closed and empty, [`PortReceiver::recv`] returns
//! `None`.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut tx, mut rx) = intcode_vm::port::unbounded_port();
//! tx.send(7).await.unwrap();
//! tx.close();
//! assert_eq!(rx.recv().await, Some(7));
//! assert_eq!(rx.recv().await, None);
//! # }
//! ```

use thiserror::Error;
use tokio::sync::mpsc;

/// Buffering of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Zero capacity: a send completes only when matched by a receive.
    Rendezvous,
    /// Up to `n` values in flight.
    Bounded(usize),
    /// The producer never blocks.
    Unbounded,
}

impl From<usize> for Capacity {
    fn from(n: usize) -> Self {
        if n == 0 {
            Capacity::Rendezvous
        } else {
            Capacity::Bounded(n)
        }
    }
}

/// The consumer is gone; the value was not delivered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("port closed, value {0} not delivered")]
pub struct PortClosed(pub i64);

/// Why [`PortReceiver::try_recv`] returned nothing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// Nothing buffered, producer still open.
    #[error("port empty")]
    Empty,
    /// Nothing buffered and the producer closed.
    #[error("port closed")]
    Closed,
}

enum SenderInner {
    Rendezvous {
        tx: mpsc::Sender<i64>,
        ack: mpsc::UnboundedReceiver<()>,
    },
    Bounded(mpsc::Sender<i64>),
    Unbounded(mpsc::UnboundedSender<i64>),
}

enum ReceiverInner {
    Rendezvous {
        rx: mpsc::Receiver<i64>,
        ack: mpsc::UnboundedSender<()>,
    },
    Bounded(mpsc::Receiver<i64>),
    Unbounded(mpsc::UnboundedReceiver<i64>),
}

/// Producing half of a port.
pub struct PortSender {
    inner: SenderInner,
}

/// Consuming half of a port.
pub struct PortReceiver {
    inner: ReceiverInner,
}

impl std::fmt::Debug for PortSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl std::fmt::Debug for PortReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortReceiver").finish_non_exhaustive()
    }
}

/// Create a port. `capacity == 0` is a rendezvous.
pub fn port(capacity: usize) -> (PortSender, PortReceiver) {
    with_capacity(Capacity::from(capacity))
}

/// Create a port whose producer never blocks.
pub fn unbounded_port() -> (PortSender, PortReceiver) {
    with_capacity(Capacity::Unbounded)
}

/// Create a port with explicit buffering.
pub fn with_capacity(capacity: Capacity) -> (PortSender, PortReceiver) {
    let (inner_tx, inner_rx) = match capacity {
        Capacity::Rendezvous => {
            let (tx, rx) = mpsc::channel(1);
            let (ack_tx, ack_rx) = mpsc::unbounded_channel();
            (
                SenderInner::Rendezvous { tx, ack: ack_rx },
                ReceiverInner::Rendezvous { rx, ack: ack_tx },
            )
        }
        Capacity::Bounded(n) => {
            let (tx, rx) = mpsc::channel(n.max(1));
            (SenderInner::Bounded(tx), ReceiverInner::Bounded(rx))
        }
        Capacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (SenderInner::Unbounded(tx), ReceiverInner::Unbounded(rx))
        }
    };
    (PortSender { inner: inner_tx }, PortReceiver { inner: inner_rx })
}

impl PortSender {
    /// Send a value, waiting while the port is full.
    ///
    /// On a rendezvous port this returns only once the consumer has taken
    /// the value.
    pub async fn send(&mut self, value: i64) -> Result<(), PortClosed> {
        match &mut self.inner {
            SenderInner::Rendezvous { tx, ack } => {
                tx.send(value).await.map_err(|e| PortClosed(e.0))?;
                // The receiver acks every value it takes. A dropped receiver
                // ends the ack stream with the value still undelivered.
                ack.recv().await.ok_or(PortClosed(value))
            }
            SenderInner::Bounded(tx) => tx.send(value).await.map_err(|e| PortClosed(e.0)),
            SenderInner::Unbounded(tx) => tx.send(value).map_err(|e| PortClosed(e.0)),
        }
    }

    /// True once the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Rendezvous { tx, .. } => tx.is_closed(),
            SenderInner::Bounded(tx) => tx.is_closed(),
            SenderInner::Unbounded(tx) => tx.is_closed(),
        }
    }

    /// Close the port. Buffered values remain readable.
    pub fn close(self) {
        drop(self);
    }
}

impl PortReceiver {
    /// Receive the next value. `None` means closed and drained.
    pub async fn recv(&mut self) -> Option<i64> {
        match &mut self.inner {
            ReceiverInner::Rendezvous { rx, ack } => {
                let value = rx.recv().await?;
                let _ = ack.send(());
                Some(value)
            }
            ReceiverInner::Bounded(rx) => rx.recv().await,
            ReceiverInner::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take a value if one is buffered.
    pub fn try_recv(&mut self) -> Result<i64, TryRecvError> {
        let result = match &mut self.inner {
            ReceiverInner::Rendezvous { rx, ack } => {
                let result = rx.try_recv();
                if result.is_ok() {
                    let _ = ack.send(());
                }
                result
            }
            ReceiverInner::Bounded(rx) => rx.try_recv(),
            ReceiverInner::Unbounded(rx) => rx.try_recv(),
        };
        result.map_err(|e| match e {
            mpsc::error::TryRecvError::Empty => TryRecvError::Empty,
            mpsc::error::TryRecvError::Disconnected => TryRecvError::Closed,
        })
    }

    /// Take everything currently buffered without waiting.
    pub fn drain(&mut self) -> Vec<i64> {
        let mut values = Vec::new();
        while let Ok(value) = self.try_recv() {
            values.push(value);
        }
        values
    }

    /// Read until the producer closes.
    pub async fn collect(mut self) -> Vec<i64> {
        let mut values = Vec::new();
        while let Some(value) = self.recv().await {
            values.push(value);
        }
        values
    }
}
