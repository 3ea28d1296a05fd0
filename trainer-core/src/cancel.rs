//! Cancellation for in-flight captures and evaluations.
//!
//! A token is the receiving end of a channel that never carries a message:
//! it becomes cancelled when the matching handle cancels or is dropped.
//! Because it is a channel, a token can sit in a `select!` next to a tick
//! receiver.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Owner side. Cancelling (or dropping) it cancels every token cloned from
/// the pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(&mut self) {
        if self.tx.take().is_some() {
            tracing::debug!("cancellation requested");
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self {
            rx: crossbeam_channel::never(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Ok(()) | Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready once cancelled, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (CancelHandle { tx: Some(tx) }, CancelToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_all_clones() {
        let (mut handle, token) = cancel_pair();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn dropping_handle_cancels() {
        let (handle, token) = cancel_pair();
        drop(handle);
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_stays_live() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
