//! External cancellation of blocking reads.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A flag which interrupts any blocking read on the streams it is attached to.
///
/// Clones share the same flag, so a token can be handed to another thread
/// (or a signal handler) and set from there. A blocking read checks the flag
/// before each wait, so it notices cancellation within one poll period and
/// fails with [`ReadInterrupted`](crate::ErrorKind::ReadInterrupted).
///
/// The flag stays set until [`reset`](Self::reset) is called; until then,
/// every blocking read on the stream fails immediately.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that blocking reads stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag, so that subsequent reads may block again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let remote = token.clone();
        assert!(!token.is_cancelled());

        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }
}
