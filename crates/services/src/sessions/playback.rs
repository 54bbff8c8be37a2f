use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// What a playback token is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackTarget {
    Calibration,
    /// Trial index.
    Trial(usize),
}

/// Single shared "something is playing" flag.
///
/// At most one token exists at a time. The flag is cleared when the token is
/// dropped, whether playback ended normally or the token was abandoned.
/// Tokens carry the latch generation so a replaced latch can tell its own
/// tokens from stale ones.
#[derive(Clone, Default)]
pub struct PlaybackLatch {
    slot: Arc<Mutex<Option<PlaybackTarget>>>,
    generation: u64,
}

impl PlaybackLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, unheld latch one generation after `self`.
    #[must_use]
    pub fn next_generation(&self) -> Self {
        Self {
            slot: Arc::default(),
            generation: self.generation.wrapping_add(1),
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if `token` was handed out by this latch generation.
    #[must_use]
    pub fn issued(&self, token: &PlaybackToken) -> bool {
        token.generation() == self.generation
    }

    /// Take the latch for `target`; `None` while another playback holds it.
    #[must_use]
    pub fn try_acquire(&self, target: PlaybackTarget, src: impl Into<String>) -> Option<PlaybackToken> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return None;
        }
        *slot = Some(target);
        Some(PlaybackToken {
            target,
            src: src.into(),
            latch: self.clone(),
        })
    }

    #[must_use]
    pub fn holder(&self) -> Option<PlaybackTarget> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.holder().is_some()
    }

    fn release(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for PlaybackLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackLatch")
            .field("holder", &self.holder())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Proof that playback is in progress. Hand it back when the audio ends.
pub struct PlaybackToken {
    target: PlaybackTarget,
    src: String,
    latch: PlaybackLatch,
}

impl PlaybackToken {
    #[must_use]
    pub fn target(&self) -> PlaybackTarget {
        self.target
    }

    /// Audio source the player should start.
    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.latch.generation
    }
}

impl Drop for PlaybackToken {
    fn drop(&mut self) {
        self.latch.release();
    }
}

impl fmt::Debug for PlaybackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackToken")
            .field("target", &self.target)
            .field("src", &self.src)
            .field("generation", &self.generation())
            .finish()
    }
}
