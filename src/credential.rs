//! Tracks whether the user has a usable API key selected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "credential selected" flag.
///
/// Clones observe the same flag. Video generation is gated on it, and an
/// invalid-key response from the provider clears it so the user is asked again.
#[derive(Debug, Clone, Default)]
pub struct CredentialGate {
    selected: Arc<AtomicBool>,
}

impl CredentialGate {
    /// Creates a gate in the given state.
    pub fn new(selected: bool) -> Self {
        Self {
            selected: Arc::new(AtomicBool::new(selected)),
        }
    }

    /// Returns true if a key is currently selected.
    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    /// Marks a key as selected.
    pub fn select(&self) {
        self.selected.store(true, Ordering::SeqCst);
    }

    /// Requires the user to select a key again.
    pub fn invalidate(&self) {
        if self.selected.swap(false, Ordering::SeqCst) {
            tracing::warn!("API key rejected by provider; key selection required");
        }
    }
}
