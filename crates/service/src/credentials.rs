use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Bearer token shared by every content client.
///
/// Swapped atomically when the user pastes or clears a token; readers take a
/// snapshot per request and never block.
#[derive(Clone, Default)]
pub struct Credential {
    token: Arc<ArcSwapOption<String>>,
}

impl Credential {
    pub fn new(token: Option<String>) -> Self {
        let c = Self::default();
        c.set(token);
        c
    }

    /// Replace the token; blank input clears it.
    pub fn set(&self, token: Option<String>) {
        let token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self.token.store(token.map(Arc::new));
    }

    pub fn get(&self) -> Option<Arc<String>> {
        self.token.load_full()
    }

    pub fn is_configured(&self) -> bool {
        self.token.load().is_some()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("configured", &self.is_configured()).finish()
    }
}
