//! Owner identity used to partition notes in storage.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info};

/// Local storage key holding the persisted identity.
pub const IDENTITY_STORAGE_KEY: &str = "userId";

pub const IDENTITY_PROMPT: &str = "Enter your username/email to separate your notes:";

/// A non-empty, trimmed user identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix every key owned by this identity starts with.
    pub fn key_prefix(&self) -> String {
        format!("{}/", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asks the user for an identity. `None` means the prompt was cancelled.
pub trait IdentityProvider {
    fn prompt(&self, message: &str) -> Option<String>;
}

#[async_trait(?Send)]
pub trait IdentityStore {
    async fn load(&self) -> Option<String>;
    async fn save(&self, identity: &Identity);
}

/// Resolves the identity once per session: the in-memory value, then the
/// persistent store, then a prompt.
pub struct IdentityResolver {
    provider: Box<dyn IdentityProvider>,
    store: Box<dyn IdentityStore>,
    cached: RefCell<Option<Identity>>,
}

impl IdentityResolver {
    pub fn new(
        provider: impl IdentityProvider + 'static,
        store: impl IdentityStore + 'static,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            store: Box::new(store),
            cached: RefCell::new(None),
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.cached.borrow().clone()
    }

    pub async fn ensure_identity(&self) -> Option<Identity> {
        if let Some(identity) = self.current() {
            return Some(identity);
        }

        if let Some(identity) = self.store.load().await.as_deref().and_then(Identity::parse) {
            debug!(%identity, "identity loaded from storage");
            *self.cached.borrow_mut() = Some(identity.clone());
            return Some(identity);
        }

        let answer = self.provider.prompt(IDENTITY_PROMPT)?;
        let identity = Identity::parse(&answer)?;
        self.store.save(&identity).await;
        info!(%identity, "identity set");
        *self.cached.borrow_mut() = Some(identity.clone());
        Some(identity)
    }
}

/// Provider that answers every prompt with the same value and counts how
/// often it was asked.
pub struct FixedIdentity {
    answer: Option<String>,
    prompts: Rc<Cell<usize>>,
}

impl FixedIdentity {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            prompts: Rc::default(),
        }
    }

    /// A provider whose prompt is always cancelled.
    pub fn cancelled() -> Self {
        Self {
            answer: None,
            prompts: Rc::default(),
        }
    }

    pub fn prompt_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.prompts)
    }
}

impl IdentityProvider for FixedIdentity {
    fn prompt(&self, _message: &str) -> Option<String> {
        self.prompts.set(self.prompts.get() + 1);
        self.answer.clone()
    }
}

#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    value: Rc<RefCell<Option<String>>>,
}

impl MemoryIdentityStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Rc::new(RefCell::new(Some(value.into()))),
        }
    }

    pub fn value(&self) -> Option<String> {
        self.value.borrow().clone()
    }
}

#[async_trait(?Send)]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self) -> Option<String> {
        self.value()
    }

    async fn save(&self, identity: &Identity) {
        *self.value.borrow_mut() = Some(identity.as_str().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_rejects_blank() {
        assert_eq!(Identity::parse("  alice ").unwrap().as_str(), "alice");
        assert_eq!(Identity::parse("   "), None);
        assert_eq!(Identity::parse("bob").unwrap().key_prefix(), "bob/");
    }

    #[tokio::test]
    async fn stored_identity_skips_the_prompt() {
        let provider = FixedIdentity::new("mallory");
        let prompts = provider.prompt_counter();
        let resolver = IdentityResolver::new(provider, MemoryIdentityStore::with_value("alice"));

        assert_eq!(resolver.ensure_identity().await.unwrap().as_str(), "alice");
        assert_eq!(prompts.get(), 0);
    }

    #[tokio::test]
    async fn prompted_identity_is_persisted_and_cached() {
        let provider = FixedIdentity::new("  carol  ");
        let prompts = provider.prompt_counter();
        let store = MemoryIdentityStore::default();
        let resolver = IdentityResolver::new(provider, store.clone());

        assert_eq!(resolver.ensure_identity().await.unwrap().as_str(), "carol");
        assert_eq!(resolver.ensure_identity().await.unwrap().as_str(), "carol");
        assert_eq!(prompts.get(), 1);
        assert_eq!(store.value().as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn cancelled_or_blank_prompt_yields_nothing() {
        let store = MemoryIdentityStore::default();
        let resolver = IdentityResolver::new(FixedIdentity::cancelled(), store.clone());
        assert_eq!(resolver.ensure_identity().await, None);

        let resolver = IdentityResolver::new(FixedIdentity::new("   "), store.clone());
        assert_eq!(resolver.ensure_identity().await, None);
        assert_eq!(store.value(), None);
    }
}
