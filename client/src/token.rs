use std::cell::RefCell;
use std::rc::Rc;

/// Source of the bearer token. Read on every request, never cached.
pub trait TokenProvider {
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String>,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Anonymous access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

/// Single in-memory token slot. Clones share the slot, so the login flow can
/// hold one handle while the client reads through another.
#[derive(Debug, Clone, Default)]
pub struct TokenSlot(Rc<RefCell<Option<String>>>);

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.0.borrow_mut() = Some(token.into());
    }

    pub fn clear(&self) {
        self.0.borrow_mut().take();
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl TokenProvider for TokenSlot {
    fn token(&self) -> Option<String> {
        self.0.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_slot() {
        let slot = TokenSlot::new();
        let reader = slot.clone();
        assert_eq!(reader.token(), None);
        slot.set("abc");
        assert_eq!(reader.token().as_deref(), Some("abc"));
        slot.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn closures_are_providers() {
        let provider = || Some("from-closure".to_string());
        assert_eq!(provider.token().as_deref(), Some("from-closure"));
    }
}
