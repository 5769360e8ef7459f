use super::MessageRouter;
use crate::models::{Envelope, MessageKind};
use indexmap::IndexMap;

type Handler = Box<dyn FnMut(Envelope)>;

/// Routes envelopes to handlers registered per [`MessageKind`].
///
/// Envelopes with no registered handler go to the fallback, or are dropped
/// with a debug log when there is none.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: IndexMap<MessageKind, Handler>,
    fallback: Option<Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any earlier one.
    pub fn on<F>(&mut self, kind: MessageKind, handler: F) -> &mut Self
    where
        F: FnMut(Envelope) + 'static,
    {
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            tracing::debug!("Replaced handler for {:?}", kind);
        }
        self
    }

    /// Handler for kinds without a dedicated entry.
    pub fn fallback<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(Envelope) + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub fn handles(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = MessageKind> + '_ {
        self.handlers.keys().copied()
    }
}

impl MessageRouter for HandlerRegistry {
    fn dispatch(&mut self, envelope: Envelope) {
        let kind = envelope.kind();
        if let Some(handler) = self.handlers.get_mut(&kind) {
            handler(envelope);
        } else if let Some(fallback) = self.fallback.as_mut() {
            fallback(envelope);
        } else {
            tracing::debug!("No handler for {:?}, dropping envelope", kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, NavAction, WindowId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_dispatch_by_kind() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HandlerRegistry::new();

        let nav_seen = seen.clone();
        registry.on(MessageKind::Navigate, move |env| {
            nav_seen.borrow_mut().push(("nav", env.target.window));
        });
        let url_seen = seen.clone();
        registry.on(MessageKind::OpenUrl, move |env| {
            url_seen.borrow_mut().push(("url", env.target.window));
        });

        registry.dispatch(Envelope::new(Message::OpenUrl("x".into())));
        registry.dispatch(
            Envelope::new(Message::Navigate(NavAction::Back)).with_window(WindowId(2)),
        );

        assert_eq!(
            *seen.borrow(),
            vec![("url", None), ("nav", Some(WindowId(2)))]
        );
    }

    #[test]
    fn test_unhandled_goes_to_fallback() {
        let count = Rc::new(RefCell::new(0));
        let mut registry = HandlerRegistry::new();
        let fallback_count = count.clone();
        registry.fallback(move |_| *fallback_count.borrow_mut() += 1);

        registry.dispatch(Envelope::new(Message::AboutRequested));
        registry.dispatch(Envelope::new(Message::Menu(4)));

        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_unhandled_without_fallback_is_dropped() {
        let mut registry = HandlerRegistry::new();
        registry.dispatch(Envelope::new(Message::QuitRequested));
        assert!(!registry.handles(MessageKind::QuitRequested));
    }

    #[test]
    fn test_kinds_in_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry
            .on(MessageKind::QuitRequested, |_| {})
            .on(MessageKind::Menu, |_| {})
            .on(MessageKind::Navigate, |_| {});

        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::QuitRequested,
                MessageKind::Menu,
                MessageKind::Navigate
            ]
        );
    }
}
