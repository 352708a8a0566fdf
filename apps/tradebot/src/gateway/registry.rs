//! Listener registry: the set of mailboxes that receive every chat event.
//!
//! Owned by the dispatcher task alone, so none of this needs a lock.

use tokio::sync::mpsc;

use super::events::Message;

/// Capacity of each listener's mailbox. A full mailbox stalls fanout until
/// its owner drains it.
pub const MAILBOX_CAPACITY: usize = 16;

pub type ListenerId = u64;

/// A consumer's mailbox. Dropping it closes the mailbox, and the registry
/// prunes it on the next delivery.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::Receiver<Message>,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Next message, or `None` once the registry has let go of this mailbox
    /// and everything buffered has been read.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

/// Registered mailboxes, kept in registration order.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: ListenerId,
    sinks: Vec<(ListenerId, mpsc::Sender<Message>)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh mailbox and register it.
    pub fn add(&mut self) -> Listener {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let id = self.next_id;
        self.next_id += 1;
        self.sinks.push((id, tx));
        Listener { id, rx }
    }

    /// Deregister a mailbox. Unknown ids are ignored.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sink_id, _)| *sink_id != id);
        before != self.sinks.len()
    }

    /// Remove every listener whose receiving half is gone.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.sinks.len();
        self.sinks.retain(|(_, tx)| !tx.is_closed());
        before - self.sinks.len()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.sinks.iter().any(|(sink_id, _)| *sink_id == id)
    }

    pub(crate) fn sinks(&self) -> impl Iterator<Item = &(ListenerId, mpsc::Sender<Message>)> {
        self.sinks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assigns_distinct_ids() {
        let mut registry = ListenerRegistry::new();
        let a = registry.add();
        let b = registry.add();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = ListenerRegistry::new();
        let a = registry.add();
        let b = registry.add();

        assert!(registry.remove(a.id()));
        assert!(!registry.remove(a.id()));
        assert!(!registry.remove(9999));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(b.id()));
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let mut registry = ListenerRegistry::new();
        let a = registry.add();
        let b = registry.add();
        drop(a);

        assert_eq!(registry.prune_closed(), 1);
        assert!(registry.contains(b.id()));
        assert_eq!(registry.len(), 1);
    }
}
