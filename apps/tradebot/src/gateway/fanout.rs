//! Fanout of chat events to every registered listener.
//!
//! Each message is offered to all mailboxes concurrently and the call only
//! returns once every live mailbox has accepted it, so per-listener order
//! follows call order. A full mailbox holds up delivery for everyone; a
//! closed one is dropped from the registry.

use futures_util::future::join_all;

use super::events::Message;
use super::registry::{ListenerId, ListenerRegistry};

/// Deliver a copy of `message` to every registered listener.
/// Returns the number of listeners that received it.
pub async fn deliver(registry: &mut ListenerRegistry, message: &Message) -> usize {
    let sends = registry.sinks().map(|(id, tx)| {
        let message = message.clone();
        async move { (*id, tx.send(message).await.is_ok()) }
    });
    let results = join_all(sends).await;

    let closed: Vec<ListenerId> = results
        .iter()
        .filter(|(_, delivered)| !delivered)
        .map(|(id, _)| *id)
        .collect();
    for id in &closed {
        registry.remove(*id);
        tracing::debug!(listener = id, "pruned closed listener");
    }

    results.len() - closed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use tradebot_common::Channel;

    use crate::gateway::registry::MAILBOX_CAPACITY;

    fn chat(text: &str) -> Message {
        Message::new(text, "alice", Channel::room("clockwork"))
    }

    #[tokio::test]
    async fn every_listener_sees_messages_in_order() {
        let mut registry = ListenerRegistry::new();
        let mut a = registry.add();
        let mut b = registry.add();

        for i in 0..5 {
            assert_eq!(deliver(&mut registry, &chat(&format!("m{i}"))).await, 2);
        }

        for listener in [&mut a, &mut b] {
            for i in 0..5 {
                let m = listener.recv().await.unwrap();
                assert_eq!(m.text, format!("m{i}"));
            }
            assert!(listener.try_recv().is_none());
        }
    }

    #[tokio::test]
    async fn late_listener_only_sees_later_messages() {
        let mut registry = ListenerRegistry::new();
        let mut early = registry.add();
        deliver(&mut registry, &chat("first")).await;
        let mut late = registry.add();
        deliver(&mut registry, &chat("second")).await;

        assert_eq!(early.recv().await.unwrap().text, "first");
        assert_eq!(early.recv().await.unwrap().text, "second");
        assert_eq!(late.recv().await.unwrap().text, "second");
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn delivery_skips_and_prunes_dropped_listeners() {
        let mut registry = ListenerRegistry::new();
        let gone = registry.add();
        let mut kept = registry.add();
        drop(gone);

        assert_eq!(deliver(&mut registry, &chat("hi")).await, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(kept.recv().await.unwrap().text, "hi");
    }

    #[tokio::test]
    async fn full_mailbox_holds_delivery_until_drained() {
        let mut registry = ListenerRegistry::new();
        let mut slow = registry.add();

        for i in 0..MAILBOX_CAPACITY {
            let delivered = deliver(&mut registry, &chat(&format!("m{i}")))
                .now_or_never()
                .expect("mailbox has room");
            assert_eq!(delivered, 1);
        }

        let overflow = chat("overflow");
        let mut pending = Box::pin(deliver(&mut registry, &overflow));
        assert!((&mut pending).now_or_never().is_none());

        assert_eq!(slow.recv().await.unwrap().text, "m0");
        assert_eq!(pending.await, 1);

        for i in 1..MAILBOX_CAPACITY {
            assert_eq!(slow.recv().await.unwrap().text, format!("m{i}"));
        }
        assert_eq!(slow.recv().await.unwrap().text, "overflow");
    }
}
