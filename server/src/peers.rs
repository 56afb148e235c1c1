use crate::room::{short, ConnId, Notifier};
use planning_poker_protocol::ServerToClient;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Outbound queues of every open connection, joined or not.
#[derive(Debug, Default)]
pub struct Peers {
    txs: HashMap<ConnId, UnboundedSender<ServerToClient>>,
}

impl Peers {
    pub fn insert(&mut self, id: ConnId, tx: UnboundedSender<ServerToClient>) {
        self.txs.insert(id, tx);
    }

    pub fn remove(&mut self, id: ConnId) {
        self.txs.remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.txs.len()
    }
}

impl Notifier for Peers {
    fn notify(&self, to: ConnId, event: ServerToClient) {
        if let Some(tx) = self.txs.get(&to) {
            if tx.send(event).is_err() {
                tracing::warn!(conn = %short(to), "send failed, writer gone");
            }
        }
    }

    fn broadcast(&self, event: ServerToClient) {
        for (id, tx) in self.txs.iter() {
            if tx.send(event.clone()).is_err() {
                tracing::warn!(conn = %short(*id), event = event.event_name(), "broadcast failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;
    use uuid::Uuid;

    #[test]
    fn broadcast_reaches_registered_connections_only() {
        let mut peers = Peers::default();
        let (amy, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        peers.insert(amy, tx_a);
        peers.insert(bob, tx_b);
        assert_eq!(peers.len(), 2);

        peers.remove(bob);
        assert_eq!(peers.len(), 1);
        peers.broadcast(ServerToClient::ClearSelections);
        peers.notify(bob, ServerToClient::ClearSelections);

        assert_eq!(rx_a.try_recv().ok(), Some(ServerToClient::ClearSelections));
        assert!(rx_b.try_recv().is_err());
    }
}
