//! Signaling relay rooms.
//!
//! Rooms are keyed by session correlation id. The room map lock is held
//! only for map mutation; each room's member set has its own lock, and
//! every member is an unbounded sender into that connection's writer task.
//! A slow or closed peer therefore never blocks delivery to the others,
//! and per-sender ordering is preserved by the channel.

pub mod socket;

use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Outbound half of one signaling connection.
pub type MemberSender = mpsc::UnboundedSender<String>;

#[derive(Default)]
struct Room {
    members: RwLock<HashMap<Uuid, MemberSender>>,
}

/// Holds all active signaling rooms.
#[derive(Default)]
pub struct SignalingRelay {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl SignalingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the room for `session_id`, creating the room on
    /// first join. Returns the member count after the join.
    pub async fn join(&self, session_id: &str, conn_id: Uuid, sender: MemberSender) -> usize {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(session_id.to_string())
            .or_default()
            .clone();

        // Insert while still holding the map lock: a concurrent last-member
        // leave re-checks emptiness under that lock, so it either sees this
        // member or has already removed the room before the entry above
        // recreated it. Releasing the map lock first would let the room be
        // removed underneath the joiner.
        let count = {
            let mut members = room.members.write().await;
            members.insert(conn_id, sender);
            members.len()
        };
        metrics::set_relay_rooms(rooms.len());
        drop(rooms);

        debug!(
            target: "cc.relay",
            session_id,
            conn_id = %conn_id,
            member_count = count,
            "Peer joined signaling room"
        );
        count
    }

    /// Forward `text` verbatim to every member of the room except `sender`.
    ///
    /// Send failures mean the peer's writer task is gone; its disconnect
    /// cleanup will remove it, so failures are ignored here.
    pub async fn broadcast_except(&self, session_id: &str, sender: Uuid, text: &str) {
        let Some(room) = self.rooms.read().await.get(session_id).cloned() else {
            return;
        };

        for (conn_id, member) in room.members.read().await.iter() {
            if *conn_id != sender {
                let _ = member.send(text.to_string());
            }
        }
    }

    /// Remove a connection from its room, dropping the room when it
    /// empties. Returns the number of remaining members, or `None` if the
    /// connection was not in the room.
    pub async fn leave(&self, session_id: &str, conn_id: Uuid) -> Option<usize> {
        let room = self.rooms.read().await.get(session_id).cloned()?;

        let remaining = {
            let mut members = room.members.write().await;
            members.remove(&conn_id)?;
            members.len()
        };

        if remaining == 0 {
            let mut rooms = self.rooms.write().await;
            // Re-check under the map lock: a new peer may have joined the
            // room between the member removal and now.
            let still_empty = match rooms.get(session_id) {
                Some(room) => room.members.read().await.is_empty(),
                None => false,
            };
            if still_empty {
                rooms.remove(session_id);
            }
            metrics::set_relay_rooms(rooms.len());
        }

        debug!(
            target: "cc.relay",
            session_id,
            conn_id = %conn_id,
            remaining,
            "Peer left signaling room"
        );
        Some(remaining)
    }

    /// Number of currently open rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn member() -> (Uuid, MemberSender, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Uuid::new_v4(), tx, rx)
    }

    #[tokio::test]
    async fn test_join_counts_members() {
        let relay = SignalingRelay::new();
        let (a, a_tx, _a_rx) = member();
        let (b, b_tx, _b_rx) = member();

        assert_eq!(relay.join("room-1", a, a_tx).await, 1);
        assert_eq!(relay.join("room-1", b, b_tx).await, 2);
        assert_eq!(relay.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let relay = SignalingRelay::new();
        let (a, a_tx, mut a_rx) = member();
        let (b, b_tx, mut b_rx) = member();
        relay.join("room-1", a, a_tx).await;
        relay.join("room-1", b, b_tx).await;

        relay.broadcast_except("room-1", a, "offer-payload").await;

        assert_eq!(b_rx.recv().await.unwrap(), "offer-payload");
        assert!(a_rx.try_recv().is_err(), "sender must not see its own message");
    }

    #[tokio::test]
    async fn test_broadcast_survives_closed_peer() {
        let relay = SignalingRelay::new();
        let (a, a_tx, _a_rx) = member();
        let (b, b_tx, b_rx) = member();
        let (c, c_tx, mut c_rx) = member();
        relay.join("room-1", a, a_tx).await;
        relay.join("room-1", b, b_tx).await;
        relay.join("room-1", c, c_tx).await;

        // b's writer task is gone.
        drop(b_rx);

        relay.broadcast_except("room-1", a, "ice-payload").await;
        assert_eq!(c_rx.recv().await.unwrap(), "ice-payload");
    }

    #[tokio::test]
    async fn test_leave_drops_empty_room() {
        let relay = SignalingRelay::new();
        let (a, a_tx, _a_rx) = member();
        let (b, b_tx, _b_rx) = member();
        relay.join("room-1", a, a_tx).await;
        relay.join("room-1", b, b_tx).await;

        assert_eq!(relay.leave("room-1", a).await, Some(1));
        assert_eq!(relay.room_count().await, 1);

        assert_eq!(relay.leave("room-1", b).await, Some(0));
        assert_eq!(relay.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_leave_unknown_connection_is_none() {
        let relay = SignalingRelay::new();
        assert!(relay.leave("room-1", Uuid::new_v4()).await.is_none());

        let (a, a_tx, _a_rx) = member();
        relay.join("room-1", a, a_tx).await;
        assert!(relay.leave("room-1", Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_join_racing_last_leave_lands_in_live_room() {
        // A joiner racing the last member's departure must end up in the
        // room the map serves afterwards, never in a detached one.
        let relay = Arc::new(SignalingRelay::new());

        for _ in 0..200 {
            let (a, a_tx, _a_rx) = member();
            relay.join("room-1", a, a_tx).await;

            let racer = Arc::clone(&relay);
            let leaver = tokio::spawn(async move { racer.leave("room-1", a).await });

            let (b, b_tx, mut b_rx) = member();
            relay.join("room-1", b, b_tx).await;
            leaver.await.unwrap();

            // Whichever side won the race, b is reachable by key.
            relay.broadcast_except("room-1", a, "ping").await;
            assert_eq!(b_rx.try_recv().unwrap(), "ping");

            assert_eq!(relay.leave("room-1", b).await, Some(0));
        }

        assert_eq!(relay.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_is_reusable_after_departures() {
        let relay = SignalingRelay::new();
        let (a, a_tx, _a_rx) = member();
        relay.join("room-1", a, a_tx).await;
        relay.leave("room-1", a).await;

        let (b, b_tx, mut b_rx) = member();
        let (c, c_tx, _c_rx) = member();
        assert_eq!(relay.join("room-1", b, b_tx).await, 1);
        assert_eq!(relay.join("room-1", c, c_tx).await, 2);

        relay.broadcast_except("room-1", c, "hello").await;
        assert_eq!(b_rx.recv().await.unwrap(), "hello");
    }
}
