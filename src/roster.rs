//! The set of currently known players, as last reported by the server.
//!
//! The roster is mutated only from the session's receive path (`players`
//! snapshots and AFK presence events) and read by everyone else, so it is
//! exposed exclusively through defensive copies — readers never observe a
//! roster the writer is still mutating.

use tokio::sync::Mutex;

use crate::protocol::{User, UserId};

/// UUID-keyed collection of known players.
///
/// Insertion order is preserved: a replaced entry keeps its position, new
/// entries append at the end, and a snapshot restates the server's order.
#[derive(Debug, Default)]
pub struct Roster {
    users: Mutex<Vec<User>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry with the same UUID in place, or append.
    pub async fn upsert(&self, user: User) {
        let mut users = self.users.lock().await;
        if let Some(existing) = users.iter_mut().find(|u| u.uuid == user.uuid) {
            *existing = user;
        } else {
            users.push(user);
        }
    }

    /// Replace the whole roster with a snapshot from a `players` envelope.
    pub async fn replace_all(&self, users: Vec<User>) {
        *self.users.lock().await = users;
    }

    /// A defensive copy of the current roster.
    pub async fn snapshot(&self) -> Vec<User> {
        self.users.lock().await.clone()
    }

    /// Look up one user by UUID.
    pub async fn get(&self, uuid: UserId) -> Option<User> {
        self.users.lock().await.iter().find(|u| u.uuid == uuid).cloned()
    }

    /// Number of known players.
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(n: u128, name: &str) -> User {
        User {
            kind: "ingame".into(),
            uuid: Uuid::from_u128(n),
            display_name: name.into(),
            name: name.into(),
            group: "default".into(),
            pronouns: None,
            world: None,
            afk: None,
            alt: false,
            bot: false,
            supporter: 0,
        }
    }

    #[tokio::test]
    async fn upsert_appends_new_uuid() {
        let roster = Roster::new();
        roster.upsert(user(1, "alice")).await;
        roster.upsert(user(2, "bob")).await;
        assert_eq!(roster.len().await, 2);
    }

    #[tokio::test]
    async fn upsert_replaces_in_place_without_changing_count() {
        let roster = Roster::new();
        roster.upsert(user(1, "alice")).await;
        roster.upsert(user(2, "bob")).await;

        let mut afk_alice = user(1, "alice");
        afk_alice.afk = Some(true);
        roster.upsert(afk_alice).await;

        assert_eq!(roster.len().await, 2);
        let snapshot = roster.snapshot().await;
        // Replaced entry keeps its position.
        assert_eq!(snapshot[0].name, "alice");
        assert_eq!(snapshot[0].afk, Some(true));
    }

    #[tokio::test]
    async fn replace_all_drops_absent_uuids() {
        let roster = Roster::new();
        roster.upsert(user(1, "alice")).await;
        roster.upsert(user(2, "bob")).await;

        roster.replace_all(vec![user(2, "bob"), user(3, "carol")]).await;

        let snapshot = roster.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(roster.get(Uuid::from_u128(1)).await.is_none());
        assert!(roster.get(Uuid::from_u128(3)).await.is_some());
    }

    #[tokio::test]
    async fn snapshot_is_a_defensive_copy() {
        let roster = Roster::new();
        roster.upsert(user(1, "alice")).await;

        let mut snapshot = roster.snapshot().await;
        snapshot.clear();

        assert_eq!(roster.len().await, 1);
    }

    #[tokio::test]
    async fn empty_roster() {
        let roster = Roster::new();
        assert!(roster.is_empty().await);
        assert!(roster.get(Uuid::from_u128(1)).await.is_none());
    }
}
