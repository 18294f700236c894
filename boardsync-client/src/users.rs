//! Assignee display-name resolution.
//!
//! Task events may arrive without an assignee name. The directory caches
//! every name the client has learned (from the user listing, from events
//! that did carry a name, from earlier lookups) and resolves unknown ids
//! on demand. Concurrent resolutions of the same id are coalesced: the
//! first caller performs the fetch, later callers wait on a `watch`
//! channel for its result instead of issuing their own request.
//!
//! A lookup always completes. If the fetch fails or the user is unknown,
//! the id resolves to a `User #{id}` placeholder so rendering never
//! blocks on a name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::watch;

/// Cache of user display names keyed by user id.
#[derive(Debug, Default)]
pub struct UserDirectory {
    names: Mutex<HashMap<i64, String>>,
    pending: Mutex<HashMap<i64, watch::Receiver<Option<String>>>>,
}

/// Display name used when a lookup fails or the user no longer exists.
pub fn fallback_name(user_id: i64) -> String {
    format!("User #{user_id}")
}

enum Role {
    /// This caller performs the fetch and publishes the result.
    Lead(watch::Sender<Option<String>>),
    /// Another caller is already fetching; wait for its result.
    Follow(watch::Receiver<Option<String>>),
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached name for a user, if known.
    pub fn known(&self, user_id: i64) -> Option<String> {
        self.names.lock().unwrap().get(&user_id).cloned()
    }

    /// Records a name learned out of band (a user listing, an event that
    /// carried the name).
    pub fn insert(&self, user_id: i64, name: String) {
        self.names.lock().unwrap().insert(user_id, name);
    }

    /// Seeds the directory from `(id, name)` pairs.
    pub fn preload<I: IntoIterator<Item = (i64, String)>>(&self, entries: I) {
        let mut names = self.names.lock().unwrap();
        for (user_id, name) in entries {
            names.insert(user_id, name);
        }
    }

    pub fn len(&self) -> usize {
        self.names.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().unwrap().is_empty()
    }

    /// Resolves a user id to a display name, fetching at most once per id
    /// no matter how many callers ask concurrently.
    ///
    /// `fetch` is only invoked by the caller that arrives first while no
    /// lookup for this id is in flight. Its result (or the fallback, if it
    /// returns `None`) is cached and handed to every waiter.
    pub async fn resolve<F, Fut>(&self, user_id: i64, fetch: F) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        if let Some(name) = self.known(user_id) {
            return name;
        }

        let role = {
            let mut pending = self.pending.lock().unwrap();
            match pending.get(&user_id) {
                Some(rx) => Role::Follow(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    pending.insert(user_id, rx);
                    Role::Lead(tx)
                }
            }
        };

        match role {
            Role::Lead(tx) => {
                let name = fetch().await.unwrap_or_else(|| fallback_name(user_id));
                self.names
                    .lock()
                    .unwrap()
                    .insert(user_id, name.clone());
                self.pending.lock().unwrap().remove(&user_id);
                // Waiters hold their own receiver clones; send after the
                // pending entry is gone so a new caller hits the name cache.
                let _ = tx.send(Some(name.clone()));
                name
            }
            Role::Follow(mut rx) => {
                loop {
                    if let Some(name) = rx.borrow().clone() {
                        return name;
                    }
                    if rx.changed().await.is_err() {
                        // Lead dropped without publishing; don't leave the
                        // caller hanging.
                        return fallback_name(user_id);
                    }
                }
            }
        }
    }
}
