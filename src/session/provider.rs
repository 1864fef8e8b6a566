//! The single owner of session state.
//!
//! Every read of the current actor goes through [`SessionProvider::get`];
//! every write goes through `set` or `clear`, which mirror the change into
//! durable storage and publish it on a watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use super::model::{Role, Session, UserProfile};
use super::storage::{
    ACCESS_TOKEN, CLIENT, EMAIL, EXPIRY, NAME, NICKNAME, ROLE, SELECTED_COURSE_ID, SESSION_KEYS,
    SessionStorage, StorageError, UID,
};

pub struct SessionProvider {
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Session>,
}

impl SessionProvider {
    /// Rehydrate the session from storage.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let session = load(storage.as_ref());
        debug!(
            has_token = session.has_token(),
            role = ?session.role(),
            "Session rehydrated"
        );
        let (state, _) = watch::channel(session);
        Self { storage, state }
    }

    pub fn get(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Replace the session and persist every key.
    ///
    /// The in-memory value is published before the write so subscribers never
    /// lag behind storage; a failed write is still reported to the caller.
    pub fn set(&self, session: Session) -> Result<(), StorageError> {
        info!(uid = ?session.uid, role = ?session.role(), "Session stored");
        self.state.send_replace(session.clone());

        for (key, value) in entries(&session) {
            self.storage.set(key, value.unwrap_or_default())?;
        }
        Ok(())
    }

    /// Drop the session and remove all of its storage keys.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.state.send_replace(Session::default());
        info!("Session cleared");

        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(err) = self.storage.remove(key) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }
}

fn load(storage: &dyn SessionStorage) -> Session {
    let read = |key: &str| storage.get(key).filter(|value| !value.is_empty());

    Session {
        access_token: read(ACCESS_TOKEN),
        client: read(CLIENT),
        uid: read(UID),
        expiry: read(EXPIRY),
        user: UserProfile {
            name: read(NAME),
            email: read(EMAIL),
            nickname: read(NICKNAME),
            role: read(ROLE).and_then(|raw| raw.parse::<Role>().ok()),
            selected_course_id: read(SELECTED_COURSE_ID),
        },
    }
}

fn entries(session: &Session) -> [(&'static str, Option<&str>); 9] {
    [
        (ACCESS_TOKEN, session.access_token.as_deref()),
        (CLIENT, session.client.as_deref()),
        (UID, session.uid.as_deref()),
        (EXPIRY, session.expiry.as_deref()),
        (NAME, session.user.name.as_deref()),
        (EMAIL, session.user.email.as_deref()),
        (NICKNAME, session.user.nickname.as_deref()),
        (ROLE, session.user.role.map(Role::as_str)),
        (SELECTED_COURSE_ID, session.user.selected_course_id.as_deref()),
    ]
}
