use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{de::DeserializeOwned, Serialize};
use std::{path::Path, sync::Arc};
use tracing::debug;

use crate::{core::model::User, error, preferences::Theme};

/// The device-local keyspace: preferences and the signed in session.
#[derive(Clone)]
pub struct LocalStorage(Arc<LocalStorageInner>);

impl LocalStorage {
    const THEME: &str = "theme";
    const GOAL: &str = "goal";
    const CURRENT_SESSION: &str = "current";

    pub fn try_new<P>(store_path: P) -> error::Result<Self>
    where
        P: AsRef<Path>,
    {
        Ok(Self(Arc::new(LocalStorageInner::try_open(
            Keyspace::open(Config::new(store_path))?,
        )?)))
    }

    fn inner(&self) -> &LocalStorageInner {
        let Self(x) = self;
        x
    }

    /// Light until something else has been chosen.
    pub fn theme(&self) -> error::Result<Theme> {
        let inner = self.inner();
        Ok(inner.load(&inner.preferences, Self::THEME)?.unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> error::Result<()> {
        let inner = self.inner();
        inner.store(&inner.preferences, Self::THEME, &theme)
    }

    pub fn goal(&self) -> error::Result<Option<u32>> {
        let inner = self.inner();
        inner.load(&inner.preferences, Self::GOAL)
    }

    pub fn set_goal(&self, goal: Option<u32>) -> error::Result<()> {
        let inner = self.inner();
        match goal {
            Some(goal) => inner.store(&inner.preferences, Self::GOAL, &goal),
            None => inner.forget(&inner.preferences, Self::GOAL),
        }
    }

    pub fn session(&self) -> error::Result<Option<User>> {
        let inner = self.inner();
        inner.load(&inner.sessions, Self::CURRENT_SESSION)
    }

    pub fn set_session(&self, user: Option<&User>) -> error::Result<()> {
        let inner = self.inner();
        match user {
            Some(user) => inner.store(&inner.sessions, Self::CURRENT_SESSION, user),
            None => inner.forget(&inner.sessions, Self::CURRENT_SESSION),
        }
    }
}

pub struct LocalStorageInner {
    keyspace: Keyspace,
    preferences: PartitionHandle,
    sessions: PartitionHandle,
}

impl LocalStorageInner {
    pub fn try_open(keyspace: Keyspace) -> error::Result<Self> {
        let preferences =
            keyspace.open_partition("preferences", PartitionCreateOptions::default())?;
        let sessions = keyspace.open_partition("sessions", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            preferences,
            sessions,
        })
    }

    fn load<A>(&self, partition: &PartitionHandle, key: &str) -> error::Result<Option<A>>
    where
        A: DeserializeOwned,
    {
        if let Some(bytes) = partition.get(key)? {
            Ok(Some(serde_json::from_slice(&bytes)?))
        } else {
            Ok(None)
        }
    }

    fn store<A>(&self, partition: &PartitionHandle, key: &str, value: &A) -> error::Result<()>
    where
        A: Serialize,
    {
        debug!(key, "storing locally");
        partition.insert(key, serde_json::to_vec(value)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn forget(&self, partition: &PartitionHandle, key: &str) -> error::Result<()> {
        debug!(key, "forgetting locally");
        partition.remove(key)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::UserId;

    #[test]
    fn preferences_survive_reopening() -> error::Result<()> {
        let directory = tempfile::tempdir()?;

        {
            let storage = LocalStorage::try_new(directory.path())?;
            assert_eq!(storage.theme()?, Theme::Light);
            assert_eq!(storage.goal()?, None);

            storage.set_theme(Theme::Dark)?;
            storage.set_goal(Some(12))?;
        }

        let storage = LocalStorage::try_new(directory.path())?;
        assert_eq!(storage.theme()?, Theme::Dark);
        assert_eq!(storage.goal()?, Some(12));

        storage.set_goal(None)?;
        assert_eq!(storage.goal()?, None);
        Ok(())
    }

    #[test]
    fn sessions_are_stored_and_forgotten() -> error::Result<()> {
        let directory = tempfile::tempdir()?;
        let storage = LocalStorage::try_new(directory.path())?;
        let user = User {
            id: UserId("u1".to_owned()),
            email: "reader@example.com".to_owned(),
            display_name: Some("Reader".to_owned()),
            id_token: "id".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at: Some(time::macros::datetime!(2024-03-01 11:00 UTC)),
        };

        storage.set_session(Some(&user))?;
        assert_eq!(storage.session()?, Some(user));

        storage.set_session(None)?;
        assert_eq!(storage.session()?, None);
        Ok(())
    }
}
