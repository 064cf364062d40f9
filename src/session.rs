use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    core::model::User,
    error::{Error, Result},
    infrastructure::{persistence::LocalStorage, IdentityProvider},
    routes::Route,
    validation,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    /// True until the persisted session has been looked at.
    pub loading: bool,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Who is signed in. Subscribers are told when the account or the loading
/// flag changes, token rotation alone stays quiet.
pub struct Session<I> {
    identity: I,
    storage: LocalStorage,
    state: watch::Sender<AuthState>,
}

impl<I> Session<I>
where
    I: IdentityProvider,
{
    pub fn new(identity: I, storage: LocalStorage) -> Self {
        let (state, _rx) = watch::channel(AuthState {
            user: None,
            loading: true,
        });
        Self {
            identity,
            storage,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Result<User> {
        self.state.borrow().user.clone().ok_or(Error::NotSignedIn)
    }

    /// The signed in account with an id token that is still good, refreshing
    /// it first when it is about to expire.
    pub async fn fresh_user(&self) -> Result<User> {
        let user = self.user()?;
        if !user.needs_refresh(OffsetDateTime::now_utc()) {
            return Ok(user);
        }

        match self.identity.refresh(&user).await {
            Ok(refreshed) => {
                debug!(user = %refreshed.id, "id token refreshed");
                self.signed_in(refreshed)
            }
            Err(error) if error.is_rejection() => {
                warn!(%error, user = %user.id, "session rejected, signing out");
                self.sign_out()?;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Picks up the session persisted by an earlier run. A session the
    /// provider rejects is forgotten. One that cannot be checked because the
    /// provider is unreachable is kept, and refreshed on first use.
    pub async fn restore(&self) -> Result<Option<User>> {
        let persisted = self.storage.session().unwrap_or_else(|error| {
            warn!(%error, "unreadable persisted session");
            None
        });

        let Some(persisted) = persisted else {
            self.publish(None, false);
            return Ok(None);
        };

        match self.identity.refresh(&persisted).await {
            Ok(user) => {
                info!(user = %user.id, "session restored");
                self.publish(Some(user.clone()), false);
                self.storage.set_session(Some(&user))?;
                Ok(Some(user))
            }
            Err(error) if error.is_rejection() => {
                warn!(%error, user = %persisted.id, "persisted session rejected");
                self.publish(None, false);
                self.storage.set_session(None)?;
                Ok(None)
            }
            Err(error) => {
                warn!(%error, user = %persisted.id, "could not check the persisted session, keeping it");
                self.publish(Some(persisted.clone()), false);
                Ok(Some(persisted))
            }
        }
    }

    /// Normalises `email` and picks the page that continues the flow for it.
    pub async fn check_email(&self, email: &str) -> Result<(String, Route)> {
        let email = validation::email(email)?;
        let methods = self.identity.sign_in_methods(&email).await?;
        let next = if methods.is_registered() {
            Route::Login
        } else {
            Route::Register
        };
        info!(%email, %next, "email checked");
        Ok((email, next))
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let name = validation::name(name)?;
        let email = validation::email(email)?;
        let password = validation::password(password)?;

        let user = self.identity.create_account(&email, password).await?;
        let user = self.identity.set_display_name(&user, name).await?;
        info!(user = %user.id, "account created");
        self.signed_in(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let email = validation::email(email)?;
        let user = self.identity.sign_in(&email, password).await?;
        info!(user = %user.id, "signed in");
        self.signed_in(user)
    }

    pub fn sign_out(&self) -> Result<()> {
        self.storage.set_session(None)?;
        self.publish(None, false);
        info!("signed out");
        Ok(())
    }

    fn signed_in(&self, user: User) -> Result<User> {
        self.storage.set_session(Some(&user))?;
        self.publish(Some(user.clone()), false);
        Ok(user)
    }

    fn publish(&self, user: Option<User>, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading
                || state.user.as_ref().map(|user| &user.id) != user.as_ref().map(|user| &user.id);
            state.user = user;
            state.loading = loading;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::model::UserId, infrastructure::memory::MemoryIdentity, validation::ValidationError,
    };

    fn session() -> (Session<MemoryIdentity>, tempfile::TempDir) {
        session_with(MemoryIdentity::default())
    }

    fn session_with(identity: MemoryIdentity) -> (Session<MemoryIdentity>, tempfile::TempDir) {
        let directory = tempfile::tempdir().expect("a temporary directory");
        let storage = LocalStorage::try_new(directory.path()).expect("a keyspace");
        (Session::new(identity, storage), directory)
    }

    /// Registers an account, then starts over as if the program had been
    /// restarted with that account's session on disk.
    async fn restarted(
        identity: MemoryIdentity,
    ) -> Result<(Session<MemoryIdentity>, User, tempfile::TempDir)> {
        let (session, directory) = session_with(identity.clone());
        session.restore().await?;
        let user = session.register("Reader", "reader@example.com", "secret").await?;

        let next_run = Session::new(identity, session.storage.clone());
        Ok((next_run, user, directory))
    }

    #[tokio::test]
    async fn starts_loading_and_settles_on_restore() -> Result<()> {
        let (session, _directory) = session();
        assert!(session.current().loading);

        assert_eq!(session.restore().await?, None);
        assert_eq!(
            session.current(),
            AuthState {
                user: None,
                loading: false
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn validation_runs_before_the_provider() {
        let (session, _directory) = session();

        let result = session.register("", "reader@example.com", "secret").await;
        assert!(matches!(result, Err(Error::Validation(ValidationError::EmptyName))));

        let result = session.register("Reader", "reader", "secret").await;
        assert!(matches!(result, Err(Error::Validation(ValidationError::MalformedEmail))));

        let result = session.register("Reader", "reader@example.com", "short").await;
        assert!(matches!(result, Err(Error::Validation(ValidationError::ShortPassword))));

        let result = session.sign_in("  ", "secret").await;
        assert!(matches!(result, Err(Error::Validation(ValidationError::EmptyEmail))));
    }

    #[tokio::test]
    async fn check_email_picks_the_next_page() -> Result<()> {
        let (session, _directory) = session();

        let (email, next) = session.check_email("  Reader@Example.com ").await?;
        assert_eq!(email, "reader@example.com");
        assert_eq!(next, Route::Register);

        session.register("Reader", &email, "secret").await?;
        let (_, next) = session.check_email("reader@example.com").await?;
        assert_eq!(next, Route::Login);
        Ok(())
    }

    #[tokio::test]
    async fn a_new_sign_in_for_the_same_account_is_not_republished() -> Result<()> {
        let (session, _directory) = session();
        session.restore().await?;
        session.register("Reader", "reader@example.com", "secret").await?;

        let mut changes = session.subscribe();
        changes.mark_unchanged();

        let user = session.sign_in("reader@example.com", "secret").await?;
        assert!(!changes.has_changed().expect("sender alive"));
        assert_eq!(session.user()?.id_token, user.id_token);

        session.sign_out()?;
        assert!(changes.has_changed().expect("sender alive"));
        assert!(matches!(session.user(), Err(Error::NotSignedIn)));
        Ok(())
    }

    #[tokio::test]
    async fn an_unreachable_provider_keeps_the_persisted_session() -> Result<()> {
        let identity = MemoryIdentity::default();
        let (session, user, _directory) = restarted(identity.clone()).await?;
        identity.set_offline(true);

        assert_eq!(session.restore().await?, Some(user.clone()));
        assert!(session.current().is_signed_in());
        assert!(!session.current().loading);
        assert_eq!(session.storage.session()?, Some(user));
        Ok(())
    }

    #[tokio::test]
    async fn a_rejected_persisted_session_is_forgotten() -> Result<()> {
        let (session, _directory) = session();
        let stranger = User {
            id: UserId("u9".to_owned()),
            email: "stranger@example.com".to_owned(),
            display_name: None,
            id_token: "id".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at: None,
        };
        session.storage.set_session(Some(&stranger))?;

        assert_eq!(session.restore().await?, None);
        assert_eq!(session.storage.session()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn stale_tokens_are_refreshed_before_use() -> Result<()> {
        let identity = MemoryIdentity::with_token_lifetime(time::Duration::minutes(1));
        let (session, _directory) = session_with(identity.clone());
        session.restore().await?;
        let user = session.register("Reader", "reader@example.com", "secret").await?;

        let fresh = session.fresh_user().await?;
        assert_ne!(fresh.id_token, user.id_token);
        assert_eq!(fresh.id, user.id);
        assert_eq!(identity.refreshes(), 1);
        assert_eq!(session.user()?.id_token, fresh.id_token);
        assert_eq!(session.storage.session()?.map(|user| user.id_token), Some(fresh.id_token));
        Ok(())
    }

    #[tokio::test]
    async fn live_tokens_are_used_as_they_are() -> Result<()> {
        let identity = MemoryIdentity::default();
        let (session, _directory) = session_with(identity.clone());
        session.restore().await?;
        let user = session.register("Reader", "reader@example.com", "secret").await?;

        assert_eq!(session.fresh_user().await?.id_token, user.id_token);
        assert_eq!(identity.refreshes(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn a_rejected_refresh_signs_out() -> Result<()> {
        let (session, _directory) =
            session_with(MemoryIdentity::with_token_lifetime(time::Duration::ZERO));
        session.restore().await?;
        session.register("Reader", "reader@example.com", "secret").await?;
        session.signed_in(User {
            refresh_token: "revoked".to_owned(),
            ..session.user()?
        })?;

        let result = session.fresh_user().await;
        assert!(matches!(result, Err(Error::Rejected(..))));
        assert!(!session.current().is_signed_in());
        Ok(())
    }
}
