//! Session service: token issue, resolution and revocation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tollgate_core::clock::{Clock, SystemClock};
use tollgate_core::config::TollgateConfig;
use tollgate_core::error::{TollgateError, TollgateResult};
use tollgate_core::id::ObjectId;
use tollgate_core::models::session::CreateSession;
use tollgate_core::models::user::User;
use tollgate_core::password::CredentialCodec;
use tollgate_core::repository::{SessionRepository, UserRepository};
use tollgate_core::token::{generate_session_token, token_digest};
use tracing::{debug, info};

/// Successful password login.
#[derive(Debug)]
pub struct LoginOutput {
    pub user: User,
    /// Raw session token; only its digest is stored.
    pub token: String,
}

/// Session service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct SessionService<U: UserRepository, S: SessionRepository> {
    user_repo: U,
    session_repo: S,
    codec: CredentialCodec,
    clock: Arc<dyn Clock>,
    config: TollgateConfig,
}

impl<U: UserRepository, S: SessionRepository> SessionService<U, S> {
    pub fn new(user_repo: U, session_repo: S, config: TollgateConfig) -> Self {
        Self {
            user_repo,
            session_repo,
            codec: CredentialCodec::default(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Codec `authenticate` verifies with. Argon2 parameters are read from
    /// each stored hash, so any codec accepts hashes from another.
    pub fn with_codec(mut self, codec: CredentialCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Issues a session token for `user_id`, valid for `stay` but never
    /// less than the minimum online threshold. Expiry saturates at the
    /// latest representable instant.
    pub async fn login(&self, user_id: &str, stay: Duration) -> TollgateResult<String> {
        let user_id = ObjectId::parse_str(user_id)?;
        let stay = stay.max(self.config.minimum_online_threshold());

        let token = generate_session_token(&user_id);
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(stay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.session_repo
            .create(CreateSession {
                token_digest: token_digest(&token),
                user_id,
                expires_at,
                created_at: now,
            })
            .await?;

        info!(user_id = %user_id, expires_in_secs = stay.num_seconds(), "Session issued");
        Ok(token)
    }

    /// Returns the user behind `token` and stamps their activity.
    ///
    /// Expired sessions are deleted on sight. A session whose user no
    /// longer exists is deleted as well. Both report `NotLogged`.
    pub async fn resolve(&self, token: &str) -> TollgateResult<User> {
        let digest = token_digest(token);
        let session = match self.session_repo.get_by_digest(&digest).await {
            Ok(session) => session,
            Err(TollgateError::NotFound { .. }) => return Err(TollgateError::NotLogged),
            Err(e) => return Err(e),
        };

        if session.is_expired(self.clock.now()) {
            debug!(user_id = %session.user_id, "Session expired; removing");
            self.session_repo.delete_by_digest(&digest).await?;
            return Err(TollgateError::NotLogged);
        }

        match self
            .user_repo
            .touch_activity(&session.user_id.to_hex())
            .await
        {
            Ok(user) => Ok(user),
            Err(TollgateError::NotFound { .. }) => {
                debug!(user_id = %session.user_id, "Session owner gone; removing");
                self.session_repo.delete_by_digest(&digest).await?;
                Err(TollgateError::NotLogged)
            }
            Err(e) => Err(e),
        }
    }

    /// Idempotent.
    pub async fn logout(&self, token: &str) -> TollgateResult<()> {
        self.session_repo
            .delete_by_digest(&token_digest(token))
            .await
    }

    /// Revokes every session of `user_id`; returns how many were removed.
    pub async fn logout_all(&self, user_id: &str) -> TollgateResult<u64> {
        let removed = self.session_repo.delete_for_user(user_id).await?;
        info!(user_id = %user_id, removed, "All sessions revoked");
        Ok(removed)
    }

    /// Checks an email/password pair. An unknown email is reported as
    /// `CredentialMismatch`, same as a wrong password.
    pub async fn authenticate(&self, email: &str, password: &str) -> TollgateResult<User> {
        let user = match self.user_repo.get_by_email(email).await {
            Ok(user) => user,
            Err(TollgateError::NotFound { .. }) => return Err(TollgateError::CredentialMismatch),
            Err(e) => return Err(e),
        };
        self.codec.verify(password, &user.password)?;
        Ok(user)
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
        stay: Duration,
    ) -> TollgateResult<LoginOutput> {
        let user = self.authenticate(email, password).await?;
        let token = self.login(&user.id.to_hex(), stay).await?;
        Ok(LoginOutput { user, token })
    }
}
