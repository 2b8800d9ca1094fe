//! Integration tests for the session service.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tollgate_auth::SessionService;
use tollgate_core::clock::{Clock, FixedClock};
use tollgate_core::config::TollgateConfig;
use tollgate_core::error::TollgateError;
use tollgate_core::id::ObjectId;
use tollgate_core::models::user::{CreateUser, User};
use tollgate_core::password::CredentialCodec;
use tollgate_core::repository::{SessionRepository, UserRepository};
use tollgate_core::token::token_digest;
use tollgate_db::repository::{SurrealSessionRepository, SurrealUserRepository};

const PASSWORD: &str = "correct-horse";

struct Harness {
    service: SessionService<SurrealUserRepository<Db>, SurrealSessionRepository<Db>>,
    users: SurrealUserRepository<Db>,
    sessions: SurrealSessionRepository<Db>,
    clock: Arc<FixedClock>,
    user: User,
}

/// Spin up in-memory DB, run migrations, create one approved user.
async fn setup() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tollgate_db::run_migrations(&db).await.unwrap();

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap(),
    ));
    let codec = CredentialCodec::with_cost(1024, 1, 1).unwrap();

    let users = SurrealUserRepository::new(db.clone())
        .with_codec(codec.clone())
        .with_clock(clock.clone());
    let sessions = SurrealSessionRepository::new(db.clone());

    let user = users
        .create(CreateUser {
            email: "alice@example.com".into(),
            password: PASSWORD.into(),
            pre_approved: true,
        })
        .await
        .unwrap();

    let service = SessionService::new(users.clone(), sessions.clone(), TollgateConfig::default())
        .with_codec(codec)
        .with_clock(clock.clone());

    Harness {
        service,
        users,
        sessions,
        clock,
        user,
    }
}

#[tokio::test]
async fn short_login_is_clamped_to_minimum_threshold() {
    let h = setup().await;

    let token = h
        .service
        .login(&h.user.id.to_hex(), Duration::seconds(1))
        .await
        .unwrap();
    assert!(token.starts_with(&h.user.id.to_hex()));

    h.clock.advance(Duration::minutes(2));
    let user = h.service.resolve(&token).await.unwrap();
    assert_eq!(user.id, h.user.id);

    h.clock.advance(Duration::minutes(4));
    let err = h.service.resolve(&token).await.unwrap_err();
    assert!(matches!(err, TollgateError::NotLogged));

    // Lazy expiry removed the row.
    let err = h.sessions.get_by_digest(&token_digest(&token)).await.unwrap_err();
    assert!(matches!(err, TollgateError::NotFound { .. }));
}

#[tokio::test]
async fn long_login_keeps_requested_duration() {
    let h = setup().await;
    let token = h
        .service
        .login(&h.user.id.to_hex(), Duration::hours(1))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(59));
    assert!(h.service.resolve(&token).await.is_ok());

    h.clock.advance(Duration::minutes(2));
    assert!(matches!(
        h.service.resolve(&token).await,
        Err(TollgateError::NotLogged)
    ));
}

#[tokio::test]
async fn unbounded_login_saturates_expiry() {
    let h = setup().await;
    let token = h
        .service
        .login(&h.user.id.to_hex(), Duration::MAX)
        .await
        .unwrap();

    let session = h.sessions.get_by_digest(&token_digest(&token)).await.unwrap();
    assert!(session.expires_at > h.clock.now() + Duration::days(365 * 10_000));

    h.clock.advance(Duration::days(365 * 100));
    assert_eq!(h.service.resolve(&token).await.unwrap().id, h.user.id);
}

#[tokio::test]
async fn resolve_stamps_last_activity() {
    let h = setup().await;
    let token = h
        .service
        .login(&h.user.id.to_hex(), Duration::hours(1))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(3));
    let user = h.service.resolve(&token).await.unwrap();
    assert_eq!(user.last_activity, h.clock.now());
    assert_eq!(user.joined_at, h.user.joined_at);

    let stored = h.users.get_by_id(&h.user.id.to_hex()).await.unwrap();
    assert_eq!(stored.last_activity, h.clock.now());
}

#[tokio::test]
async fn unknown_and_malformed_tokens_are_not_logged() {
    let h = setup().await;
    let forged = format!("{}AAAA", h.user.id.to_hex());
    for token in ["", "garbage", forged.as_str()] {
        let err = h.service.resolve(token).await.unwrap_err();
        assert!(matches!(err, TollgateError::NotLogged), "token {token:?}");
    }
}

#[tokio::test]
async fn login_rejects_malformed_user_id() {
    let h = setup().await;
    let err = h
        .service
        .login("not-an-id", Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::InvalidId { .. }));
}

#[tokio::test]
async fn logout_revokes_one_session_and_logout_all_the_rest() {
    let h = setup().await;
    let uid = h.user.id.to_hex();
    let t1 = h.service.login(&uid, Duration::hours(1)).await.unwrap();
    let t2 = h.service.login(&uid, Duration::hours(1)).await.unwrap();
    let t3 = h.service.login(&uid, Duration::hours(1)).await.unwrap();
    assert!(t1 != t2 && t2 != t3);

    h.service.logout(&t1).await.unwrap();
    h.service.logout(&t1).await.unwrap();
    assert!(matches!(
        h.service.resolve(&t1).await,
        Err(TollgateError::NotLogged)
    ));
    assert!(h.service.resolve(&t2).await.is_ok());
    assert!(h.service.resolve(&t3).await.is_ok());

    assert_eq!(h.service.logout_all(&uid).await.unwrap(), 2);
    for token in [&t2, &t3] {
        assert!(matches!(
            h.service.resolve(token).await,
            Err(TollgateError::NotLogged)
        ));
    }
}

#[tokio::test]
async fn session_of_deleted_user_is_dropped() {
    let h = setup().await;
    let token = h
        .service
        .login(&h.user.id.to_hex(), Duration::hours(1))
        .await
        .unwrap();

    h.users.delete(&h.user.id.to_hex()).await.unwrap();

    let err = h.service.resolve(&token).await.unwrap_err();
    assert!(matches!(err, TollgateError::NotLogged));
    assert!(h.sessions.get_by_digest(&token_digest(&token)).await.is_err());
}

#[tokio::test]
async fn authenticate_does_not_reveal_unknown_accounts() {
    let h = setup().await;

    let user = h
        .service
        .authenticate("alice@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(user.id, h.user.id);

    let err = h
        .service
        .authenticate("alice@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::CredentialMismatch));

    let err = h
        .service
        .authenticate("nobody@example.com", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::CredentialMismatch));
}

#[tokio::test]
async fn login_with_password_issues_resolvable_token() {
    let h = setup().await;
    let out = h
        .service
        .login_with_password("alice@example.com", PASSWORD, Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(out.user.id, h.user.id);

    let resolved = h.service.resolve(&out.token).await.unwrap();
    assert_eq!(resolved.id, h.user.id);

    let other = ObjectId::new();
    assert_eq!(h.service.logout_all(&other.to_hex()).await.unwrap(), 0);
}
