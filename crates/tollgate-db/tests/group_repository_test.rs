//! Integration tests for the Group repository and group-ref propagation
//! using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tollgate_core::error::TollgateError;
use tollgate_core::id::ObjectId;
use tollgate_core::models::group::{CreateGroup, GroupField, UpdateGroup};
use tollgate_core::models::user::CreateUserDetail;
use tollgate_core::pagination::PageRequest;
use tollgate_core::password::CredentialCodec;
use tollgate_core::error::TollgateResult;
use tollgate_core::repository::{GroupRefSync, GroupRepository, ReconcileReport, UserRepository};
use tollgate_db::repository::{SurrealGroupRefSync, SurrealGroupRepository, SurrealUserRepository};

async fn setup() -> (
    Surreal<Db>,
    SurrealGroupRepository<Db>,
    SurrealUserRepository<Db>,
) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tollgate_db::run_migrations(&db).await.unwrap();

    let groups = SurrealGroupRepository::new(db.clone());
    let users = SurrealUserRepository::new(db.clone())
        .with_codec(CredentialCodec::with_cost(1024, 1, 1).unwrap());
    (db, groups, users)
}

/// Coordinator whose store is unreachable.
struct UnreachableRefSync;

impl GroupRefSync for UnreachableRefSync {
    async fn group_deleted(&self, _group_id: &str) -> TollgateResult<u64> {
        Err(TollgateError::Storage("connection reset".into()))
    }

    async fn group_renamed(&self, _group_id: &str, _name: &str) -> TollgateResult<u64> {
        Err(TollgateError::Storage("connection reset".into()))
    }

    async fn reconcile(&self) -> TollgateResult<ReconcileReport> {
        Err(TollgateError::Storage("connection reset".into()))
    }
}

fn group(name: &str, privileges: &[&str]) -> CreateGroup {
    CreateGroup {
        name: name.into(),
        privileges: privileges.iter().map(|p| p.to_string()).collect(),
        info: None,
    }
}

async fn member(users: &SurrealUserRepository<Db>, email: &str, groups: &[ObjectId]) -> ObjectId {
    users
        .create_detailed(CreateUserDetail {
            email: email.into(),
            password: "correct-horse".into(),
            pre_approved: true,
            group_ids: groups.iter().map(ObjectId::to_hex).collect(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn create_and_get_group() {
    let (_db, repo, _) = setup().await;

    let created = repo
        .create(CreateGroup {
            name: "admins".into(),
            privileges: vec!["users:write".into()],
            info: Some(serde_json::json!({ "owner": "ops" })),
        })
        .await
        .unwrap();

    let by_id = repo.get_by_id(&created.id.to_hex()).await.unwrap();
    assert_eq!(by_id.name, "admins");
    assert_eq!(by_id.privileges, vec!["users:write".to_string()]);
    assert_eq!(by_id.info, Some(serde_json::json!({ "owner": "ops" })));

    let by_name = repo.get_by_name("admins").await.unwrap();
    assert_eq!(by_name.id, created.id);

    let err = repo.get_by_name("nobody").await.unwrap_err();
    assert!(matches!(err, TollgateError::NotFound { .. }));
}

#[tokio::test]
async fn names_must_be_present_and_unique() {
    let (_db, repo, _) = setup().await;

    let err = repo.create(group("  ", &[])).await.unwrap_err();
    assert!(matches!(err, TollgateError::InvalidName));

    repo.create(group("ops", &[])).await.unwrap();
    let err = repo.create(group("ops", &[])).await.unwrap_err();
    assert!(matches!(err, TollgateError::DuplicateName { ref name } if name == "ops"));
}

#[tokio::test]
async fn find_many_filters_malformed_ids() {
    let (_db, repo, _) = setup().await;
    let a = repo.create(group("a", &[])).await.unwrap();
    let b = repo.create(group("b", &[])).await.unwrap();

    let err = repo
        .find_many(&["nope".into(), "".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::NoResult));

    let found = repo
        .find_many(&[
            a.id.to_hex(),
            "nope".into(),
            b.id.to_hex(),
            ObjectId::new().to_hex(),
        ])
        .await
        .unwrap();
    let ids: Vec<ObjectId> = found.iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);

    let none = repo.find_many(&[ObjectId::new().to_hex()]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn partial_update_keeps_other_fields() {
    let (_db, repo, _) = setup().await;
    let g = repo.create(group("support", &["tickets:read"])).await.unwrap();

    let updated = repo
        .update(
            &g.id.to_hex(),
            UpdateGroup {
                privileges: Some(vec!["tickets:read".into(), "tickets:write".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "support");
    assert_eq!(updated.privileges.len(), 2);

    let err = repo
        .update(&ObjectId::new().to_hex(), UpdateGroup::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::NotFound { .. }));
}

#[tokio::test]
async fn rename_propagates_to_members_in_place() {
    let (_db, repo, users) = setup().await;
    let first = repo.create(group("first", &[])).await.unwrap();
    let second = repo.create(group("second", &[])).await.unwrap();

    let a = member(&users, "a@example.com", &[first.id, second.id]).await;
    let b = member(&users, "b@example.com", &[first.id]).await;

    repo.update(
        &first.id.to_hex(),
        UpdateGroup {
            name: Some("primary".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let a = users.get_by_id(&a.to_hex()).await.unwrap();
    let names: Vec<&str> = a.group_refs.iter().map(|r| r.group_name.as_str()).collect();
    assert_eq!(names, vec!["primary", "second"]);
    assert_eq!(a.group_refs[0].group_id, first.id);

    let b = users.get_by_id(&b.to_hex()).await.unwrap();
    assert_eq!(b.group_refs[0].group_name, "primary");
}

#[tokio::test]
async fn rename_collision_is_duplicate_name() {
    let (_db, repo, _) = setup().await;
    repo.create(group("taken", &[])).await.unwrap();
    let other = repo.create(group("other", &[])).await.unwrap();

    let err = repo
        .update(
            &other.id.to_hex(),
            UpdateGroup {
                name: Some("taken".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::DuplicateName { .. }));
}

#[tokio::test]
async fn delete_strips_group_from_members_only() {
    let (_db, repo, users) = setup().await;
    let doomed = repo.create(group("doomed", &[])).await.unwrap();
    let kept = repo.create(group("kept", &[])).await.unwrap();

    let a = member(&users, "a@example.com", &[doomed.id, kept.id]).await;
    let b = member(&users, "b@example.com", &[doomed.id]).await;
    let c = member(&users, "c@example.com", &[kept.id]).await;

    repo.delete(&doomed.id.to_hex()).await.unwrap();

    let a = users.get_by_id(&a.to_hex()).await.unwrap();
    assert_eq!(a.group_refs.len(), 1);
    assert_eq!(a.group_refs[0].group_id, kept.id);

    let b = users.get_by_id(&b.to_hex()).await.unwrap();
    assert!(b.group_refs.is_empty());

    let c = users.get_by_id(&c.to_hex()).await.unwrap();
    assert_eq!(c.group_refs.len(), 1);
    assert_eq!(c.group_refs[0].group_name, "kept");

    let err = repo.get_by_id(&doomed.id.to_hex()).await.unwrap_err();
    assert!(matches!(err, TollgateError::NotFound { .. }));
    let err = repo.delete(&doomed.id.to_hex()).await.unwrap_err();
    assert!(matches!(err, TollgateError::NotFound { .. }));
}

#[tokio::test]
async fn reconcile_repairs_stale_refs() {
    let (db, repo, users) = setup().await;
    let vanished = repo.create(group("vanished", &[])).await.unwrap();
    let renamed = repo.create(group("old-name", &[])).await.unwrap();

    let a = member(&users, "a@example.com", &[vanished.id, renamed.id]).await;
    let b = member(&users, "b@example.com", &[renamed.id]).await;
    member(&users, "loner@example.com", &[]).await;

    // Mutate groups behind the directory's back so nothing propagates.
    db.query("DELETE type::thing('account_group', $id)")
        .bind(("id", vanished.id.to_hex()))
        .await
        .unwrap()
        .check()
        .unwrap();
    db.query("UPDATE type::thing('account_group', $id) SET name = 'new-name'")
        .bind(("id", renamed.id.to_hex()))
        .await
        .unwrap()
        .check()
        .unwrap();

    let report = repo.ref_sync().reconcile().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.repaired, 2);

    let a = users.get_by_id(&a.to_hex()).await.unwrap();
    assert_eq!(a.group_refs.len(), 1);
    assert_eq!(a.group_refs[0].group_name, "new-name");
    let b = users.get_by_id(&b.to_hex()).await.unwrap();
    assert_eq!(b.group_refs[0].group_name, "new-name");

    let again = repo.ref_sync().reconcile().await.unwrap();
    assert_eq!(again.repaired, 0);
}

#[tokio::test]
async fn list_groups_with_projection() {
    let (_db, repo, _) = setup().await;
    for name in ["g1", "g2", "g3"] {
        repo.create(group(name, &["p"])).await.unwrap();
    }

    let page = repo
        .list(PageRequest::first(2).fields([GroupField::Name]))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert!(page.items.iter().all(|g| g.privileges.is_empty()));

    let rest = repo
        .list(PageRequest::first(2).after(page.next_cursor.unwrap().to_hex()))
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest.items[0].name, "g3");
    assert_eq!(rest.items[0].privileges, vec!["p".to_string()]);
}

#[tokio::test]
async fn delete_and_rename_succeed_when_propagation_fails() {
    let (db, _, users) = setup().await;
    let repo = SurrealGroupRepository::new(db.clone()).with_ref_sync(UnreachableRefSync);

    let kept = repo.create(group("kept", &[])).await.unwrap();
    let doomed = repo.create(group("doomed", &[])).await.unwrap();
    let uid = member(&users, "stale@example.com", &[kept.id, doomed.id]).await;

    let renamed = repo
        .update(
            &kept.id.to_hex(),
            UpdateGroup {
                name: Some("kept-renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "kept-renamed");

    repo.delete(&doomed.id.to_hex()).await.unwrap();
    let err = repo.get_by_id(&doomed.id.to_hex()).await.unwrap_err();
    assert!(matches!(err, TollgateError::NotFound { .. }));

    // Nothing reached the snapshots.
    let user = users.get_by_id(&uid.to_hex()).await.unwrap();
    assert_eq!(user.group_refs.len(), 2);
    assert_eq!(user.group_refs[0].group_name, "kept");

    let report = SurrealGroupRefSync::new(db.clone()).reconcile().await.unwrap();
    assert_eq!(report.repaired, 1);
    let user = users.get_by_id(&uid.to_hex()).await.unwrap();
    assert_eq!(user.group_refs.len(), 1);
    assert_eq!(user.group_refs[0].group_id, kept.id);
    assert_eq!(user.group_refs[0].group_name, "kept-renamed");
}
