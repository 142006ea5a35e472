use cashflow::{
    error::StoreError,
    models::user::User,
    store::{identity_field_name, Store},
};
use chrono::{Duration, Utc};

mod support;

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
struct Widget {
    widget_id: i64,
    widget_type: String,
    position: Option<f64>,
    label: Option<String>,
    pinned: bool,
}

cashflow::impl_entity!(Widget {
    #[identity] widget_id,
    widget_type,
    position,
    label,
    pinned,
});

async fn widget_store() -> (support::TestApp, Store) {
    let app = support::TestApp::new().await.expect("test app");
    sqlx::query(
        "CREATE TABLE cfa_widget (
            widget_id INTEGER PRIMARY KEY AUTOINCREMENT,
            widget_type TEXT NOT NULL,
            position REAL,
            label TEXT,
            pinned INTEGER NOT NULL
        )",
    )
    .execute(app.state.store.pool())
    .await
    .expect("create widget table");
    let store = app.state.store.clone();
    (app, store)
}

fn widget(widget_type: &str) -> Widget {
    Widget {
        widget_id: 0,
        widget_type: widget_type.into(),
        position: Some(1.5),
        label: None,
        pinned: false,
    }
}

#[tokio::test]
async fn create_assigns_distinct_identities() {
    let (_app, store) = widget_store().await;
    let mut record = widget("cashflow");
    // A client-supplied identity is never sent to the store.
    record.widget_id = 999;

    let first = store.create(&record).await.expect("first insert");
    let second = store.create(&record).await.expect("second insert");

    assert_ne!(first, second);
    assert_ne!(first, 999);
    assert_ne!(second, 999);

    let stored = store
        .load(&widget("cashflow"), &["widget_type"])
        .await
        .expect("load widgets");
    let ids: Vec<_> = stored.iter().map(|w| w.widget_id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(stored[0].position, Some(1.5));
    assert_eq!(stored[0].label, None);
}

#[tokio::test]
async fn load_with_no_match_is_empty() {
    let (_app, store) = widget_store().await;
    store.create(&widget("balance")).await.expect("insert");

    let found = store
        .load(&widget("spending"), &["widget_type"])
        .await
        .expect("load");
    assert!(found.is_empty());
}

#[tokio::test]
async fn load_requires_a_condition() {
    let (_app, store) = widget_store().await;
    let err = store.load(&widget("balance"), &[]).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn load_combines_conditions() {
    let (_app, store) = widget_store().await;
    let mut pinned = widget("balance");
    pinned.pinned = true;
    let pinned_id = store.create(&pinned).await.expect("insert pinned");
    store.create(&widget("balance")).await.expect("insert unpinned");

    let found = store
        .load(&pinned, &["widget_type", "pinned"])
        .await
        .expect("load");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].widget_id, pinned_id);
}

#[tokio::test]
async fn update_rewrites_data_fields_by_condition() {
    let (_app, store) = widget_store().await;
    let id = store.create(&widget("balance")).await.expect("insert");
    let other = store.create(&widget("balance")).await.expect("insert other");

    let mut changed = widget("savings");
    changed.widget_id = id;
    changed.label = Some("Rainy day".into());
    changed.position = None;
    store
        .update(&changed, &["widget_id"])
        .await
        .expect("update");

    let reloaded = store.load(&changed, &["widget_id"]).await.expect("reload");
    assert_eq!(reloaded, vec![changed]);

    let untouched = store
        .load(&Widget { widget_id: other, ..widget("") }, &["widget_id"])
        .await
        .expect("reload other");
    assert_eq!(untouched[0].widget_type, "balance");
}

#[tokio::test]
async fn delete_ignores_non_condition_values() {
    let (_app, store) = widget_store().await;
    let id = store.create(&widget("balance")).await.expect("insert");
    let kept = store.create(&widget("balance")).await.expect("insert kept");

    let template = Widget {
        widget_id: id,
        widget_type: "does not matter".into(),
        position: Some(-1.0),
        label: Some("ignored".into()),
        pinned: true,
    };
    store.delete(&template, &["widget_id"]).await.expect("delete");

    let remaining = store
        .load(&widget("balance"), &["widget_type"])
        .await
        .expect("load");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].widget_id, kept);
}

#[tokio::test]
async fn delete_on_unknown_column_is_a_store_error() {
    let (_app, store) = widget_store().await;
    store.create(&widget("balance")).await.expect("insert");

    let err = store
        .delete(&widget("balance"), &["WidgetId"])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Database(_)), "got {err:?}");

    let remaining = store
        .load(&widget("balance"), &["widget_type"])
        .await
        .expect("load");
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn unique_username_is_enforced_by_the_store() {
    let app = support::TestApp::new().await.expect("test app");
    let now = Utc::now();
    let user = User {
        user_id: 0,
        username: "alice".into(),
        password_hash: "x".into(),
        is_active: false,
        created_at: now,
        updated_at: now,
    };
    assert_eq!(identity_field_name::<User>(), Some("user_id"));

    app.state.store.create(&user).await.expect("first insert");
    let err = app.state.store.create(&user).await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
}

#[tokio::test]
async fn advance_only_moves_forward() {
    let app = support::TestApp::new().await.expect("test app");
    let store = &app.state.store;
    let now = Utc::now();
    let user_id = store
        .create(&User {
            username: "bob".into(),
            created_at: now,
            updated_at: now,
            ..User::default()
        })
        .await
        .expect("insert user");

    let mut session = cashflow::models::session::Session {
        session_id: 0,
        user_id,
        created_at: now,
        expires_at: now + Duration::minutes(10),
        revoked_at: None,
    };
    session.session_id = store.create(&session).await.expect("insert session");

    let mut later = session.clone();
    later.expires_at = now + Duration::hours(2);
    assert!(store
        .advance(&later, "expires_at", &["session_id"])
        .await
        .expect("advance"));

    let mut earlier = session.clone();
    earlier.expires_at = now + Duration::hours(1);
    assert!(!store
        .advance(&earlier, "expires_at", &["session_id"])
        .await
        .expect("advance backwards"));

    let stored = app.session(session.session_id).await;
    assert_eq!(
        stored.expires_at.timestamp_millis(),
        later.expires_at.timestamp_millis()
    );
}
