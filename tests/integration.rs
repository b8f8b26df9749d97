// End-to-end service tests over an in-memory SQLite pool, covering the
// follow workflow, content visibility, likes, scheduling and
// recommendations.

use std::sync::Arc;

use chrono::Utc;
use sqlx::Row;

use linkfeed::config::AuthConfig;
use linkfeed::database::Database;
use linkfeed::error::AppError;
use linkfeed::jobs;
use linkfeed::models::{FollowStatus, PostStatus, Profile};
use linkfeed::pagination::PageParams;
use linkfeed::scheduler::{publish_due, PostScheduler};
use linkfeed::security::{flush_expired_tokens, AuthService};
use linkfeed::services::{comments, follow, posts, recommendation};

async fn test_db() -> Arc<Database> {
    let db = Database::connect("sqlite::memory:", 1).await.unwrap();
    db.init().await.unwrap();
    Arc::new(db)
}

async fn register(db: &Database, email: &str) -> Profile {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO accounts (email, password_hash, is_staff, created, updated)
         VALUES (?, 'hash', 0, ?, ?)",
    )
    .bind(email)
    .bind(now)
    .bind(now)
    .execute(&db.pool)
    .await
    .unwrap();

    let account_id = result.last_insert_rowid();
    jobs::provision_profile(db, account_id).await.unwrap();
    db.get_profile_by_account(account_id).await.unwrap().unwrap()
}

async fn set_private(db: &Database, profile: &Profile) -> Profile {
    sqlx::query("UPDATE profiles SET is_private = 1 WHERE id = ?")
        .bind(profile.id)
        .execute(&db.pool)
        .await
        .unwrap();
    db.get_profile(profile.id).await.unwrap().unwrap()
}

async fn reload(db: &Database, profile: &Profile) -> Profile {
    db.get_profile(profile.id).await.unwrap().unwrap()
}

fn published_input(title: &str, content: &str) -> posts::PostInput {
    posts::PostInput {
        title: title.to_string(),
        content: content.to_string(),
        status: Some(PostStatus::Published),
        scheduled_at: None,
    }
}

/// Backdate an author's comments so the throttle does not trip in tests
/// that comment more than once per author.
async fn relax_throttle(db: &Database, profile_id: i64) {
    sqlx::query("UPDATE comments SET created = created - 60 WHERE author_id = ?")
        .bind(profile_id)
        .execute(&db.pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_profile_provisioning_is_idempotent() {
    let db = test_db().await;
    let profile = register(&db, "ada@example.com").await;

    let created_again = jobs::provision_profile(&db, profile.account_id)
        .await
        .unwrap();
    assert!(!created_again);

    let count: i64 = sqlx::query("SELECT COUNT(*) FROM profiles WHERE account_id = ?")
        .bind(profile.account_id)
        .fetch_one(&db.pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let db = test_db().await;
    register(&db, "dup@example.com").await;

    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO accounts (email, password_hash, is_staff, created, updated)
         VALUES (?, 'hash', 0, ?, ?)",
    )
    .bind("dup@example.com")
    .bind(now)
    .bind(now)
    .execute(&db.pool)
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_follow_public_is_accepted_and_counted() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let outcome = follow::follow(&db, &alice, bob.id).await.unwrap();
    assert_eq!(outcome.status, FollowStatus::Accepted);

    let alice = reload(&db, &alice).await;
    let bob = reload(&db, &bob).await;
    assert_eq!(alice.following_count, 1);
    assert_eq!(bob.followers_count, 1);
}

#[tokio::test]
async fn test_duplicate_follow_rejected() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    follow::follow(&db, &alice, bob.id).await.unwrap();
    let err = follow::follow(&db, &alice, bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let count: i64 = sqlx::query(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND following_id = ?",
    )
    .bind(alice.id)
    .bind(bob.id)
    .fetch_one(&db.pool)
    .await
    .unwrap()
    .get(0);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_self_follow_rejected() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;

    let err = follow::follow(&db, &alice, alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_follow_private_pending_then_accept() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let carol = set_private(&db, &register(&db, "carol@example.com").await).await;

    let outcome = follow::follow(&db, &alice, carol.id).await.unwrap();
    assert_eq!(outcome.status, FollowStatus::Pending);

    // Pending edges are not counted yet.
    assert_eq!(reload(&db, &carol).await.followers_count, 0);

    let requests = follow::pending_requests(&db, &carol).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].follower_id, alice.id);

    follow::accept_request(&db, &carol, alice.id).await.unwrap();
    assert_eq!(
        follow::follow_status(&db, alice.id, carol.id).await.unwrap(),
        Some(FollowStatus::Accepted)
    );
    assert_eq!(reload(&db, &carol).await.followers_count, 1);
    assert_eq!(reload(&db, &alice).await.following_count, 1);

    // Accepting again is invalid: the edge is no longer pending.
    let err = follow::accept_request(&db, &carol, alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reject_deletes_edge() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let carol = set_private(&db, &register(&db, "carol@example.com").await).await;

    follow::follow(&db, &alice, carol.id).await.unwrap();
    follow::reject_request(&db, &carol, alice.id).await.unwrap();

    assert_eq!(
        follow::follow_status(&db, alice.id, carol.id).await.unwrap(),
        None
    );

    // Rejecting with no pending edge fails.
    let err = follow::reject_request(&db, &carol, alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // The follower can start over after a rejection.
    let outcome = follow::follow(&db, &alice, carol.id).await.unwrap();
    assert_eq!(outcome.status, FollowStatus::Pending);
}

#[tokio::test]
async fn test_unfollow_decrements_counters() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    follow::follow(&db, &alice, bob.id).await.unwrap();
    let deleted = follow::unfollow(&db, &alice, bob.id).await.unwrap();
    assert!(deleted);

    assert_eq!(reload(&db, &alice).await.following_count, 0);
    assert_eq!(reload(&db, &bob).await.followers_count, 0);

    // Unfollowing a missing edge is reported, not an error.
    let deleted = follow::unfollow(&db, &alice, bob.id).await.unwrap();
    assert!(!deleted);
}

#[tokio::test]
async fn test_like_is_idempotent() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let post = posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Hello", "First post #intro"),
    )
    .await
    .unwrap();

    let status = posts::like_post(&db, &bob, post.id).await.unwrap();
    assert!(status.liked);
    assert_eq!(status.likes_count, 1);

    // Second like is a no-op.
    let status = posts::like_post(&db, &bob, post.id).await.unwrap();
    assert_eq!(status.likes_count, 1);

    let status = posts::unlike_post(&db, &bob, post.id).await.unwrap();
    assert!(!status.liked);
    assert_eq!(status.likes_count, 0);

    // Second unlike is a no-op too.
    let status = posts::unlike_post(&db, &bob, post.id).await.unwrap();
    assert_eq!(status.likes_count, 0);

    let status = posts::like_status(&db, &bob, post.id).await.unwrap();
    assert!(!status.liked);
}

#[tokio::test]
async fn test_post_create_extracts_tags_and_counts() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;

    let post = posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Tagged", "Learning #Rust and #async today"),
    )
    .await
    .unwrap();

    assert_eq!(post.tags, vec!["async", "rust"]);
    assert_eq!(post.status, PostStatus::Published);
    assert!(post.published_at.is_some());
    assert_eq!(reload(&db, &alice).await.posts_count, 1);

    // Duplicate title by the same author is rejected.
    let err = posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Tagged", "other content"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_scheduled_post_requires_future_time() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;

    let err = posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "Later".to_string(),
            content: "soon".to_string(),
            status: Some(PostStatus::Scheduled),
            scheduled_at: Some(Utc::now().timestamp() - 10),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_reschedule_keeps_exactly_one_timer() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let at = Utc::now().timestamp() + 3600;

    let post = posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "Later".to_string(),
            content: "soon".to_string(),
            status: Some(PostStatus::Scheduled),
            scheduled_at: Some(at),
        },
    )
    .await
    .unwrap();
    assert_eq!(scheduler.active_timers().await, 1);

    // Editing the publish time cancels the old timer and arms one new one.
    let updated = posts::update_post(
        &db,
        &scheduler,
        &alice,
        post.id,
        posts::PostUpdate {
            scheduled_at: Some(at + 3600),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.scheduled_at, Some(at + 3600));
    assert_eq!(scheduler.active_timers().await, 1);

    // Reverting to draft cancels the timer and clears the publish time.
    let updated = posts::update_post(
        &db,
        &scheduler,
        &alice,
        post.id,
        posts::PostUpdate {
            status: Some(PostStatus::Draft),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.status, PostStatus::Draft);
    assert_eq!(updated.scheduled_at, None);
    assert_eq!(scheduler.active_timers().await, 0);
}

#[tokio::test]
async fn test_publish_guard_only_fires_when_due_and_scheduled() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let at = Utc::now().timestamp() + 3600;

    let post = posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "Later".to_string(),
            content: "soon".to_string(),
            status: Some(PostStatus::Scheduled),
            scheduled_at: Some(at),
        },
    )
    .await
    .unwrap();
    scheduler.cancel(post.id).await;

    // Not due yet.
    assert!(!publish_due(&db, post.id).await.unwrap());

    // Make it due, then the guarded update publishes exactly once.
    sqlx::query("UPDATE posts SET scheduled_at = ? WHERE id = ?")
        .bind(Utc::now().timestamp() - 5)
        .bind(post.id)
        .execute(&db.pool)
        .await
        .unwrap();
    assert!(publish_due(&db, post.id).await.unwrap());
    assert!(!publish_due(&db, post.id).await.unwrap());

    let row = db.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(row.status, PostStatus::Published);
    assert!(row.published_at.is_some());
    assert_eq!(row.scheduled_at, None);
}

#[tokio::test]
async fn test_manual_publish_wins_race_against_timer() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;

    let post = posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "Later".to_string(),
            content: "soon".to_string(),
            status: Some(PostStatus::Scheduled),
            scheduled_at: Some(Utc::now().timestamp() + 3600),
        },
    )
    .await
    .unwrap();

    let updated = posts::update_post(
        &db,
        &scheduler,
        &alice,
        post.id,
        posts::PostUpdate {
            status: Some(PostStatus::Published),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.status, PostStatus::Published);
    assert_eq!(scheduler.active_timers().await, 0);

    // A straggler timer firing now must be a no-op.
    assert!(!publish_due(&db, post.id).await.unwrap());
}

#[tokio::test]
async fn test_published_post_status_is_terminal() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;

    let post = posts::create_post(&db, &scheduler, &alice, published_input("Done", "text"))
        .await
        .unwrap();

    let err = posts::update_post(
        &db,
        &scheduler,
        &alice,
        post.id,
        posts::PostUpdate {
            status: Some(PostStatus::Draft),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = posts::update_post(
        &db,
        &scheduler,
        &alice,
        post.id,
        posts::PostUpdate {
            scheduled_at: Some(Utc::now().timestamp() + 3600),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_scheduler_recovery_rearms_timers() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;

    posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "Later".to_string(),
            content: "soon".to_string(),
            status: Some(PostStatus::Scheduled),
            scheduled_at: Some(Utc::now().timestamp() + 3600),
        },
    )
    .await
    .unwrap();

    // A fresh scheduler (as after restart) finds the row and re-arms it.
    let recovered = PostScheduler::new(db.clone());
    let count = recovered.recover().await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(recovered.active_timers().await, 1);
}

#[tokio::test]
async fn test_scheduler_recovery_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("linkfeed.db").display()
    );

    let at = Utc::now().timestamp() + 3600;
    {
        let db = Arc::new(Database::connect(&url, 1).await.unwrap());
        db.init().await.unwrap();
        let scheduler = PostScheduler::new(db.clone());
        let alice = register(&db, "alice@example.com").await;
        posts::create_post(
            &db,
            &scheduler,
            &alice,
            posts::PostInput {
                title: "Later".to_string(),
                content: "soon".to_string(),
                status: Some(PostStatus::Scheduled),
                scheduled_at: Some(at),
            },
        )
        .await
        .unwrap();
    }

    // Fresh process: reconnect and re-arm from the table alone.
    let db = Arc::new(Database::connect(&url, 1).await.unwrap());
    db.init().await.unwrap();
    let scheduler = PostScheduler::new(db.clone());
    assert_eq!(scheduler.recover().await.unwrap(), 1);
    assert_eq!(scheduler.active_timers().await, 1);
}

#[tokio::test]
async fn test_private_posts_visible_only_to_accepted_followers() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let carol = set_private(&db, &register(&db, "carol@example.com").await).await;
    let bob = register(&db, "bob@example.com").await;

    let post = posts::create_post(&db, &scheduler, &carol, published_input("Secret", "text"))
        .await
        .unwrap();

    // Invisible: not a follower.
    let err = posts::resolve_visible_post(&db, &bob, post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Still invisible while the request is pending.
    follow::follow(&db, &bob, carol.id).await.unwrap();
    assert!(posts::resolve_visible_post(&db, &bob, post.id).await.is_err());

    // Visible once accepted.
    follow::accept_request(&db, &carol, bob.id).await.unwrap();
    assert!(posts::resolve_visible_post(&db, &bob, post.id).await.is_ok());

    // Always visible to the owner.
    assert!(posts::resolve_visible_post(&db, &carol, post.id).await.is_ok());

    let page = posts::list_posts(&db, &bob, None, None, None, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, post.id);
}

#[tokio::test]
async fn test_public_posts_visible_without_follow() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let post = posts::create_post(&db, &scheduler, &alice, published_input("Open", "text"))
        .await
        .unwrap();

    assert!(posts::resolve_visible_post(&db, &bob, post.id).await.is_ok());

    // Drafts stay private to the author even on public profiles.
    let draft = posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "WIP".to_string(),
            content: "text".to_string(),
            status: None,
            scheduled_at: None,
        },
    )
    .await
    .unwrap();
    assert!(posts::resolve_visible_post(&db, &bob, draft.id).await.is_err());
    assert!(posts::resolve_visible_post(&db, &alice, draft.id).await.is_ok());
}

#[tokio::test]
async fn test_my_posts_includes_all_statuses() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;

    posts::create_post(&db, &scheduler, &alice, published_input("One", "text"))
        .await
        .unwrap();
    posts::create_post(
        &db,
        &scheduler,
        &alice,
        posts::PostInput {
            title: "Two".to_string(),
            content: "text".to_string(),
            status: None,
            scheduled_at: None,
        },
    )
    .await
    .unwrap();

    let page = posts::my_posts(&db, &alice, None, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.count, 2);

    let page = posts::my_posts(&db, &alice, Some(PostStatus::Draft), PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].title, "Two");
}

#[tokio::test]
async fn test_posts_by_tag_modes() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Both", "#go and #rust"),
    )
    .await
    .unwrap();
    posts::create_post(&db, &scheduler, &alice, published_input("GoOnly", "#go"))
        .await
        .unwrap();

    let tags = posts::parse_tag_filter("go, rust");
    let page = posts::posts_by_tag(&db, &bob, &tags, posts::TagMode::All, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].title, "Both");

    let page = posts::posts_by_tag(&db, &bob, &tags, posts::TagMode::Any, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.count, 2);
}

#[tokio::test]
async fn test_comment_thread_and_soft_delete() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let post = posts::create_post(&db, &scheduler, &alice, published_input("Post", "text"))
        .await
        .unwrap();

    let top = comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post.id,
            content: "first".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap();

    let reply = comments::create_comment(
        &db,
        &alice,
        comments::CommentInput {
            post_id: post.id,
            content: "reply".to_string(),
            parent_id: Some(top.id),
        },
    )
    .await
    .unwrap();
    assert_eq!(reply.parent_id, Some(top.id));

    let children = comments::children(&db, &bob, top.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, reply.id);

    assert_eq!(
        db.get_post(post.id).await.unwrap().unwrap().comments_count,
        2
    );

    // Replies attach to top-level comments only.
    relax_throttle(&db, bob.id).await;
    let err = comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post.id,
            content: "nested".to_string(),
            parent_id: Some(reply.id),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Soft delete hides the comment and decrements the counter.
    comments::delete_comment(&db, &bob, top.id).await.unwrap();
    let err = comments::get_comment_view(&db, &bob, top.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(
        db.get_post(post.id).await.unwrap().unwrap().comments_count,
        1
    );

    // The row is still there, just flagged.
    let flagged: bool = sqlx::query("SELECT is_deleted FROM comments WHERE id = ?")
        .bind(top.id)
        .fetch_one(&db.pool)
        .await
        .unwrap()
        .get(0);
    assert!(flagged);
}

#[tokio::test]
async fn test_comment_parent_must_match_post() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let post_a = posts::create_post(&db, &scheduler, &alice, published_input("A", "text"))
        .await
        .unwrap();
    let post_b = posts::create_post(&db, &scheduler, &alice, published_input("B", "text"))
        .await
        .unwrap();

    let top = comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post_a.id,
            content: "first".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap();

    relax_throttle(&db, bob.id).await;
    let err = comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post_b.id,
            content: "wrong thread".to_string(),
            parent_id: Some(top.id),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_comment_throttle() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let post = posts::create_post(&db, &scheduler, &alice, published_input("Post", "text"))
        .await
        .unwrap();

    comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post.id,
            content: "first".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap();

    let err = comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post.id,
            content: "too fast".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_comment_on_invisible_post_forbidden() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let carol = set_private(&db, &register(&db, "carol@example.com").await).await;
    let bob = register(&db, "bob@example.com").await;

    let post = posts::create_post(&db, &scheduler, &carol, published_input("Secret", "text"))
        .await
        .unwrap();

    let err = comments::create_comment(
        &db,
        &bob,
        comments::CommentInput {
            post_id: post.id,
            content: "hi".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_recommendations_rank_by_tag_overlap() {
    let db = test_db().await;
    let scheduler = PostScheduler::new(db.clone());
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;

    let liked = posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Go intro", "Start here #go"),
    )
    .await
    .unwrap();
    let overlap_two = posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Go and Rust", "#go with #rust"),
    )
    .await
    .unwrap();
    let unrelated = posts::create_post(
        &db,
        &scheduler,
        &alice,
        published_input("Dinner", "#cooking tonight"),
    )
    .await
    .unwrap();
    // Bob's own tagged post must never be recommended to him.
    let own = posts::create_post(
        &db,
        &scheduler,
        &bob,
        published_input("My go post", "also #go"),
    )
    .await
    .unwrap();

    posts::like_post(&db, &bob, liked.id).await.unwrap();
    posts::like_post(&db, &bob, overlap_two.id).await.unwrap();

    let page = recommendation::recommended(&db, &bob, PageParams::default())
        .await
        .unwrap();

    let ids: Vec<i64> = page.results.iter().map(|p| p.id).collect();
    assert!(ids.contains(&liked.id));
    assert!(ids.contains(&overlap_two.id));
    assert!(!ids.contains(&unrelated.id));
    assert!(!ids.contains(&own.id));

    // Two shared tags outrank one.
    assert_eq!(page.results[0].id, overlap_two.id);
    assert_eq!(page.results[0].tag_overlap, 2);
}

#[tokio::test]
async fn test_token_pair_refresh_and_revoke() {
    let db = test_db().await;
    let auth = AuthService::new(AuthConfig {
        jwt_secret: "test-secret".to_string(),
        access_token_minutes: 180,
        refresh_token_minutes: 1440,
        password_min_length: 5,
    });
    let profile = register(&db, "ada@example.com").await;

    let pair = auth.issue_token_pair(&db, profile.account_id).await.unwrap();

    let claims = auth.validate_access(&pair.access).unwrap();
    assert_eq!(claims.account_id().unwrap(), profile.account_id);

    // The refresh token is not valid as a bearer token.
    assert!(auth.validate_access(&pair.refresh).is_err());

    let access = auth.refresh_access(&db, &pair.refresh).await.unwrap();
    assert!(auth.validate_access(&access).is_ok());

    auth.revoke_refresh_token(&db, profile.account_id, &pair.refresh)
        .await
        .unwrap();
    let err = auth.refresh_access(&db, &pair.refresh).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_expired_token_cleanup() {
    let db = test_db().await;
    let profile = register(&db, "ada@example.com").await;
    let now = Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO refresh_tokens (jti, account_id, expires_at, revoked, created)
         VALUES ('expired-jti', ?, ?, 0, ?)",
    )
    .bind(profile.account_id)
    .bind(now - 100)
    .bind(now - 200)
    .execute(&db.pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO refresh_tokens (jti, account_id, expires_at, revoked, created)
         VALUES ('live-jti', ?, ?, 0, ?)",
    )
    .bind(profile.account_id)
    .bind(now + 10_000)
    .bind(now)
    .execute(&db.pool)
    .await
    .unwrap();

    let deleted = flush_expired_tokens(&db).await.unwrap();
    assert_eq!(deleted, 1);

    let remaining: i64 = sqlx::query("SELECT COUNT(*) FROM refresh_tokens")
        .fetch_one(&db.pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_profile_listing_annotates_follow_status() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let bob = register(&db, "bob@example.com").await;
    let carol = set_private(&db, &register(&db, "carol@example.com").await).await;

    follow::follow(&db, &alice, bob.id).await.unwrap();
    follow::follow(&db, &alice, carol.id).await.unwrap();

    let page = follow::list_profiles(&db, Some(&alice), PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.count, 2);
    for entry in &page.results {
        assert_ne!(entry.id, alice.id);
        if entry.id == bob.id {
            assert_eq!(entry.follow_status, Some(FollowStatus::Accepted));
        } else {
            assert_eq!(entry.follow_status, Some(FollowStatus::Pending));
        }
    }
}

#[tokio::test]
async fn test_profile_privacy_rule() {
    let db = test_db().await;
    let alice = register(&db, "alice@example.com").await;
    let carol = set_private(&db, &register(&db, "carol@example.com").await).await;

    // Private profiles hide details from strangers and anonymous viewers.
    assert!(!follow::can_view_profile(&db, Some(&alice), &carol).await.unwrap());
    assert!(!follow::can_view_profile(&db, None, &carol).await.unwrap());
    assert!(follow::can_view_profile(&db, Some(&carol), &carol).await.unwrap());

    follow::follow(&db, &alice, carol.id).await.unwrap();
    follow::accept_request(&db, &carol, alice.id).await.unwrap();
    assert!(follow::can_view_profile(&db, Some(&alice), &carol).await.unwrap());

    // Public profiles are open to everyone.
    assert!(follow::can_view_profile(&db, None, &alice).await.unwrap());
}
