use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::AppResult;
use crate::models::{
    Account, Comment, FollowEdge, FollowStatus, Gender, Post, PostStatus, Profile,
};

/// Async database handle with SQLx connection pool. Schema is created at
/// startup; all cross-request coordination goes through the store's
/// constraints and transactions.
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_staff INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                bio TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                date_of_birth TEXT,
                gender TEXT NOT NULL DEFAULT 'other',
                is_private INTEGER NOT NULL DEFAULT 0,
                followers_count INTEGER NOT NULL DEFAULT 0,
                following_count INTEGER NOT NULL DEFAULT 0,
                posts_count INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS follows (
                id INTEGER PRIMARY KEY,
                follower_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                following_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                status TEXT NOT NULL CHECK (status IN ('pending', 'accepted')),
                created INTEGER NOT NULL,
                UNIQUE(follower_id, following_id),
                CHECK(follower_id <> following_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('draft', 'scheduled', 'published')),
                scheduled_at INTEGER,
                published_at INTEGER,
                likes_count INTEGER NOT NULL DEFAULT 0,
                comments_count INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL,
                UNIQUE(author_id, title),
                CHECK(status <> 'scheduled' OR scheduled_at IS NOT NULL),
                CHECK(status <> 'published' OR published_at IS NOT NULL)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY(post_id, tag_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                created INTEGER NOT NULL,
                UNIQUE(post_id, profile_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                parent_id INTEGER REFERENCES comments(id) ON DELETE SET NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                id INTEGER PRIMARY KEY,
                jti TEXT NOT NULL UNIQUE,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                expires_at INTEGER NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Performance indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_follower ON follows(follower_id, status)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id, status)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author_created ON posts(author_id, created DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_status_scheduled ON posts(status, scheduled_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_profile ON likes(profile_id, created DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post_created ON comments(post_id, created)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_thread ON comments(post_id, parent_id, created)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expiry ON refresh_tokens(expires_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_staff, created, updated
             FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| map_account(&r)))
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_staff, created, updated
             FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| map_account(&r)))
    }

    pub async fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM profiles WHERE id = ?",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_profile(&r)).transpose().map_err(Into::into)
    }

    pub async fn get_profile_by_account(&self, account_id: i64) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM profiles WHERE account_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_profile(&r)).transpose().map_err(Into::into)
    }

    pub async fn get_follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<Option<FollowEdge>> {
        let row = sqlx::query(
            "SELECT id, follower_id, following_id, status, created
             FROM follows WHERE follower_id = ? AND following_id = ?",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_follow(&r)).transpose().map_err(Into::into)
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| map_post(&r)).transpose().map_err(Into::into)
    }

    pub async fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments WHERE id = ?",
            COMMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| map_comment(&r)))
    }

    // Begin a transaction - caller is responsible for commit/rollback
    pub async fn begin_transaction(&self) -> Result<sqlx::Transaction<'_, sqlx::Sqlite>> {
        Ok(self.pool.begin().await?)
    }
}

pub const PROFILE_COLUMNS: &str = "id, account_id, first_name, last_name, bio, location, \
     date_of_birth, gender, is_private, followers_count, following_count, posts_count, \
     created, updated";

pub const POST_COLUMNS: &str = "id, author_id, title, content, status, scheduled_at, \
     published_at, likes_count, comments_count, created, updated";

pub const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, content, parent_id, is_deleted, created, updated";

pub fn map_account(row: &SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_staff: row.get("is_staff"),
        created: row.get("created"),
        updated: row.get("updated"),
    }
}

pub fn map_profile(row: &SqliteRow) -> AppResult<Profile> {
    Ok(Profile {
        id: row.get("id"),
        account_id: row.get("account_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        bio: row.get("bio"),
        location: row.get("location"),
        date_of_birth: row.get("date_of_birth"),
        gender: Gender::parse(row.get::<String, _>("gender").as_str())?,
        is_private: row.get("is_private"),
        followers_count: row.get("followers_count"),
        following_count: row.get("following_count"),
        posts_count: row.get("posts_count"),
        created: row.get("created"),
        updated: row.get("updated"),
    })
}

pub fn map_follow(row: &SqliteRow) -> AppResult<FollowEdge> {
    Ok(FollowEdge {
        id: row.get("id"),
        follower_id: row.get("follower_id"),
        following_id: row.get("following_id"),
        status: FollowStatus::parse(row.get::<String, _>("status").as_str())?,
        created: row.get("created"),
    })
}

pub fn map_post(row: &SqliteRow) -> AppResult<Post> {
    Ok(Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        status: PostStatus::parse(row.get::<String, _>("status").as_str())?,
        scheduled_at: row.get("scheduled_at"),
        published_at: row.get("published_at"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        created: row.get("created"),
        updated: row.get("updated"),
    })
}

pub fn map_comment(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        parent_id: row.get("parent_id"),
        is_deleted: row.get("is_deleted"),
        created: row.get("created"),
        updated: row.get("updated"),
    }
}
