//! Entity store trait and the SQLite implementation.

use crate::cas::{Bind, cas_update};
use crate::error::{MetadataError, MetadataResult};
use crate::models::{BookRow, BooklistRow, CommentRow, RequestRow, ReviewRow, TokenRow, UserRow};
use crate::repos::{
    BookRepo, BooklistRepo, CommentRepo, OwnershipRepo, RequestRepo, ReviewRepo, TokenRepo,
    UserRepo,
};
use async_trait::async_trait;
use bindery_core::{ResourceKind, TokenScope};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Combined entity store trait.
#[async_trait]
pub trait MetadataStore:
    UserRepo
    + TokenRepo
    + BookRepo
    + ReviewRepo
    + CommentRepo
    + BooklistRepo
    + RequestRepo
    + OwnershipRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Default per-query deadline so a stalled query cannot exhaust the
/// request-handling pool.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// SQLite-based entity store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = query_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Config(format!("cannot create {parent:?}: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under load.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        // The deadline is advisory: SQLite has no statement cancellation, so
        // a timed-out query keeps running on the connection until it finishes.
        tracing::info!(
            path = %path.display(),
            query_timeout_secs = query_timeout.as_secs(),
            "SQLite entity store ready"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run a store future under the configured deadline.
    ///
    /// The same deadline doubles as the cancellation point: when the request
    /// future is dropped, the query future is dropped with it.
    async fn with_deadline<T, E, F>(&self, fut: F) -> MetadataResult<T>
    where
        E: Into<MetadataError>,
        F: Future<Output = Result<T, E>> + Send,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                tracing::warn!(
                    query_timeout_secs = self.query_timeout.as_secs(),
                    "store query exceeded its deadline"
                );
                Err(MetadataError::Timeout(self.query_timeout))
            }
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                activated INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                scope TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tokens_user_scope ON tokens(user_id, scope)",
            r#"
            CREATE TABLE IF NOT EXISTS books (
                book_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                owner_id TEXT NOT NULL REFERENCES users(user_id),
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                year INTEGER NOT NULL,
                pages INTEGER NOT NULL,
                genres TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_books_owner ON books(owner_id)",
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                review_id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL REFERENCES books(book_id) ON DELETE CASCADE,
                owner_id TEXT NOT NULL REFERENCES users(user_id),
                rating INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_reviews_book ON reviews(book_id)",
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                comment_id TEXT PRIMARY KEY,
                review_id TEXT NOT NULL REFERENCES reviews(review_id) ON DELETE CASCADE,
                owner_id TEXT NOT NULL REFERENCES users(user_id),
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_comments_review ON comments(review_id)",
            r#"
            CREATE TABLE IF NOT EXISTS booklists (
                booklist_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(user_id),
                name TEXT NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                request_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(user_id),
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.with_deadline(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for SqliteStore {
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
        let query = sqlx::query(
            r#"
            INSERT INTO users (user_id, created_at, name, email, password_hash, activated, version)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.user_id)
        .bind(user.created_at)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.activated)
        .bind(user.version)
        .execute(&self.pool);

        let result = tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| MetadataError::Timeout(self.query_timeout))?;
        result.map_err(|e| {
            MetadataError::classify_unique(e, &format!("user with email {}", user.email))
        })?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
        self.with_deadline(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
        self.with_deadline(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn update_user(&self, user: &UserRow) -> MetadataResult<i64> {
        self.with_deadline(cas_update(
            &self.pool,
            "users",
            "user_id",
            user.user_id,
            user.version,
            &[
                ("name", Bind::Text(user.name.clone())),
                ("email", Bind::Text(user.email.clone())),
                ("password_hash", Bind::Text(user.password_hash.clone())),
                ("activated", Bind::Bool(user.activated)),
            ],
        ))
        .await
    }
}

#[async_trait]
impl TokenRepo for SqliteStore {
    async fn insert_token(&self, token: &TokenRow) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query(
                r#"
                INSERT INTO tokens (token_hash, user_id, scope, expires_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&token.token_hash)
            .bind(token.user_id)
            .bind(&token.scope)
            .bind(token.expires_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn user_for_token(
        &self,
        scope: TokenScope,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<UserRow>> {
        // datetime() normalizes both sides so lexicographic quirks of
        // fractional-second formatting cannot misorder the comparison.
        self.with_deadline(
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT users.*
                FROM users
                INNER JOIN tokens ON tokens.user_id = users.user_id
                WHERE tokens.token_hash = ?
                  AND tokens.scope = ?
                  AND datetime(tokens.expires_at) > datetime(?)
                "#,
            )
            .bind(token_hash)
            .bind(scope.as_str())
            .bind(now)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: Uuid,
    ) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query("DELETE FROM tokens WHERE scope = ? AND user_id = ?")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn count_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: Uuid,
    ) -> MetadataResult<u64> {
        let count: i64 = self
            .with_deadline(
                sqlx::query_scalar("SELECT COUNT(*) FROM tokens WHERE scope = ? AND user_id = ?")
                    .bind(scope.as_str())
                    .bind(user_id)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl BookRepo for SqliteStore {
    async fn create_book(&self, book: &BookRow) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query(
                r#"
                INSERT INTO books (book_id, created_at, owner_id, title, author, year, pages, genres, version)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(book.book_id)
            .bind(book.created_at)
            .bind(book.owner_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.year)
            .bind(book.pages)
            .bind(&book.genres)
            .bind(book.version)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_book(&self, book_id: Uuid) -> MetadataResult<Option<BookRow>> {
        self.with_deadline(
            sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE book_id = ?")
                .bind(book_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_books(&self) -> MetadataResult<Vec<BookRow>> {
        self.with_deadline(
            sqlx::query_as::<_, BookRow>("SELECT * FROM books ORDER BY created_at DESC")
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_book(&self, book: &BookRow) -> MetadataResult<i64> {
        self.with_deadline(cas_update(
            &self.pool,
            "books",
            "book_id",
            book.book_id,
            book.version,
            &[
                ("title", Bind::Text(book.title.clone())),
                ("author", Bind::Text(book.author.clone())),
                ("year", Bind::Int(book.year)),
                ("pages", Bind::Int(book.pages)),
                ("genres", Bind::Text(book.genres.clone())),
            ],
        ))
        .await
    }

    async fn delete_book(&self, book_id: Uuid) -> MetadataResult<()> {
        let result = self
            .with_deadline(
                sqlx::query("DELETE FROM books WHERE book_id = ?")
                    .bind(book_id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("book {book_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepo for SqliteStore {
    async fn create_review(&self, review: &ReviewRow) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query(
                r#"
                INSERT INTO reviews (review_id, book_id, owner_id, rating, body, created_at, version)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(review.review_id)
            .bind(review.book_id)
            .bind(review.owner_id)
            .bind(review.rating)
            .bind(&review.body)
            .bind(review.created_at)
            .bind(review.version)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_review(&self, review_id: Uuid) -> MetadataResult<Option<ReviewRow>> {
        self.with_deadline(
            sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE review_id = ?")
                .bind(review_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn update_review(&self, review: &ReviewRow) -> MetadataResult<i64> {
        self.with_deadline(cas_update(
            &self.pool,
            "reviews",
            "review_id",
            review.review_id,
            review.version,
            &[
                ("rating", Bind::Int(review.rating)),
                ("body", Bind::Text(review.body.clone())),
            ],
        ))
        .await
    }

    async fn delete_review(&self, review_id: Uuid) -> MetadataResult<()> {
        let result = self
            .with_deadline(
                sqlx::query("DELETE FROM reviews WHERE review_id = ?")
                    .bind(review_id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("review {review_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepo for SqliteStore {
    async fn create_comment(&self, comment: &CommentRow) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query(
                r#"
                INSERT INTO comments (comment_id, review_id, owner_id, body, created_at, version)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(comment.comment_id)
            .bind(comment.review_id)
            .bind(comment.owner_id)
            .bind(&comment.body)
            .bind(comment.created_at)
            .bind(comment.version)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_comment(&self, comment_id: Uuid) -> MetadataResult<Option<CommentRow>> {
        self.with_deadline(
            sqlx::query_as::<_, CommentRow>("SELECT * FROM comments WHERE comment_id = ?")
                .bind(comment_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn update_comment(&self, comment: &CommentRow) -> MetadataResult<i64> {
        self.with_deadline(cas_update(
            &self.pool,
            "comments",
            "comment_id",
            comment.comment_id,
            comment.version,
            &[("body", Bind::Text(comment.body.clone()))],
        ))
        .await
    }

    async fn delete_comment(&self, comment_id: Uuid) -> MetadataResult<()> {
        let result = self
            .with_deadline(
                sqlx::query("DELETE FROM comments WHERE comment_id = ?")
                    .bind(comment_id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("comment {comment_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BooklistRepo for SqliteStore {
    async fn create_booklist(&self, booklist: &BooklistRow) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query(
                r#"
                INSERT INTO booklists (booklist_id, owner_id, name, is_public, created_at, version)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(booklist.booklist_id)
            .bind(booklist.owner_id)
            .bind(&booklist.name)
            .bind(booklist.is_public)
            .bind(booklist.created_at)
            .bind(booklist.version)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_booklist(&self, booklist_id: Uuid) -> MetadataResult<Option<BooklistRow>> {
        self.with_deadline(
            sqlx::query_as::<_, BooklistRow>("SELECT * FROM booklists WHERE booklist_id = ?")
                .bind(booklist_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn update_booklist(&self, booklist: &BooklistRow) -> MetadataResult<i64> {
        self.with_deadline(cas_update(
            &self.pool,
            "booklists",
            "booklist_id",
            booklist.booklist_id,
            booklist.version,
            &[
                ("name", Bind::Text(booklist.name.clone())),
                ("is_public", Bind::Bool(booklist.is_public)),
            ],
        ))
        .await
    }

    async fn delete_booklist(&self, booklist_id: Uuid) -> MetadataResult<()> {
        let result = self
            .with_deadline(
                sqlx::query("DELETE FROM booklists WHERE booklist_id = ?")
                    .bind(booklist_id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("booklist {booklist_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestRepo for SqliteStore {
    async fn create_request(&self, request: &RequestRow) -> MetadataResult<()> {
        self.with_deadline(
            sqlx::query(
                r#"
                INSERT INTO requests (request_id, owner_id, title, author, status, created_at, version)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(request.request_id)
            .bind(request.owner_id)
            .bind(&request.title)
            .bind(&request.author)
            .bind(&request.status)
            .bind(request.created_at)
            .bind(request.version)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_request(&self, request_id: Uuid) -> MetadataResult<Option<RequestRow>> {
        self.with_deadline(
            sqlx::query_as::<_, RequestRow>("SELECT * FROM requests WHERE request_id = ?")
                .bind(request_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn update_request(&self, request: &RequestRow) -> MetadataResult<i64> {
        self.with_deadline(cas_update(
            &self.pool,
            "requests",
            "request_id",
            request.request_id,
            request.version,
            &[("status", Bind::Text(request.status.clone()))],
        ))
        .await
    }
}

#[async_trait]
impl OwnershipRepo for SqliteStore {
    async fn owner_of(&self, kind: ResourceKind, id: Uuid) -> MetadataResult<Option<Uuid>> {
        // Table and column names are fixed per kind, never request input.
        let (table, id_column) = match kind {
            ResourceKind::Book => ("books", "book_id"),
            ResourceKind::Review => ("reviews", "review_id"),
            ResourceKind::Comment => ("comments", "comment_id"),
            ResourceKind::Booklist => ("booklists", "booklist_id"),
        };
        let sql = format!("SELECT owner_id FROM {table} WHERE {id_column} = ?");
        self.with_deadline(
            sqlx::query_scalar::<_, Uuid>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }
}
