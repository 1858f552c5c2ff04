//! PostgreSQL store
//!
//! Implements the storage traits using SQLx and PostgreSQL. Queries are
//! checked at runtime; the schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;

use crate::store::{
    AccountRepository, CommentRepository, OwnershipRepository, PhotoFilterRepository,
    PhotoRepository, RatingRepository, TagRepository, TransformationRepository,
};
use crate::{
    Account, AccountId, AccountQuery, AccountUpdate, Comment, NewAccount, NewComment, NewPhoto,
    NewPhotoFilter, NewPhotoTransformation, Photo, PhotoFilter, PhotoFilterUpdate, PhotoQuery,
    PhotoShareError, PhotoTransformation, PresetStep, RatedPhoto, Rating, RatingSummary,
    ResourceKind, Result, Role, Tag,
};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "PostgreSQL connection failed");
                PhotoShareError::DatabaseError(format!("PostgreSQL connection failed: {e}"))
            })?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        tracing::debug!("Applying database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PhotoShareError::DatabaseError(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations up to date");
        Ok(())
    }

    async fn load_tags(&self, photo_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        let rows: Vec<PhotoTagRow> = sqlx::query_as(
            r#"
            SELECT pt.photo_id, t.id, t.name
            FROM photo_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.photo_id = ANY($1)
            ORDER BY pt.photo_id, pt.position
            "#,
        )
        .bind(photo_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load photo tags"))?;

        let mut by_photo: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_photo.entry(row.photo_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
            });
        }
        Ok(by_photo)
    }

    async fn with_tags(&self, row: PhotoRow) -> Result<Photo> {
        let mut tags = self.load_tags(&[row.id]).await?;
        let photo_tags = tags.remove(&row.id).unwrap_or_default();
        Ok(row.into_photo(photo_tags))
    }
}

/// Map an sqlx error, turning constraint violations into domain errors
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> PhotoShareError {
    move |e| {
        if let Some(db) = e.as_database_error() {
            if db.is_unique_violation() {
                return PhotoShareError::Conflict(format!("{context}: record already exists"));
            }
            if db.is_foreign_key_violation() {
                return PhotoShareError::NotFound(format!("{context}: referenced record"));
            }
        }
        PhotoShareError::DatabaseError(format!("Failed to {context}: {e}"))
    }
}

async fn attach_tags(
    tx: &mut Transaction<'_, Postgres>,
    photo_id: i64,
    names: &[String],
) -> Result<()> {
    for (position, name) in names.iter().enumerate() {
        let tag_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .map_err(db_error("upsert tag"))?;

        sqlx::query(
            r#"
            INSERT INTO photo_tags (photo_id, tag_id, position) VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(photo_id)
        .bind(tag_id)
        .bind(position as i32)
        .execute(&mut **tx)
        .await
        .map_err(db_error("attach tag"))?;
    }
    Ok(())
}

// ============================================================================
// Rows
// ============================================================================

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, role, confirmed, active, \
                               refresh_token, avatar, created_at, updated_at";

const PHOTO_COLUMNS: &str = "id, user_id, url, public_id, description, created_at, updated_at";

const FILTER_COLUMNS: &str = "id, user_id, name, description, preset, created_at, updated_at";

const TRANSFORMATION_COLUMNS: &str =
    "id, photo_id, transformed_url, description, created_at, updated_at";

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    confirmed: bool,
    active: bool,
    refresh_token: Option<String>,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            // The CHECK constraint keeps this in the enumeration
            role: row.role.parse().unwrap_or_default(),
            confirmed: row.confirmed,
            active: row.active,
            refresh_token: row.refresh_token,
            avatar: row.avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PhotoRow {
    id: i64,
    user_id: i64,
    url: String,
    public_id: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PhotoRow {
    fn into_photo(self, tags: Vec<Tag>) -> Photo {
        Photo {
            id: self.id,
            owner_id: self.user_id,
            url: self.url,
            public_id: self.public_id,
            description: self.description,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RatedPhotoRow {
    #[sqlx(flatten)]
    photo: PhotoRow,
    average_rating: Option<f64>,
}

#[derive(Debug, FromRow)]
struct PhotoTagRow {
    photo_id: i64,
    id: i64,
    name: String,
}

#[derive(Debug, FromRow)]
struct TagRow {
    id: i64,
    name: String,
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    photo_id: i64,
    user_id: i64,
    text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            photo_id: row.photo_id,
            author_id: row.user_id,
            text: row.text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RatingRow {
    photo_id: i64,
    user_id: i64,
    rate: i16,
    created_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating {
            photo_id: row.photo_id,
            user_id: row.user_id,
            rate: row.rate,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct FilterRow {
    id: i64,
    user_id: i64,
    name: String,
    description: Option<String>,
    preset: Json<Vec<PresetStep>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FilterRow> for PhotoFilter {
    fn from(row: FilterRow) -> Self {
        PhotoFilter {
            id: row.id,
            owner_id: row.user_id,
            name: row.name,
            description: row.description,
            preset: row.preset.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransformationRow {
    id: i64,
    photo_id: i64,
    transformed_url: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TransformationRow> for PhotoTransformation {
    fn from(row: TransformationRow) -> Self {
        PhotoTransformation {
            id: row.id,
            photo_id: row.photo_id,
            transformed_url: row.transformed_url,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[async_trait]
impl AccountRepository for PgStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create account"))?;

        Ok(row.into())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find account by email"))?;

        Ok(row.map(Account::from))
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find account by id"))?;

        Ok(row.map(Account::from))
    }

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM users
            WHERE ($1::text IS NULL OR username ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR email ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR role = $3)
            ORDER BY id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&query.username)
        .bind(&query.email)
        .bind(query.role.map(|r| r.as_str()))
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list accounts"))?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                confirmed = CASE WHEN $3 IS NOT NULL AND $3 <> email THEN FALSE ELSE confirmed END,
                password_hash = COALESCE($4, password_hash),
                refresh_token = CASE WHEN $4 IS NOT NULL THEN NULL ELSE refresh_token END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update account"))?;

        Ok(row.map(Account::from))
    }

    async fn set_refresh_token(&self, id: AccountId, token: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_error("store refresh token"))?;
        Ok(())
    }

    async fn confirm_email(&self, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE, updated_at = NOW() WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(db_error("confirm email"))?;
        Ok(())
    }

    async fn set_avatar(&self, id: AccountId, url: &str) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update avatar"))?;

        Ok(row.map(Account::from))
    }

    async fn set_role(&self, id: AccountId, role: Role) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update role"))?;

        Ok(row.map(Account::from))
    }

    async fn ban_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET active = FALSE, refresh_token = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("ban account"))?;

        Ok(row.map(Account::from))
    }
}

// ============================================================================
// Photos and Tags
// ============================================================================

#[async_trait]
impl PhotoRepository for PgStore {
    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let row: PhotoRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO photos (user_id, url, public_id, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {PHOTO_COLUMNS}
            "#
        ))
        .bind(photo.owner_id)
        .bind(&photo.url)
        .bind(&photo.public_id)
        .bind(&photo.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("create photo"))?;

        attach_tags(&mut tx, row.id, &photo.tags).await?;
        tx.commit().await.map_err(db_error("commit photo"))?;

        self.with_tags(row).await
    }

    async fn find_photo(&self, id: i64) -> Result<Option<Photo>> {
        let row: Option<PhotoRow> = sqlx::query_as(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find photo"))?;

        match row {
            Some(row) => Ok(Some(self.with_tags(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_photos(&self, query: &PhotoQuery) -> Result<Vec<RatedPhoto>> {
        let rows: Vec<RatedPhotoRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.user_id, p.url, p.public_id, p.description, p.created_at, p.updated_at,
                   AVG(r.rate)::float8 AS average_rating
            FROM photos p
            LEFT JOIN ratings r ON r.photo_id = p.id
            WHERE ($1::bigint IS NULL OR p.user_id = $1)
              AND ($2::text IS NULL OR EXISTS (
                    SELECT 1 FROM photo_tags pt JOIN tags t ON t.id = pt.tag_id
                    WHERE pt.photo_id = p.id AND t.name = $2))
              AND ($3::date IS NULL OR p.created_at::date >= $3)
              AND ($4::date IS NULL OR p.created_at::date <= $4)
            GROUP BY p.id
            HAVING ($5::float8 IS NULL OR COALESCE(AVG(r.rate), 0) >= $5)
               AND ($6::float8 IS NULL OR COALESCE(AVG(r.rate), 0) <= $6)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(query.owner_id)
        .bind(&query.tag)
        .bind(query.created_from)
        .bind(query.created_to)
        .bind(query.rating_min)
        .bind(query.rating_max)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list photos"))?;

        let ids: Vec<i64> = rows.iter().map(|r| r.photo.id).collect();
        let mut tags = self.load_tags(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let photo_tags = tags.remove(&row.photo.id).unwrap_or_default();
                RatedPhoto {
                    photo: row.photo.into_photo(photo_tags),
                    average_rating: row.average_rating,
                }
            })
            .collect())
    }

    async fn update_photo(
        &self,
        id: i64,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<Option<Photo>> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let row: Option<PhotoRow> = sqlx::query_as(&format!(
            r#"
            UPDATE photos SET description = COALESCE($2, description), updated_at = NOW()
            WHERE id = $1
            RETURNING {PHOTO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&description)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("update photo"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(tags) = tags {
            sqlx::query("DELETE FROM photo_tags WHERE photo_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("clear photo tags"))?;
            attach_tags(&mut tx, id, &tags).await?;
        }

        tx.commit().await.map_err(db_error("commit photo"))?;
        Ok(Some(self.with_tags(row).await?))
    }

    async fn detach_tags(&self, id: i64, tags: &[String]) -> Result<Option<Photo>> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let row: Option<PhotoRow> = sqlx::query_as(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("find photo"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        for name in tags {
            let removed = sqlx::query(
                r#"
                DELETE FROM photo_tags pt USING tags t
                WHERE pt.tag_id = t.id AND pt.photo_id = $1 AND t.name = $2
                "#,
            )
            .bind(id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(db_error("detach tag"))?;

            if removed.rows_affected() == 0 {
                return Err(PhotoShareError::NotFound(format!("tag {name}")));
            }
        }

        sqlx::query("UPDATE photos SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("touch photo"))?;
        tx.commit().await.map_err(db_error("commit untag"))?;

        Ok(Some(self.with_tags(row).await?))
    }

    async fn delete_photo(&self, id: i64) -> Result<Option<Photo>> {
        let Some(photo) = self.find_photo(id).await? else {
            return Ok(None);
        };

        let deleted = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete photo"))?;

        Ok((deleted.rows_affected() > 0).then_some(photo))
    }

    async fn count_photos_by_owner(&self, owner_id: AccountId) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE user_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count photos"))
    }
}

#[async_trait]
impl TagRepository for PgStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows: Vec<TagRow> = sqlx::query_as("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list tags"))?;

        Ok(rows
            .into_iter()
            .map(|row| Tag {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn delete_tag(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete tag"))?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Comments and Ratings
// ============================================================================

#[async_trait]
impl CommentRepository for PgStore {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let row: CommentRow = sqlx::query_as(
            r#"
            INSERT INTO comments (photo_id, user_id, text) VALUES ($1, $2, $3)
            RETURNING id, photo_id, user_id, text, created_at, updated_at
            "#,
        )
        .bind(comment.photo_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create comment"))?;

        Ok(row.into())
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        let row: Option<CommentRow> = sqlx::query_as(
            "SELECT id, photo_id, user_id, text, created_at, updated_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find comment"))?;

        Ok(row.map(Comment::from))
    }

    async fn list_comments_for_photo(&self, photo_id: i64) -> Result<Vec<Comment>> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            r#"
            SELECT id, photo_id, user_id, text, created_at, updated_at
            FROM comments WHERE photo_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list comments"))?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn update_comment(&self, id: i64, text: &str) -> Result<Option<Comment>> {
        let row: Option<CommentRow> = sqlx::query_as(
            r#"
            UPDATE comments SET text = $2, updated_at = NOW() WHERE id = $1
            RETURNING id, photo_id, user_id, text, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update comment"))?;

        Ok(row.map(Comment::from))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete comment"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RatingRepository for PgStore {
    async fn find_rating(&self, photo_id: i64, user_id: AccountId) -> Result<Option<Rating>> {
        let row: Option<RatingRow> = sqlx::query_as(
            "SELECT photo_id, user_id, rate, created_at FROM ratings WHERE photo_id = $1 AND user_id = $2",
        )
        .bind(photo_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find rating"))?;

        Ok(row.map(Rating::from))
    }

    async fn create_rating(&self, photo_id: i64, user_id: AccountId, rate: i16) -> Result<Rating> {
        let row: RatingRow = sqlx::query_as(
            r#"
            INSERT INTO ratings (photo_id, user_id, rate) VALUES ($1, $2, $3)
            RETURNING photo_id, user_id, rate, created_at
            "#,
        )
        .bind(photo_id)
        .bind(user_id)
        .bind(rate)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create rating"))?;

        Ok(row.into())
    }

    async fn list_ratings(&self, photo_id: i64) -> Result<Vec<Rating>> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            r#"
            SELECT photo_id, user_id, rate, created_at FROM ratings
            WHERE photo_id = $1 ORDER BY user_id
            "#,
        )
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list ratings"))?;

        Ok(rows.into_iter().map(Rating::from).collect())
    }

    async fn rating_summary(&self, photo_id: i64) -> Result<RatingSummary> {
        let (average, count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rate)::float8, COUNT(*) FROM ratings WHERE photo_id = $1",
        )
        .bind(photo_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("summarize ratings"))?;

        Ok(RatingSummary {
            photo_id,
            average,
            count,
        })
    }

    async fn delete_rating(&self, photo_id: i64, user_id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ratings WHERE photo_id = $1 AND user_id = $2")
            .bind(photo_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete rating"))?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Filters and Transformations
// ============================================================================

#[async_trait]
impl PhotoFilterRepository for PgStore {
    async fn create_filter(&self, filter: NewPhotoFilter) -> Result<PhotoFilter> {
        let row: FilterRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO photo_filters (user_id, name, description, preset)
            VALUES ($1, $2, $3, $4)
            RETURNING {FILTER_COLUMNS}
            "#
        ))
        .bind(filter.owner_id)
        .bind(&filter.name)
        .bind(&filter.description)
        .bind(Json(&filter.preset))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create photo filter"))?;

        Ok(row.into())
    }

    async fn find_filter(&self, id: i64) -> Result<Option<PhotoFilter>> {
        let row: Option<FilterRow> = sqlx::query_as(&format!(
            "SELECT {FILTER_COLUMNS} FROM photo_filters WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find photo filter"))?;

        Ok(row.map(PhotoFilter::from))
    }

    async fn list_filters_by_owner(&self, owner_id: AccountId) -> Result<Vec<PhotoFilter>> {
        let rows: Vec<FilterRow> = sqlx::query_as(&format!(
            "SELECT {FILTER_COLUMNS} FROM photo_filters WHERE user_id = $1 ORDER BY id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list photo filters"))?;

        Ok(rows.into_iter().map(PhotoFilter::from).collect())
    }

    async fn update_filter(
        &self,
        id: i64,
        update: PhotoFilterUpdate,
    ) -> Result<Option<PhotoFilter>> {
        let row: Option<FilterRow> = sqlx::query_as(&format!(
            r#"
            UPDATE photo_filters SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                preset = COALESCE($4, preset),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FILTER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.preset.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update photo filter"))?;

        Ok(row.map(PhotoFilter::from))
    }

    async fn delete_filter(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM photo_filters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete photo filter"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransformationRepository for PgStore {
    async fn create_transformation(
        &self,
        transformation: NewPhotoTransformation,
    ) -> Result<PhotoTransformation> {
        let row: TransformationRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO photo_transformations (photo_id, transformed_url, description)
            VALUES ($1, $2, $3)
            RETURNING {TRANSFORMATION_COLUMNS}
            "#
        ))
        .bind(transformation.photo_id)
        .bind(&transformation.transformed_url)
        .bind(&transformation.description)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create transformation"))?;

        Ok(row.into())
    }

    async fn find_transformation(&self, id: i64) -> Result<Option<PhotoTransformation>> {
        let row: Option<TransformationRow> = sqlx::query_as(&format!(
            "SELECT {TRANSFORMATION_COLUMNS} FROM photo_transformations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find transformation"))?;

        Ok(row.map(PhotoTransformation::from))
    }

    async fn list_transformations(&self, photo_id: i64) -> Result<Vec<PhotoTransformation>> {
        let rows: Vec<TransformationRow> = sqlx::query_as(&format!(
            "SELECT {TRANSFORMATION_COLUMNS} FROM photo_transformations WHERE photo_id = $1 ORDER BY id"
        ))
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list transformations"))?;

        Ok(rows.into_iter().map(PhotoTransformation::from).collect())
    }

    async fn update_transformation_description(
        &self,
        id: i64,
        description: Option<String>,
    ) -> Result<Option<PhotoTransformation>> {
        let row: Option<TransformationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE photo_transformations SET description = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSFORMATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&description)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update transformation"))?;

        Ok(row.map(PhotoTransformation::from))
    }

    async fn delete_transformation(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM photo_transformations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete transformation"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OwnershipRepository for PgStore {
    async fn owner_of(&self, kind: ResourceKind, id: i64) -> Result<Option<AccountId>> {
        let sql = match kind {
            ResourceKind::Photo => "SELECT user_id FROM photos WHERE id = $1",
            ResourceKind::Comment => "SELECT user_id FROM comments WHERE id = $1",
            ResourceKind::PhotoFilter => "SELECT user_id FROM photo_filters WHERE id = $1",
            ResourceKind::PhotoTransformation => {
                r#"
                SELECT p.user_id FROM photo_transformations t
                JOIN photos p ON p.id = t.photo_id
                WHERE t.id = $1
                "#
            }
        };

        sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("look up owner"))
    }
}
