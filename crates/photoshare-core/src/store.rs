//! Storage traits
//!
//! One trait per aggregate, all object safe so the API can hold an
//! `Arc<dyn Store>` and tests can swap PostgreSQL for the in-memory store.

use async_trait::async_trait;

use crate::{
    Account, AccountId, AccountQuery, AccountUpdate, Comment, NewAccount, NewComment, NewPhoto,
    NewPhotoFilter, NewPhotoTransformation, Photo, PhotoFilter, PhotoFilterUpdate, PhotoQuery,
    PhotoTransformation, RatedPhoto, Rating, RatingSummary, ResourceKind, Result, Role, Tag,
};

/// Trait for account operations
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account; `Conflict` when the email is taken
    async fn create_account(&self, account: NewAccount) -> Result<Account>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>>;

    /// Apply a partial profile update; `Conflict` when the new email is taken
    ///
    /// A changed email leaves the account unconfirmed. A new password hash
    /// clears the stored refresh token.
    async fn update_account(&self, id: AccountId, update: AccountUpdate)
        -> Result<Option<Account>>;

    /// Overwrite (or clear) the stored refresh token
    async fn set_refresh_token(&self, id: AccountId, token: Option<&str>) -> Result<()>;

    /// Mark the account behind `email` as confirmed
    async fn confirm_email(&self, email: &str) -> Result<()>;

    async fn set_avatar(&self, id: AccountId, url: &str) -> Result<Option<Account>>;

    async fn set_role(&self, id: AccountId, role: Role) -> Result<Option<Account>>;

    /// Deactivate the account and clear its refresh token
    async fn ban_account(&self, id: AccountId) -> Result<Option<Account>>;
}

/// Trait for photo operations
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo>;

    async fn find_photo(&self, id: i64) -> Result<Option<Photo>>;

    /// Newest first
    async fn list_photos(&self, query: &PhotoQuery) -> Result<Vec<RatedPhoto>>;

    /// Replace the description and/or the full tag set
    async fn update_photo(
        &self,
        id: i64,
        description: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<Option<Photo>>;

    /// Detach tags by name; `NotFound` when a tag is not attached
    async fn detach_tags(&self, id: i64, tags: &[String]) -> Result<Option<Photo>>;

    /// Delete the photo with its comments, ratings and transformations
    async fn delete_photo(&self, id: i64) -> Result<Option<Photo>>;

    async fn count_photos_by_owner(&self, owner_id: AccountId) -> Result<i64>;
}

/// Trait for tag operations
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Returns false when no such tag exists
    async fn delete_tag(&self, id: i64) -> Result<bool>;
}

/// Trait for comment operations
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>>;

    /// Oldest first
    async fn list_comments_for_photo(&self, photo_id: i64) -> Result<Vec<Comment>>;

    async fn update_comment(&self, id: i64, text: &str) -> Result<Option<Comment>>;

    async fn delete_comment(&self, id: i64) -> Result<bool>;
}

/// Trait for rating operations
#[async_trait]
pub trait RatingRepository: Send + Sync {
    async fn find_rating(&self, photo_id: i64, user_id: AccountId) -> Result<Option<Rating>>;

    /// `Conflict` when the user already rated the photo
    async fn create_rating(&self, photo_id: i64, user_id: AccountId, rate: i16)
        -> Result<Rating>;

    async fn list_ratings(&self, photo_id: i64) -> Result<Vec<Rating>>;

    async fn rating_summary(&self, photo_id: i64) -> Result<RatingSummary>;

    async fn delete_rating(&self, photo_id: i64, user_id: AccountId) -> Result<bool>;
}

/// Trait for saved transformation presets
#[async_trait]
pub trait PhotoFilterRepository: Send + Sync {
    async fn create_filter(&self, filter: NewPhotoFilter) -> Result<PhotoFilter>;

    async fn find_filter(&self, id: i64) -> Result<Option<PhotoFilter>>;

    async fn list_filters_by_owner(&self, owner_id: AccountId) -> Result<Vec<PhotoFilter>>;

    async fn update_filter(&self, id: i64, update: PhotoFilterUpdate)
        -> Result<Option<PhotoFilter>>;

    async fn delete_filter(&self, id: i64) -> Result<bool>;
}

/// Trait for photo transformations
#[async_trait]
pub trait TransformationRepository: Send + Sync {
    async fn create_transformation(
        &self,
        transformation: NewPhotoTransformation,
    ) -> Result<PhotoTransformation>;

    async fn find_transformation(&self, id: i64) -> Result<Option<PhotoTransformation>>;

    async fn list_transformations(&self, photo_id: i64) -> Result<Vec<PhotoTransformation>>;

    async fn update_transformation_description(
        &self,
        id: i64,
        description: Option<String>,
    ) -> Result<Option<PhotoTransformation>>;

    async fn delete_transformation(&self, id: i64) -> Result<bool>;
}

/// Owner lookup used by record-level authorization
#[async_trait]
pub trait OwnershipRepository: Send + Sync {
    /// Account that owns the record; `None` when the record does not exist
    async fn owner_of(&self, kind: ResourceKind, id: i64) -> Result<Option<AccountId>>;
}

/// Everything the API needs from persistence
pub trait Store:
    AccountRepository
    + PhotoRepository
    + TagRepository
    + CommentRepository
    + RatingRepository
    + PhotoFilterRepository
    + TransformationRepository
    + OwnershipRepository
{
}

impl<T> Store for T where
    T: AccountRepository
        + PhotoRepository
        + TagRepository
        + CommentRepository
        + RatingRepository
        + PhotoFilterRepository
        + TransformationRepository
        + OwnershipRepository
{
}
