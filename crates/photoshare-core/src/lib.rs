//! PhotoShare Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout PhotoShare:
//! - Accounts and roles
//! - Photos, tags, comments, ratings
//! - Photo filters (saved transformation presets) and transformations
//! - Common error types
//! - Storage traits with a PostgreSQL implementation
//! - The media storage trait and the transformation vocabulary
//! - Configuration management

pub mod config;
pub mod media;
pub mod postgres;
pub mod store;
pub mod tags;
pub mod transform;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, JwtAlgorithm, LoggingConfig, MailConfig,
    MediaConfig, ServerConfig, SessionConfig,
};
pub use media::{MediaStorage, MediaUpload, StoredMedia};
pub use postgres::PgStore;
pub use store::{
    AccountRepository, CommentRepository, OwnershipRepository, PhotoFilterRepository,
    PhotoRepository, RatingRepository, Store, TagRepository, TransformationRepository,
};

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for PhotoShare operations
#[derive(Error, Debug)]
pub enum PhotoShareError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Media error: {0}")]
    MediaError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PhotoShareError>;

/// Identifier of an account row
pub type AccountId = i64;

// ============================================================================
// Accounts
// ============================================================================

/// Account role
///
/// Which role may do what is decided by the access table in the API crate.
/// [`Role::rank`] only matters when one account edits another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 3] = [Role::Admin, Role::Moderator, Role::User];

    /// Privilege rank, admin highest
    pub fn rank(&self) -> u8 {
        match self {
            Self::Admin => 2,
            Self::Moderator => 1,
            Self::User => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::User => "user",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = PhotoShareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "user" => Ok(Self::User),
            other => Err(PhotoShareError::ValidationError(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Unique login key
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Set once through the email confirmation flow
    pub confirmed: bool,
    /// Cleared by a ban; never reset in-band
    pub active: bool,
    /// Latest issued refresh token
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Data required to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial profile update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Account listing filters
#[derive(Debug, Clone)]
pub struct AccountQuery {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AccountQuery {
    fn default() -> Self {
        Self {
            username: None,
            email: None,
            role: None,
            limit: 10,
            offset: 0,
        }
    }
}

// ============================================================================
// Photos and Tags
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub owner_id: AccountId,
    pub url: String,
    /// Identifier of the stored object at the media service
    pub public_id: String,
    pub description: Option<String>,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A photo together with its average rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedPhoto {
    #[serde(flatten)]
    pub photo: Photo,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub owner_id: AccountId,
    pub url: String,
    pub public_id: String,
    pub description: Option<String>,
    /// Normalized tag names, created on demand
    pub tags: Vec<String>,
}

/// Photo listing filters
#[derive(Debug, Clone)]
pub struct PhotoQuery {
    pub owner_id: Option<AccountId>,
    /// Normalized tag name
    pub tag: Option<String>,
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for PhotoQuery {
    fn default() -> Self {
        Self {
            owner_id: None,
            tag: None,
            rating_min: None,
            rating_max: None,
            created_from: None,
            created_to: None,
            limit: 10,
            offset: 0,
        }
    }
}

impl PhotoQuery {
    /// Rating filters compare against the average, counting unrated photos as 0
    pub fn matches_rating(&self, average: Option<f64>) -> bool {
        let value = average.unwrap_or(0.0);
        self.rating_min.map_or(true, |min| value >= min)
            && self.rating_max.map_or(true, |max| value <= max)
    }
}

// ============================================================================
// Comments and Ratings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub photo_id: i64,
    pub author_id: AccountId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub photo_id: i64,
    pub author_id: AccountId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub photo_id: i64,
    pub user_id: AccountId,
    pub rate: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub photo_id: i64,
    pub average: Option<f64>,
    pub count: i64,
}

// ============================================================================
// Filters and Transformations
// ============================================================================

/// One step of a transformation preset, e.g. `{"width": 200, "crop": "scale"}`
pub type PresetStep = serde_json::Map<String, serde_json::Value>;

/// A saved, reusable transformation preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoFilter {
    pub id: i64,
    pub owner_id: AccountId,
    pub name: String,
    pub description: Option<String>,
    pub preset: Vec<PresetStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhotoFilter {
    pub owner_id: AccountId,
    pub name: String,
    pub description: Option<String>,
    pub preset: Vec<PresetStep>,
}

#[derive(Debug, Clone, Default)]
pub struct PhotoFilterUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub preset: Option<Vec<PresetStep>>,
}

/// A derived image URL for a photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoTransformation {
    pub id: i64,
    pub photo_id: i64,
    pub transformed_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhotoTransformation {
    pub photo_id: i64,
    pub transformed_url: String,
    pub description: Option<String>,
}

// ============================================================================
// Ownership
// ============================================================================

/// Record types whose owner can be looked up for record-level authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Photo,
    Comment,
    PhotoFilter,
    /// Owned through the photo it was derived from
    PhotoTransformation,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Comment => "comment",
            Self::PhotoFilter => "photo_filter",
            Self::PhotoTransformation => "photo_transformation",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
