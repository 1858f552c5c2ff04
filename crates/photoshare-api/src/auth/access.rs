//! Route-level access table
//!
//! Which roles may perform which CRUD operation on which resource, declared
//! in one place. The gate middleware consults it before a handler runs; it
//! knows nothing about individual records.

use photoshare_core::Role;
use serde::Serialize;
use std::collections::HashMap;

/// CRUD operation letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn letter(&self) -> char {
        match self {
            Self::Create => 'C',
            Self::Read => 'R',
            Self::Update => 'U',
            Self::Delete => 'D',
        }
    }
}

/// Resource families guarded by the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// The caller's own profile
    Account,
    /// Other accounts
    AccountDirectory,
    /// Ban and role changes
    AccountModeration,
    Photo,
    Comment,
    Rating,
    /// Individual ratings with their authors
    RatingDetail,
    Tag,
    PhotoFilter,
    PhotoTransformation,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::AccountDirectory => "account_directory",
            Self::AccountModeration => "account_moderation",
            Self::Photo => "photo",
            Self::Comment => "comment",
            Self::Rating => "rating",
            Self::RatingDetail => "rating_detail",
            Self::Tag => "tag",
            Self::PhotoFilter => "photo_filter",
            Self::PhotoTransformation => "photo_transformation",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const ALL: &[Role] = &[Role::Admin, Role::Moderator, Role::User];
const STAFF: &[Role] = &[Role::Admin, Role::Moderator];
const ADMIN: &[Role] = &[Role::Admin];
const ADMIN_USER: &[Role] = &[Role::Admin, Role::User];

/// `(resource, operation) -> permitted roles`
///
/// A pair without an entry permits nobody.
#[derive(Debug, Clone)]
pub struct AccessTable {
    rules: HashMap<(Resource, Operation), Vec<Role>>,
}

impl AccessTable {
    /// Table with no permissions at all
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The table the service runs with
    pub fn standard() -> Self {
        use Operation::*;
        use Resource::*;

        Self::empty()
            .allow(Account, Create, ALL)
            .allow(Account, Read, ALL)
            .allow(Account, Update, ALL)
            .allow(AccountDirectory, Read, STAFF)
            .allow(AccountDirectory, Update, STAFF)
            .allow(AccountModeration, Update, ADMIN)
            .allow(Photo, Create, ADMIN_USER)
            .allow(Photo, Read, ALL)
            .allow(Photo, Update, ADMIN_USER)
            .allow(Photo, Delete, ALL)
            .allow(Comment, Create, ALL)
            .allow(Comment, Read, ALL)
            .allow(Comment, Update, ALL)
            .allow(Comment, Delete, STAFF)
            .allow(Rating, Create, ALL)
            .allow(Rating, Read, ALL)
            .allow(Rating, Delete, STAFF)
            .allow(RatingDetail, Read, STAFF)
            .allow(Tag, Read, ALL)
            .allow(Tag, Delete, STAFF)
            .allow(PhotoFilter, Create, ALL)
            .allow(PhotoFilter, Read, ALL)
            .allow(PhotoFilter, Update, ALL)
            .allow(PhotoFilter, Delete, ALL)
            .allow(PhotoTransformation, Create, ALL)
            .allow(PhotoTransformation, Read, ALL)
            .allow(PhotoTransformation, Update, ALL)
            .allow(PhotoTransformation, Delete, ALL)
    }

    /// Replace the roles permitted for one pair
    pub fn allow(mut self, resource: Resource, operation: Operation, roles: &[Role]) -> Self {
        self.rules.insert((resource, operation), roles.to_vec());
        self
    }

    pub fn allowed_roles(&self, resource: Resource, operation: Operation) -> &[Role] {
        self.rules
            .get(&(resource, operation))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn permits(&self, role: Role, resource: Resource, operation: Operation) -> bool {
        self.allowed_roles(resource, operation).contains(&role)
    }
}

impl Default for AccessTable {
    fn default() -> Self {
        Self::standard()
    }
}
