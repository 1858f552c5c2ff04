//! Authentication and authorization
//!
//! - Token issue and verification for access, refresh and email tokens
//! - Password hashing with Argon2id
//! - Session cache of resolved callers
//! - Route-level access table and the gate middleware that applies it
//! - Record-level ownership checks
//! - The account lifecycle service

pub mod access;
pub mod middleware;
pub mod ownership;
pub mod password;
pub mod service;
pub mod session;
pub mod token;

pub use access::{AccessTable, Operation, Resource};
pub use middleware::{
    auth_middleware, bearer_token, require_access, require_access_or_self, resolve_caller, Caller,
};
pub use ownership::{authorize_owner_or_role, authorize_record, OwnershipPolicy};
pub use password::{hash_password, verify_password, PasswordError};
pub use service::{AuthService, ClientInfo, TokenPair};
pub use session::{CacheStatsReport, MokaSessionCache, SessionCache};
pub use token::{Claims, TokenError, TokenScope, TokenService};
