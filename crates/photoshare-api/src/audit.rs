//! Security audit logging for account and authorization events
//!
//! Every event is logged at INFO level with the `audit` target so it can be
//! filtered and routed apart from application logs, e.g.
//! `RUST_LOG=audit=info,photoshare_api=warn`.
//!
//! ```ignore
//! use photoshare_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: account.id,
//!     email: account.email.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use chrono::Utc;
use photoshare_core::{AccountId, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    SignupSuccess {
        user_id: AccountId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignupFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
    },

    EmailConfirmed {
        email: String,
    },

    LoginSuccess {
        user_id: AccountId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    TokenRefresh {
        user_id: AccountId,
        email: String,
        ip_address: Option<String>,
    },

    /// A refresh token other than the stored one was presented; the stored
    /// one has been cleared
    RefreshTokenReuse {
        user_id: AccountId,
        email: String,
        ip_address: Option<String>,
    },

    Logout {
        user_id: AccountId,
        email: String,
        ip_address: Option<String>,
    },

    AccountBanned {
        user_id: AccountId,
        email: String,
        banned_by: AccountId,
    },

    RoleChanged {
        user_id: AccountId,
        email: String,
        old_role: Role,
        new_role: Role,
        changed_by: AccountId,
    },

    AccessDenied {
        user_id: Option<AccountId>,
        email: Option<String>,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

impl AuditEvent {
    fn description(&self) -> &'static str {
        match self {
            Self::SignupSuccess { .. } => "Signup successful",
            Self::SignupFailure { .. } => "Signup failed",
            Self::EmailConfirmed { .. } => "Email confirmed",
            Self::LoginSuccess { .. } => "Login successful",
            Self::LoginFailure { .. } => "Login failed",
            Self::TokenRefresh { .. } => "Token refresh",
            Self::RefreshTokenReuse { .. } => "Stale refresh token presented",
            Self::Logout { .. } => "User logout",
            Self::AccountBanned { .. } => "Account banned",
            Self::RoleChanged { .. } => "Role changed",
            Self::AccessDenied { .. } => "Access denied",
            Self::InvalidToken { .. } => "Invalid token",
        }
    }

    fn subject(&self) -> (Option<AccountId>, Option<&str>) {
        match self {
            Self::SignupSuccess { user_id, email, .. }
            | Self::LoginSuccess { user_id, email, .. }
            | Self::TokenRefresh { user_id, email, .. }
            | Self::RefreshTokenReuse { user_id, email, .. }
            | Self::Logout { user_id, email, .. }
            | Self::AccountBanned { user_id, email, .. }
            | Self::RoleChanged { user_id, email, .. } => (Some(*user_id), Some(email)),
            Self::SignupFailure { email, .. }
            | Self::EmailConfirmed { email }
            | Self::LoginFailure { email, .. } => (None, Some(email)),
            Self::AccessDenied { user_id, email, .. } => (*user_id, email.as_deref()),
            Self::InvalidToken { .. } => (None, None),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is attached as JSON for log aggregators; the subject
/// fields are repeated at top level for filtering.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let (user_id, email) = event.subject();

    match event {
        AuditEvent::LoginFailure { reason, .. }
        | AuditEvent::SignupFailure { reason, .. }
        | AuditEvent::InvalidToken { reason, .. } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                email = ?email,
                reason = %reason,
                "{}",
                event.description()
            );
        }
        AuditEvent::AccessDenied { resource, .. } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                email = ?email,
                resource = %resource,
                "{}",
                event.description()
            );
        }
        _ => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                email = ?email,
                "{}",
                event.description()
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop), then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: 42,
            email: "test@example.com".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("test@example.com"));
    }

    #[test]
    fn test_role_change_serializes_roles() {
        let event = AuditEvent::RoleChanged {
            user_id: 2,
            email: "mod@example.com".to_string(),
            old_role: Role::User,
            new_role: Role::Moderator,
            changed_by: 1,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"old_role\":\"user\""));
        assert!(json.contains("\"new_role\":\"moderator\""));
    }

    #[test]
    fn test_subject_fields() {
        let event = AuditEvent::AccessDenied {
            user_id: Some(3),
            email: None,
            resource: "comment:D".to_string(),
            required_role: Some("admin,moderator".to_string()),
            ip_address: None,
            user_agent: None,
        };
        assert_eq!(event.subject(), (Some(3), None));

        let event = AuditEvent::InvalidToken {
            ip_address: None,
            user_agent: None,
            reason: "expired".to_string(),
        };
        assert_eq!(event.subject(), (None, None));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::LoginFailure {
            email: "test@example.com".to_string(),
            reason: "Invalid password".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Test Agent".to_string()),
        });
        audit_log(&AuditEvent::AccountBanned {
            user_id: 5,
            email: "banned@example.com".to_string(),
            banned_by: 1,
        });
    }

    #[test]
    fn test_extract_ip_address() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));

        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.9".parse().unwrap());
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.9".to_string()));

        assert_eq!(extract_ip_address(&axum::http::HeaderMap::new()), None);
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::USER_AGENT,
            "Mozilla/5.0 (Test)".parse().unwrap(),
        );

        assert_eq!(
            extract_user_agent(&headers),
            Some("Mozilla/5.0 (Test)".to_string())
        );
    }
}
