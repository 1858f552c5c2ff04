//! Account lifecycle
//!
//! Sign-up, email confirmation, login, token refresh, logout, and the admin
//! transitions (ban, role change). Handlers stay thin and call into
//! [`AuthService`].

use super::middleware::Caller;
use super::password::{hash_password, verify_password};
use super::token::TokenError;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::{AppError, COULD_NOT_VALIDATE_CREDENTIALS, FORBIDDEN};
use crate::mail::confirmation_mail;
use crate::state::AppState;
use axum::http::HeaderMap;
use photoshare_core::{Account, AccountId, AccountRepository, NewAccount, PhotoShareError, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const INVALID_EMAIL: &str = "Invalid email";
pub const EMAIL_NOT_CONFIRMED: &str = "Email not confirmed";
pub const INVALID_PASSWORD: &str = "Invalid password";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
pub const INVALID_SCOPE: &str = "Invalid scope for token";
pub const INVALID_EMAIL_TOKEN: &str = "Invalid token for email verification";
pub const ACCOUNT_ALREADY_EXISTS: &str = "Account already exists";
pub const USER_NOT_FOUND: &str = "User not found";
pub const EMAIL_CONFIRMED: &str = "Email confirmed";
pub const EMAIL_ALREADY_CONFIRMED: &str = "Your email is already confirmed";
pub const CHECK_YOUR_EMAIL: &str = "Check your email for confirmation.";

/// Access and refresh token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `bearer`
    pub token_type: String,
}

/// Client details recorded in audit events
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Account lifecycle operations over the shared state
pub struct AuthService<'a> {
    state: &'a AppState,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Register a new, unconfirmed account and mail its confirmation link
    ///
    /// The email is stored lowercased. Delivery runs on a spawned task; a
    /// failed delivery is logged and does not fail the sign-up.
    ///
    /// # Returns
    ///
    /// * `Ok(Account)` - The created account
    /// * `Err(AppError::Conflict)` - The email is already registered
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email);

        if self.state.store.find_account_by_email(&email).await?.is_some() {
            audit_log(&AuditEvent::SignupFailure {
                email: email.clone(),
                reason: ACCOUNT_ALREADY_EXISTS.to_string(),
                ip_address: client.ip_address.clone(),
            });
            return Err(AppError::Conflict(ACCOUNT_ALREADY_EXISTS.to_string()));
        }

        let password_hash = hash_password(password)?;
        let account = self
            .state
            .store
            .create_account(NewAccount {
                username: username.trim().to_string(),
                email: email.clone(),
                password_hash,
                role: Role::User,
            })
            .await
            .map_err(|err| match err {
                PhotoShareError::Conflict(_) => {
                    AppError::Conflict(ACCOUNT_ALREADY_EXISTS.to_string())
                }
                other => other.into(),
            })?;

        audit_log(&AuditEvent::SignupSuccess {
            user_id: account.id,
            email: account.email.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        self.send_confirmation(&account)?;
        Ok(account)
    }

    /// Confirm the account named by an email token
    ///
    /// Confirming twice is not an error.
    pub async fn confirm_email(&self, token: &str) -> Result<&'static str, AppError> {
        let email = self
            .state
            .tokens
            .verify_email_token(token)
            .map_err(|err| match err {
                TokenError::InvalidScope => AppError::unauthorized(INVALID_SCOPE),
                _ => AppError::Unprocessable(INVALID_EMAIL_TOKEN.to_string()),
            })?;

        let account = self
            .state
            .store
            .find_account_by_email(&email)
            .await?
            .ok_or_else(AppError::not_found)?;

        if account.confirmed {
            return Ok(EMAIL_ALREADY_CONFIRMED);
        }

        self.state.store.confirm_email(&email).await?;
        self.state.account_changed(&email).await;
        audit_log(&AuditEvent::EmailConfirmed { email });

        Ok(EMAIL_CONFIRMED)
    }

    /// Send the confirmation link again
    pub async fn request_email(&self, email: &str) -> Result<&'static str, AppError> {
        let email = normalize_email(email);
        let account = self
            .state
            .store
            .find_account_by_email(&email)
            .await?
            .ok_or_else(AppError::not_found)?;

        if account.confirmed {
            return Ok(EMAIL_ALREADY_CONFIRMED);
        }

        self.send_confirmation(&account)?;
        Ok(CHECK_YOUR_EMAIL)
    }

    /// Authenticate with email and password
    ///
    /// Checks run in a fixed order and each failure has its own reason:
    /// unknown email, unconfirmed, wrong password, inactive. With
    /// `require_admin` a non-admin account fails like an inactive one.
    /// A successful login replaces the stored refresh token.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        require_admin: bool,
        client: &ClientInfo,
    ) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);
        let fail = |reason: &'static str| {
            audit_log(&AuditEvent::LoginFailure {
                email: email.clone(),
                reason: reason.to_string(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            });
            AppError::unauthorized(reason)
        };

        let Some(account) = self.state.store.find_account_by_email(&email).await? else {
            return Err(fail(INVALID_EMAIL));
        };
        if !account.confirmed {
            return Err(fail(EMAIL_NOT_CONFIRMED));
        }
        if !verify_password(password, &account.password_hash)? {
            return Err(fail(INVALID_PASSWORD));
        }
        if !account.active || (require_admin && account.role != Role::Admin) {
            return Err(fail(FORBIDDEN));
        }

        let pair = self.issue_pair(&account.email)?;
        self.state
            .store
            .set_refresh_token(account.id, Some(&pair.refresh_token))
            .await?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: account.id,
            email: account.email,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        Ok(pair)
    }

    /// Rotate a refresh token
    ///
    /// The presented token must equal the stored one. On a mismatch the
    /// stored token is cleared, so the account has to log in again.
    pub async fn refresh(&self, token: &str, client: &ClientInfo) -> Result<TokenPair, AppError> {
        let email = self
            .state
            .tokens
            .verify_refresh_token(token)
            .map_err(|err| match err {
                TokenError::InvalidScope => AppError::unauthorized(INVALID_SCOPE),
                _ => AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS),
            })?;

        let account = self
            .state
            .store
            .find_account_by_email(&email)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_REFRESH_TOKEN))?;

        if account.refresh_token.as_deref() != Some(token) {
            self.state.store.set_refresh_token(account.id, None).await?;
            audit_log(&AuditEvent::RefreshTokenReuse {
                user_id: account.id,
                email: account.email,
                ip_address: client.ip_address.clone(),
            });
            return Err(AppError::unauthorized(INVALID_REFRESH_TOKEN));
        }

        let pair = self.issue_pair(&account.email)?;
        self.state
            .store
            .set_refresh_token(account.id, Some(&pair.refresh_token))
            .await?;

        audit_log(&AuditEvent::TokenRefresh {
            user_id: account.id,
            email: account.email,
            ip_address: client.ip_address.clone(),
        });

        Ok(pair)
    }

    /// Drop the caller's refresh capability
    ///
    /// The access token stays valid until it expires.
    pub async fn logout(&self, caller: &Caller, client: &ClientInfo) -> Result<(), AppError> {
        self.state.store.set_refresh_token(caller.id(), None).await?;

        audit_log(&AuditEvent::Logout {
            user_id: caller.id(),
            email: caller.email().to_string(),
            ip_address: client.ip_address.clone(),
        });

        Ok(())
    }

    /// Deactivate an account and clear its refresh token
    pub async fn ban(&self, user_id: AccountId, by: &Caller) -> Result<Account, AppError> {
        let account = self
            .state
            .store
            .ban_account(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

        self.state.account_changed(&account.email).await;
        audit_log(&AuditEvent::AccountBanned {
            user_id: account.id,
            email: account.email.clone(),
            banned_by: by.id(),
        });

        Ok(account)
    }

    pub async fn change_role(
        &self,
        user_id: AccountId,
        role: Role,
        by: &Caller,
    ) -> Result<Account, AppError> {
        let previous = self
            .state
            .store
            .find_account_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

        let account = self
            .state
            .store
            .set_role(user_id, role)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

        self.state.account_changed(&account.email).await;
        audit_log(&AuditEvent::RoleChanged {
            user_id: account.id,
            email: account.email.clone(),
            old_role: previous.role,
            new_role: account.role,
            changed_by: by.id(),
        });

        Ok(account)
    }

    fn issue_pair(&self, email: &str) -> Result<TokenPair, AppError> {
        let tokens = &self.state.tokens;
        let access_token = tokens
            .issue_access_token(email)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let refresh_token = tokens
            .issue_refresh_token(email)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        })
    }

    fn send_confirmation(&self, account: &Account) -> Result<(), AppError> {
        let token = self
            .state
            .tokens
            .issue_email_token(&account.email)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let mail = confirmation_mail(
            &self.state.config.server.public_url,
            &account.email,
            &account.username,
            &token,
        );

        let mailer = self.state.mailer.clone();
        tokio::spawn(async move {
            let to = mail.to.clone();
            if let Err(e) = mailer.send(mail).await {
                tracing::warn!(to = %to, error = %e, "Failed to send confirmation email");
            }
        });

        Ok(())
    }
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
