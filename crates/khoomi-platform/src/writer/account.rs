//! Account protocols: registration, login bookkeeping, secure-code flows

use bson::doc;
use mongodb::{options::ReturnDocument, ClientSession};
use serde::Deserialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{on_duplicate, AggregateWriter};
use crate::auth::secure_token::SecureTokenKind;
use crate::mail::templates::MailTemplate;
use crate::media::{self, MediaSource};
use crate::notification::entity::{NotificationSettings, NotificationToggles, NOTIFICATION_SETTINGS};
use crate::shared::error::{PlatformError, Result};
use crate::shared::validation::{normalize_email, validate_personal_name};
use crate::store::duplicate_key_index;
use crate::user::entity::{LoginHistory, User, UserStatus, LOGIN_HISTORIES};
use crate::user::repository::UserRepository;

/// Generated login names can collide; retry with a fresh suffix.
const LOGIN_NAME_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginAttempt<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub ip: &'a str,
    pub user_agent: &'a str,
}

impl AggregateWriter {
    /// Create the user and its notification settings together, and queue
    /// the welcome and email-verification mails.
    pub async fn register(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email)?;
        let first_name = registration.first_name.trim();
        let last_name = registration.last_name.trim();
        validate_personal_name("first_name", first_name)?;
        validate_personal_name("last_name", last_name)?;
        self.passwords.policy().validate(&registration.password)?;
        let digest = self.passwords.hash(&registration.password)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let user = User::new(email.as_str(), first_name, last_name, digest.as_str());

            let mut session = self.store.begin().await?;
            let outcome = self.register_steps(&mut session, &user).await;
            match self.store.settle(session, outcome).await {
                Ok(()) => {
                    info!(user_id = %user.id, login_name = %user.login_name, "User registered");
                    return Ok(user);
                }
                Err(PlatformError::Duplicate { ref field, .. }) if field == "login_name" && attempt < LOGIN_NAME_ATTEMPTS => {
                    debug!(attempt, "Generated login name already taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn register_steps(&self, session: &mut ClientSession, user: &User) -> Result<()> {
        self.users()
            .insert_one(user)
            .session(&mut *session)
            .await
            .map_err(|e| {
                let login_name_taken = duplicate_key_index(&e).is_some_and(|index| index.contains("login_name"));
                on_duplicate(e, || {
                    if login_name_taken {
                        PlatformError::duplicate("User", "login_name", user.login_name.as_str())
                    } else {
                        PlatformError::conflict("DUPLICATE_EMAIL", "an account with this email already exists")
                    }
                })
            })?;

        let settings = NotificationSettings::new(user.id.as_str(), NotificationToggles::default());
        self.store
            .collection::<NotificationSettings>(NOTIFICATION_SETTINGS)
            .insert_one(&settings)
            .session(&mut *session)
            .await?;

        self.enqueue_mail(session, &user.primary_email, MailTemplate::Welcome { first_name: &user.first_name })
            .await?;

        let code = self
            .issue_secure_token(session, SecureTokenKind::EmailVerification, &user.id)
            .await?;
        self.enqueue_mail(
            session,
            &user.primary_email,
            MailTemplate::VerifyEmail {
                first_name: &user.first_name,
                user_id: &user.id,
                code: &code,
            },
        )
        .await
    }

    /// Verify credentials and record the login. Returns the updated user.
    pub async fn authenticate(&self, attempt: LoginAttempt<'_>) -> Result<User> {
        let email = normalize_email(attempt.email).map_err(|_| PlatformError::InvalidCredentials)?;

        let mut session = self.store.begin().await?;
        let outcome = self.authenticate_steps(&mut session, &email, &attempt).await;
        let user = self.store.settle(session, outcome).await?;

        info!(user_id = %user.id, ip = %attempt.ip, "User logged in");
        Ok(user)
    }

    async fn authenticate_steps(
        &self,
        session: &mut ClientSession,
        email: &str,
        attempt: &LoginAttempt<'_>,
    ) -> Result<User> {
        let mut user = self
            .users()
            .find_one(doc! { "primary_email": email })
            .session(&mut *session)
            .await?
            .ok_or(PlatformError::InvalidCredentials)?;

        if !self.passwords.verify(&user.auth.password_digest, attempt.password)? {
            return Err(PlatformError::InvalidCredentials);
        }
        if user.is_banned() {
            return Err(PlatformError::forbidden("this account has been banned"));
        }

        let previous_ip = user.last_login_ip.clone();
        let previous_login = user.last_login.map(|d| d.to_chrono());

        let now = bson::DateTime::now();
        self.users()
            .update_one(
                doc! { "_id": &user.id },
                doc! {
                    "$set": { "last_login": now, "last_login_ip": attempt.ip },
                    "$inc": { "login_counts": 1 },
                },
            )
            .session(&mut *session)
            .await?;

        let history = LoginHistory::new(user.id.as_str(), attempt.user_agent, attempt.ip);
        self.store
            .collection::<LoginHistory>(LOGIN_HISTORIES)
            .insert_one(&history)
            .session(&mut *session)
            .await?;

        if should_alert(user.allow_login_ip_notification, previous_ip.as_deref(), attempt.ip) {
            self.enqueue_mail(
                session,
                &user.primary_email,
                MailTemplate::LoginIpAlert {
                    first_name: &user.first_name,
                    new_ip: attempt.ip,
                    user_agent: attempt.user_agent,
                    previous_ip: previous_ip.as_deref().unwrap_or_default(),
                    previous_login,
                },
            )
            .await?;
        }

        user.last_login = Some(now);
        user.last_login_ip = Some(attempt.ip.to_string());
        user.login_counts += 1;
        Ok(user)
    }

    /// Issue a fresh verification code for a signed-in user.
    pub async fn request_email_verification(&self, user_id: &str) -> Result<()> {
        let mut session = self.store.begin().await?;
        let outcome = async {
            let user = self.load_user(&mut session, user_id).await?;
            if user.auth.email_verified {
                return Err(PlatformError::conflict("EMAIL_ALREADY_VERIFIED", "email address is already verified"));
            }
            let code = self
                .issue_secure_token(&mut session, SecureTokenKind::EmailVerification, user_id)
                .await?;
            self.enqueue_mail(
                &mut session,
                &user.primary_email,
                MailTemplate::VerifyEmail {
                    first_name: &user.first_name,
                    user_id: &user.id,
                    code: &code,
                },
            )
            .await
        }
        .await;
        self.store.settle(session, outcome).await
    }

    /// Consume the code, mark the email verified and activate the account.
    pub async fn verify_email(&self, user_id: &str, code: &str) -> Result<User> {
        let mut session = self.store.begin().await?;
        let outcome = async {
            self.consume_secure_token(&mut session, SecureTokenKind::EmailVerification, user_id, code)
                .await?;
            self.users()
                .update_one(
                    doc! { "_id": user_id, "status": UserStatus::Inactive.as_str() },
                    doc! { "$set": { "status": UserStatus::Active.as_str() } },
                )
                .session(&mut session)
                .await?;
            self.users()
                .find_one_and_update(
                    doc! { "_id": user_id },
                    doc! { "$set": { "auth.email_verified": true, "modified_at": bson::DateTime::now() } },
                )
                .return_document(ReturnDocument::After)
                .session(&mut session)
                .await?
                .ok_or_else(|| PlatformError::not_found("User", user_id))
        }
        .await;
        let user = self.store.settle(session, outcome).await?;
        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Queue a reset code. Unknown addresses succeed silently.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = normalize_email(email)?;
        let Some(user) = self.users().find_one(doc! { "primary_email": &email }).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let mut session = self.store.begin().await?;
        let outcome = async {
            let code = self
                .issue_secure_token(&mut session, SecureTokenKind::PasswordReset, &user.id)
                .await?;
            self.enqueue_mail(
                &mut session,
                &user.primary_email,
                MailTemplate::PasswordReset {
                    first_name: &user.first_name,
                    user_id: &user.id,
                    code: &code,
                },
            )
            .await
        }
        .await;
        self.store.settle(session, outcome).await
    }

    pub async fn reset_password(&self, user_id: &str, code: &str, new_password: &str) -> Result<()> {
        self.passwords.policy().validate(new_password)?;
        let digest = self.passwords.hash(new_password)?;

        let mut session = self.store.begin().await?;
        let outcome = async {
            self.consume_secure_token(&mut session, SecureTokenKind::PasswordReset, user_id, code)
                .await?;
            let user = self.set_password_digest(&mut session, user_id, &digest).await?;
            self.enqueue_mail(
                &mut session,
                &user.primary_email,
                MailTemplate::PasswordResetConfirmation { first_name: &user.first_name },
            )
            .await
        }
        .await;
        self.store.settle(session, outcome).await?;
        info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    pub async fn change_password(&self, user_id: &str, current: &str, new_password: &str) -> Result<()> {
        self.passwords.policy().validate(new_password)?;

        let mut session = self.store.begin().await?;
        let outcome = async {
            let user = self.load_user(&mut session, user_id).await?;
            if !self.passwords.verify(&user.auth.password_digest, current)? {
                return Err(PlatformError::InvalidCredentials);
            }
            let digest = self.passwords.hash(new_password)?;
            self.set_password_digest(&mut session, user_id, &digest).await?;
            Ok::<_, PlatformError>(())
        }
        .await;
        self.store.settle(session, outcome).await?;
        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    async fn set_password_digest(&self, session: &mut ClientSession, user_id: &str, digest: &str) -> Result<User> {
        let now = bson::DateTime::now();
        self.users()
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "auth.password_digest": digest,
                    "auth.modified_at": now,
                    "modified_at": now,
                } },
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id))
    }

    /// Upload a new profile picture, then delete the one it replaces.
    pub async fn replace_thumbnail(&self, user_id: &str, source: MediaSource) -> Result<User> {
        let users = UserRepository::new(self.store.database());
        users.get(user_id).await?;

        let asset = self.media.upload(source, &self.media_folder("users")).await?;
        let handles = [asset.handle.clone()];
        let previous = media::with_rollback(
            self.media(),
            &handles,
            users.replace_thumbnail(user_id, &asset.url, &asset.handle),
        )
        .await?;

        if let Some(previous) = previous {
            media::discard(self.media(), &[previous]).await;
        }
        users.get(user_id).await
    }
}

/// A login from a new address warrants a mail when the user allows it.
/// The first ever login has nothing to compare against.
fn should_alert(allowed: bool, previous_ip: Option<&str>, new_ip: &str) -> bool {
    allowed && previous_ip.is_some_and(|previous| previous != new_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_only_when_allowed_and_ip_changed() {
        assert!(should_alert(true, Some("10.0.0.1"), "10.0.0.2"));
        assert!(!should_alert(true, Some("10.0.0.1"), "10.0.0.1"));
        assert!(!should_alert(false, Some("10.0.0.1"), "10.0.0.2"));
        assert!(!should_alert(true, None, "10.0.0.2"));
    }
}
