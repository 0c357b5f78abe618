//! Transactional email templates
//!
//! Each message has an HTML and a plain-text rendering. Links point at the
//! public site (`origin_url`), never at the API host.

use askama::Template;
use chrono::{DateTime, Utc};

use crate::shared::error::Result;

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    origin_url: &'a str,
    first_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    origin_url: &'a str,
    first_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.html")]
struct VerifyEmailHtml<'a> {
    origin_url: &'a str,
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    origin_url: &'a str,
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset_confirmation.html")]
struct ResetConfirmationHtml<'a> {
    origin_url: &'a str,
    first_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset_confirmation.txt")]
struct ResetConfirmationText<'a> {
    first_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/login_ip_alert.html")]
struct LoginAlertHtml<'a> {
    origin_url: &'a str,
    first_name: &'a str,
    new_ip: &'a str,
    user_agent: &'a str,
    previous_ip: &'a str,
    previous_login: &'a str,
}

#[derive(Template)]
#[template(path = "email/login_ip_alert.txt")]
struct LoginAlertText<'a> {
    first_name: &'a str,
    new_ip: &'a str,
    user_agent: &'a str,
    previous_ip: &'a str,
    previous_login: &'a str,
}

#[derive(Template)]
#[template(path = "email/shop_created.html")]
struct ShopCreatedHtml<'a> {
    origin_url: &'a str,
    first_name: &'a str,
    shop_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/shop_created.txt")]
struct ShopCreatedText<'a> {
    first_name: &'a str,
    shop_name: &'a str,
    link: &'a str,
}

#[derive(Debug, Clone)]
pub enum MailTemplate<'a> {
    Welcome {
        first_name: &'a str,
    },
    VerifyEmail {
        first_name: &'a str,
        user_id: &'a str,
        code: &'a str,
    },
    PasswordReset {
        first_name: &'a str,
        user_id: &'a str,
        code: &'a str,
    },
    PasswordResetConfirmation {
        first_name: &'a str,
    },
    /// Values from before the login that triggered the alert
    LoginIpAlert {
        first_name: &'a str,
        new_ip: &'a str,
        user_agent: &'a str,
        previous_ip: &'a str,
        previous_login: Option<DateTime<Utc>>,
    },
    ShopCreated {
        first_name: &'a str,
        shop_name: &'a str,
        shop_slug: &'a str,
    },
}

/// Subject and bodies ready for the outbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMail {
    pub kind: &'static str,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl MailTemplate<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::VerifyEmail { .. } => "verify_email",
            Self::PasswordReset { .. } => "password_reset",
            Self::PasswordResetConfirmation { .. } => "password_reset_confirmation",
            Self::LoginIpAlert { .. } => "login_ip_alert",
            Self::ShopCreated { .. } => "shop_created",
        }
    }

    pub fn render(&self, origin_url: &str) -> Result<RenderedMail> {
        let origin_url = origin_url.trim_end_matches('/');
        let (subject, text_body, html_body) = match *self {
            Self::Welcome { first_name } => (
                "Welcome to Khoomi".to_string(),
                WelcomeText { origin_url, first_name }.render()?,
                WelcomeHtml { origin_url, first_name }.render()?,
            ),
            Self::VerifyEmail { first_name, user_id, code } => {
                let link = format!("{}/email-verification?id={}&token={}", origin_url, user_id, code);
                (
                    "Verify your Khoomi email address".to_string(),
                    VerifyEmailText { first_name, link: &link }.render()?,
                    VerifyEmailHtml { origin_url, first_name, link: &link }.render()?,
                )
            }
            Self::PasswordReset { first_name, user_id, code } => {
                let link = format!("{}/password-reset?id={}&token={}", origin_url, user_id, code);
                (
                    "Reset your Khoomi password".to_string(),
                    PasswordResetText { first_name, link: &link }.render()?,
                    PasswordResetHtml { origin_url, first_name, link: &link }.render()?,
                )
            }
            Self::PasswordResetConfirmation { first_name } => (
                "Your Khoomi password was changed".to_string(),
                ResetConfirmationText { first_name }.render()?,
                ResetConfirmationHtml { origin_url, first_name }.render()?,
            ),
            Self::LoginIpAlert { first_name, new_ip, user_agent, previous_ip, previous_login } => {
                let previous_login = previous_login
                    .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let previous_login = previous_login.as_str();
                (
                    "New sign-in to your Khoomi account".to_string(),
                    LoginAlertText { first_name, new_ip, user_agent, previous_ip, previous_login }.render()?,
                    LoginAlertHtml { origin_url, first_name, new_ip, user_agent, previous_ip, previous_login }
                        .render()?,
                )
            }
            Self::ShopCreated { first_name, shop_name, shop_slug } => {
                let link = format!("{}/shop/{}", origin_url, shop_slug);
                (
                    format!("{} is open on Khoomi", shop_name),
                    ShopCreatedText { first_name, shop_name, link: &link }.render()?,
                    ShopCreatedHtml { origin_url, first_name, shop_name, link: &link }.render()?,
                )
            }
        };

        Ok(RenderedMail {
            kind: self.kind(),
            subject,
            text_body,
            html_body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://khoomi.com/";

    #[test]
    fn test_reset_link_uses_origin() {
        let mail = MailTemplate::PasswordReset {
            first_name: "Ada",
            user_id: "65a1b2c3d4e5f60718293a4b",
            code: "0123456789abcdef",
        }
        .render(ORIGIN)
        .unwrap();

        let link = "https://khoomi.com/password-reset?id=65a1b2c3d4e5f60718293a4b&token=0123456789abcdef";
        assert_eq!(mail.kind, "password_reset");
        assert!(mail.text_body.contains(link));
        assert!(mail.html_body.contains("https://khoomi.com/password-reset?id=65a1b2c3d4e5f60718293a4b"));
        assert!(mail.text_body.starts_with("Hi Ada,"));
    }

    #[test]
    fn test_html_is_escaped() {
        let mail = MailTemplate::Welcome { first_name: "<script>" }.render(ORIGIN).unwrap();
        assert!(!mail.html_body.contains("<script>"));
        assert!(mail.text_body.contains("<script>"));
    }

    #[test]
    fn test_login_alert_reports_previous_values() {
        let previous = DateTime::parse_from_rfc3339("2024-03-01T10:30:00Z").unwrap().with_timezone(&Utc);
        let mail = MailTemplate::LoginIpAlert {
            first_name: "Ada",
            new_ip: "10.0.0.2",
            user_agent: "curl/8",
            previous_ip: "10.0.0.1",
            previous_login: Some(previous),
        }
        .render(ORIGIN)
        .unwrap();
        assert!(mail.text_body.contains("Previous address: 10.0.0.1"));
        assert!(mail.text_body.contains("Previous sign-in: 2024-03-01 10:30 UTC"));
        assert!(mail.text_body.contains("New address: 10.0.0.2"));
    }

    #[test]
    fn test_shop_created_subject() {
        let mail = MailTemplate::ShopCreated { first_name: "Ada", shop_name: "Clay Co", shop_slug: "clay-co" }
            .render(ORIGIN)
            .unwrap();
        assert_eq!(mail.subject, "Clay Co is open on Khoomi");
        assert!(mail.text_body.contains("https://khoomi.com/shop/clay-co"));
    }
}
