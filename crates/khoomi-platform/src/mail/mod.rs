//! Transactional email: templates, delivery, and the outbox that defers
//! sending until the triggering transaction has committed.

pub mod mailer;
pub mod outbox;
pub mod processor;
pub mod templates;

pub use mailer::{Envelope, LogMailer, Mailer, SmtpMailer};
pub use outbox::{MailOutboxItem, MailOutboxRepository, OutboxStatus};
pub use processor::{MailOutboxProcessor, ProcessorConfig};
pub use templates::{MailTemplate, RenderedMail};
