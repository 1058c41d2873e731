//! Discourse publisher library.
//!
//! Publishes Markdown notes to a Discourse forum: uploads embedded images,
//! creates or updates topics, and fetches the categories and tags used to
//! fill in a publishing form.

pub mod attachment;
pub mod config;
pub mod constants;
pub mod discourse;
pub mod note;
pub mod notify;

pub use attachment::{Attachment, AttachmentSource, VaultDir};
pub use config::Config;
pub use discourse::DiscourseClient;
pub use notify::{MemoryNotifier, Notifier, TracingNotifier};
