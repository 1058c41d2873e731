//! Shared constants used across the application.

/// User agent string sent with every forum API request.
pub const USER_AGENT: &str = concat!("discourse-publisher/", env!("CARGO_PKG_VERSION"));

/// Header carrying the user API key on every request.
pub const API_KEY_HEADER: &str = "User-Api-Key";

/// Prefix of the multipart boundary used for image uploads.
///
/// Random hex is appended per upload so the boundary never collides with
/// the file content.
pub const BOUNDARY_PREFIX: &str = "----DiscoursePublisherBoundary";

/// Edit reason recorded on post revisions when none is configured.
pub const DEFAULT_EDIT_REASON: &str = "Updated from notes";

/// File extensions treated as embeddable images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp"];
