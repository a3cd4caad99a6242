//! External service collaborators
//!
//! HTTP clients for the coordination server: session tokens, membership
//! announcements, safety scan and metadata indexing. The group key service
//! lives in `security::keys` next to the transform that consumes it.

pub mod membership;
pub mod metadata;
pub mod session;

pub use membership::MembershipService;
pub use metadata::MetadataService;
pub use session::Session;
