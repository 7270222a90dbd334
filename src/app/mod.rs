//! Application layer containing business logic and shared state.

pub mod attachments;
pub mod bugs;
pub mod comments;
pub mod members;
pub mod projects;
pub mod state;
pub mod users;

pub use attachments::{AttachmentService, FileUpload, ALLOWED_MIME_TYPES, MAX_UPLOAD_BYTES};
pub use bugs::BugService;
pub use comments::CommentService;
pub use members::MemberService;
pub use projects::ProjectService;
pub use state::{AppState, Repositories};
pub use users::UserService;
