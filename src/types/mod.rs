//! Shared data types for LinkVault.

pub mod bookmark;
pub mod errors;
pub mod event;
pub mod session;

pub use bookmark::{Bookmark, NewBookmark};
pub use event::ChangeEvent;
pub use session::Session;
