//! Live browser session: navigation, overlay suppression and prompt
//! submission.

pub mod overlay;
pub mod session;

pub use session::Session;
