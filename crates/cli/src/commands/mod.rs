//! Command handlers for the HR advisor CLI.

pub mod ask;
pub mod check;
pub mod session;

pub use ask::AskCommand;
pub use check::CheckCommand;
pub use session::SessionCommand;
