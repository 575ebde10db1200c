pub mod message;
pub mod summary;

pub use message::Message;
pub use summary::WindowSummary;
