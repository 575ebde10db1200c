pub mod bus;
pub mod error;
pub mod session;

pub use bus::EventBus;
pub use error::{PulseError, Result};
pub use session::{Publisher, Session, Subscriber};
