pub mod command;
pub mod session;

pub use command::{PresentationCommand, TabEvent, TabId, TabLoadStatus};
pub use session::{BreakDecision, SessionKind};
