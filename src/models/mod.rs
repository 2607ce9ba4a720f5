pub mod attempt;
pub mod companion;
pub mod constants;
pub mod position;
pub mod session;

pub use attempt::GameAttempt;
pub use companion::{CompanionRole, HeartbeatRecord, SessionIdentity, ShrineReport};
pub use position::Position;
pub use session::SessionState;
