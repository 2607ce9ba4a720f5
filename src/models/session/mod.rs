mod transitions;
mod types;

pub use types::SessionState;
