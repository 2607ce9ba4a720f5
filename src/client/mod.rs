//! Seams to the game client.
//!
//! The supervisor never touches the client directly. Session management,
//! screen detection, synthetic input and the process itself sit behind these
//! traits so the control loop can be driven by the real client or by
//! [`crate::sim`].

use anyhow::Result;
use std::sync::Arc;

use crate::context::Context;
use crate::models::{Position, SessionIdentity};
use crate::plan::RunPlan;
use crate::supervisor::RunError;

/// Session lifecycle calls into the client.
pub trait SessionManager: Send + Sync {
    fn in_session(&self) -> bool;

    /// Create and enter a new session from character selection.
    fn new_session(&self) -> Result<()>;

    /// Leave the current session.
    fn exit_session(&self) -> Result<()>;

    fn join_online_session(&self, name: &str, password: &str) -> Result<()>;

    /// Create a session from the lobby, named with `counter`.
    fn create_lobby_session(&self, counter: u32) -> Result<SessionIdentity>;

    /// Identity of the session most recently entered.
    fn last_session(&self) -> SessionIdentity;
}

/// Screen predicates read from the client.
pub trait ScreenReader: Send + Sync {
    /// Re-read client state. May block when the client is frozen.
    fn refresh(&self) -> Result<()>;

    fn is_loading_screen(&self) -> bool;

    fn is_in_character_creation(&self) -> bool;

    fn is_in_character_selection(&self) -> bool;

    fn is_in_lobby(&self) -> bool;

    /// Text of a dismissable modal, if one is shown.
    fn dismissable_modal(&self) -> Option<String>;

    /// `None` outside a session or while the player is not loaded.
    fn player_position(&self) -> Option<Position>;

    fn player_level(&self) -> u32;
}

/// Synthetic input.
pub trait InputDevice: Send + Sync {
    fn press_escape(&self) -> Result<()>;

    fn click(&self, x: i32, y: i32) -> Result<()>;
}

/// The client process.
pub trait ClientProcess: Send + Sync {
    /// Start the client if needed and wait until it accepts input.
    fn ensure_running(&self) -> Result<()>;

    fn kill(&self) -> Result<()>;
}

/// Scripted gameplay for one session.
pub trait GameplayExecutor: Send + Sync {
    /// Play `plan` until it is done, the character has to leave, or `ctx` is
    /// cancelled.
    fn run_session(
        &self,
        ctx: &Context,
        is_first_attempt: bool,
        plan: &RunPlan,
    ) -> std::result::Result<(), RunError>;
}

/// The four client-side handles of one supervised character.
#[derive(Clone)]
pub struct Client {
    pub manager: Arc<dyn SessionManager>,
    pub screen: Arc<dyn ScreenReader>,
    pub input: Arc<dyn InputDevice>,
    pub process: Arc<dyn ClientProcess>,
}

impl Client {
    /// Build a client from one value that implements every seam.
    pub fn from_shared<T>(client: Arc<T>) -> Self
    where
        T: SessionManager + ScreenReader + InputDevice + ClientProcess + 'static,
    {
        Self {
            manager: client.clone(),
            screen: client.clone(),
            input: client.clone(),
            process: client,
        }
    }
}
