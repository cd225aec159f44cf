//! Turn state machine
//!
//! Elm-style: a pure transition function maps (state, context, event) to a
//! new state plus effects. The runtime executes the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{TurnContext, TurnId, TurnState};
pub use transition::{transition, TransitionError, TransitionResult, ERROR_REPLY};
