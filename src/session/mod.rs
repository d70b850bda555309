//! Session orchestration.
//!
//! A [`Session`] gates input on the connection, turns finalized captures
//! into [`Utterance`]s and runs every turn through [`run_turn`]:
//! user entry, typing placeholder, exchange, reply or error entry, speech.
//! Turns are independent tasks and may interleave.

pub mod input;
pub mod orchestrator;
pub mod turn;

pub use input::{InputSource, Utterance};
pub use orchestrator::{connected_notice, Session, CONNECT_FAILED_PREFIX};
pub use turn::{run_turn, TurnOutcome, ERROR_PREFIX};
