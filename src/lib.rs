//! Kizuna - persona-grounded companion chat backend
//!
//! A user converses with a fixed virtual character that remembers prior
//! interactions, reacts with an emotional state, occasionally triggers a
//! physical event, and transparently supports an embedded rock-paper-scissors
//! mini-game inside free-form chat.

pub mod ai;
pub mod character;
pub mod config;
pub mod error;
pub mod game;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod prompt;
pub mod schema;
pub mod server;
pub mod session;
pub mod study;
pub mod transcribe;
pub mod voice;

pub use error::TurnError;
pub use orchestrator::{TurnInput, TurnOrchestrator};
pub use schema::{FinalDelivery, StructuredResponse};
