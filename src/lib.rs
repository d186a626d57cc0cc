//! Haggle: price negotiation against a scripted seller
//!
//! A participant negotiates over one item with a seller whose behaviour is
//! fully determined by configuration and injected randomness:
//! - price concessions that shrink over the rounds
//! - acceptance rules for offers close to the asking price
//! - a breakdown risk that grows with the gap and with timid haggling
//! - a bounded number of rounds ending in a final take-it-or-leave-it offer

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod negotiation;
pub mod types;

// Re-export commonly used types
pub use config::{NegotiationConfig, Profile};
pub use error::{HaggleError, Result};
pub use negotiation::{
    Decision, NegotiationEngine, NegotiationState, RandomStreams, SessionSnapshot,
};
pub use types::ParticipantId;
