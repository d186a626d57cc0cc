//! Negotiation module: the scripted seller and its round state machine

pub mod acceptance;
pub mod engine;
pub mod pattern;
pub mod pricing;
pub mod random;
pub mod risk;
pub mod session;
pub mod types;

pub use acceptance::{AcceptRule, AcceptancePolicy};
pub use engine::NegotiationEngine;
pub use pattern::{PatternDetector, PatternUpdate};
pub use pricing::PricingEngine;
pub use random::{RandomSource, RandomStreams, ScriptedRandom, SeededRandom};
pub use risk::{AbortCheck, AbortRiskModel};
pub use session::{NegotiationSession, SessionParams};
pub use types::{
    Decision, FinishReason, NegotiationState, Notice, NoticeKind, Presenter, RoundRecord,
    SessionSnapshot,
};
