//! Anonymized negotiation events for the research log

pub mod sink;

pub use sink::{ChannelSink, EventSink, MemorySink, NullSink};

use crate::negotiation::types::FinishReason;
use crate::types::ParticipantId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A round record was appended
    Round,
    /// The session reached a terminal state
    Terminal,
}

/// One log line: a completed round or a terminal transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub participant_id: ParticipantId,
    pub round: u32,
    pub seller_offer: u64,
    pub buyer_counter: Option<u64>,
    pub accepted: bool,
    pub finished: bool,
    pub deal_price: Option<u64>,
    pub finish_reason: Option<FinishReason>,
}
