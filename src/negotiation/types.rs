//! Negotiation types and state machine states

use crate::types::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Negotiation state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// Rounds in progress
    Negotiating,
    /// Round limit reached; participant must take or leave the last offer
    AwaitingFinalDecision,
    /// A deal was struck
    Accepted,
    /// Seller broke off the negotiation
    Aborted,
    /// Participant turned down the final offer
    Declined,
}

impl NegotiationState {
    /// Check if negotiation is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NegotiationState::Accepted | NegotiationState::Aborted | NegotiationState::Declined
        )
    }

    /// Check if negotiation is active
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Negotiating => "negotiating",
            NegotiationState::AwaitingFinalDecision => "awaiting_final_decision",
            NegotiationState::Accepted => "accepted",
            NegotiationState::Aborted => "aborted",
            NegotiationState::Declined => "declined",
        };
        write!(f, "{}", name)
    }
}

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Accepted,
    Abort,
    MaxRounds,
    Warnings,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FinishReason::Accepted => "accepted",
            FinishReason::Abort => "abort",
            FinishReason::MaxRounds => "max_rounds",
            FinishReason::Warnings => "warnings",
        };
        write!(f, "{}", name)
    }
}

/// One completed exchange; never modified after it is appended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub seller_offer: u64,
    pub buyer_counter: Option<u64>,
    pub accepted: bool,
}

/// Explicit participant decision, as opposed to a typed counter-offer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Decline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Input was rejected; the round did not advance
    Rejected,
    /// Lowball warning from the seller
    Warning,
    /// Minimal-increment pattern advisory
    Advisory,
}

/// User-visible message attached to a transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn rejected(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Rejected,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            text: text.into(),
        }
    }

    pub fn advisory(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Advisory,
            text: text.into(),
        }
    }
}

/// Everything the presentation layer needs after a transition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub participant_id: ParticipantId,
    pub label: Option<String>,
    pub state: NegotiationState,
    pub round: u32,
    pub max_rounds: u32,
    pub current_offer: u64,
    pub initial_offer: u64,
    /// Breakdown risk computed for the last counter-offer, if any
    pub risk_percent: Option<u8>,
    pub warning_count: u32,
    pub pattern_active: bool,
    pub advisory: Option<String>,
    /// Messages produced by the transition that led to this snapshot
    pub notices: Vec<Notice>,
    pub history: Vec<RoundRecord>,
    pub deal_price: Option<u64>,
    pub finish_reason: Option<FinishReason>,
}

impl SessionSnapshot {
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// First rejection notice, if the transition was refused
    pub fn rejection(&self) -> Option<&str> {
        self.notices
            .iter()
            .find(|n| n.kind == NoticeKind::Rejected)
            .map(|n| n.text.as_str())
    }
}

/// Consumer of session snapshots (terminal renderer, survey frontend, ...)
pub trait Presenter {
    fn present(&mut self, snapshot: &SessionSnapshot);
}
