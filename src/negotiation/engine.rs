//! Negotiation engine: the round-by-round state machine
//!
//! The engine exclusively owns the live session. Every public operation
//! resolves completely and returns a snapshot; invalid input or an invalid
//! transition leaves the session untouched and surfaces as a rejection
//! notice on that snapshot.

use crate::catalog::CatalogItem;
use crate::config::NegotiationConfig;
use crate::error::{HaggleError, Result};
use crate::events::{EventKind, EventSink, SessionEvent};
use crate::types::ParticipantId;

use super::acceptance::AcceptancePolicy;
use super::pattern::PatternDetector;
use super::pricing::PricingEngine;
use super::random::RandomStreams;
use super::risk::AbortRiskModel;
use super::session::{NegotiationSession, SessionParams};
use super::types::{
    Decision, FinishReason, NegotiationState, Notice, RoundRecord, SessionSnapshot,
};

/// Negotiation engine for one participant
pub struct NegotiationEngine {
    config: NegotiationConfig,
    session: NegotiationSession,
    streams: RandomStreams,
    sink: Box<dyn EventSink>,
}

impl NegotiationEngine {
    /// Start a session, drawing its round limit, scale factor and
    /// participant id from the session stream
    pub fn start(
        config: NegotiationConfig,
        item: Option<&CatalogItem>,
        mut streams: RandomStreams,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let session = Self::fresh_session(&config, item, &mut streams);
        Ok(Self {
            config,
            session,
            streams,
            sink,
        })
    }

    /// Start a session with explicit creation-time values
    pub fn with_params(
        config: NegotiationConfig,
        participant_id: ParticipantId,
        params: SessionParams,
        streams: RandomStreams,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let session = NegotiationSession::new(participant_id, params);
        Self::log_start(&session);
        Ok(Self {
            config,
            session,
            streams,
            sink,
        })
    }

    fn fresh_session(
        config: &NegotiationConfig,
        item: Option<&CatalogItem>,
        streams: &mut RandomStreams,
    ) -> NegotiationSession {
        let participant_id = ParticipantId::generate(streams.session.as_mut());
        let params = SessionParams::draw(config, item, streams.session.as_mut());
        let session = NegotiationSession::new(participant_id, params);
        Self::log_start(&session);
        session
    }

    fn log_start(session: &NegotiationSession) {
        tracing::info!(
            participant = %session.participant_id(),
            item = ?session.item_id(),
            initial_offer = session.initial_offer(),
            min_price = session.min_price(),
            max_rounds = session.max_rounds(),
            scale_factor = session.scale_factor(),
            "negotiation started"
        );
    }

    /// Discard the current session and start a fresh one
    pub fn restart(&mut self, item: Option<&CatalogItem>) -> SessionSnapshot {
        tracing::info!(participant = %self.session.participant_id(), "session restarted");
        self.session = Self::fresh_session(&self.config, item, &mut self.streams);
        self.snapshot()
    }

    pub fn session(&self) -> &NegotiationSession {
        &self.session
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Seed of the random streams, when they were seeded
    pub fn seed(&self) -> Option<u64> {
        self.streams.seed()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Parse raw participant input into a whole monetary amount
    pub fn parse_offer(raw: &str) -> Result<u64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HaggleError::InvalidOffer("please enter an amount".to_string()));
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| HaggleError::InvalidOffer(format!("{:?} is not a number", trimmed)))?;
        if !value.is_finite() {
            return Err(HaggleError::InvalidOffer(format!("{:?} is not a finite amount", trimmed)));
        }
        if value < 0.0 {
            return Err(HaggleError::InvalidOffer("offers cannot be negative".to_string()));
        }
        Ok(value.round() as u64)
    }

    fn validate_offer(&self, raw: &str) -> Result<u64> {
        let offer = Self::parse_offer(raw)?;
        if let Some(previous) = self.session.previous_buyer_offer() {
            if offer < previous {
                return Err(HaggleError::RegressiveOffer {
                    previous,
                    offered: offer,
                });
            }
        }
        Ok(offer)
    }

    /// Handle one raw counter-offer from the participant
    pub fn submit_offer(&mut self, raw: &str) -> SessionSnapshot {
        let result = match self.session.state() {
            NegotiationState::Negotiating => self
                .validate_offer(raw)
                .and_then(|offer| self.run_round(offer)),
            NegotiationState::AwaitingFinalDecision => Err(HaggleError::InvalidStateTransition(
                "the round limit is reached; accept or decline the final offer".to_string(),
            )),
            state => Err(HaggleError::SessionFinished(state.to_string())),
        };
        self.finish_transition(result)
    }

    /// Handle an explicit accept or decline
    pub fn decide(&mut self, decision: Decision) -> SessionSnapshot {
        let result = self.apply_decision(decision);
        self.finish_transition(result)
    }

    fn finish_transition(&mut self, result: Result<Vec<Notice>>) -> SessionSnapshot {
        let notices = match result {
            Ok(notices) => notices,
            Err(e) => {
                let kind = if e.is_input_error() { "input" } else { "transition" };
                tracing::warn!(participant = %self.session.participant_id(), "rejected {}: {}", kind, e);
                vec![Notice::rejected(e.to_string())]
            }
        };

        let mut snapshot = self.session.snapshot();
        snapshot.notices = notices;
        snapshot
    }

    fn apply_decision(&mut self, decision: Decision) -> Result<Vec<Notice>> {
        let current = self.session.current_offer();
        match (self.session.state(), decision) {
            (NegotiationState::Negotiating, Decision::Accept) => {
                let record = RoundRecord {
                    round: self.session.round(),
                    seller_offer: current,
                    buyer_counter: None,
                    accepted: true,
                };
                self.append(record)?;
                self.terminate(NegotiationState::Accepted, FinishReason::Accepted, Some(current))?;
                Ok(Vec::new())
            }
            (NegotiationState::Negotiating, Decision::Decline) => {
                Err(HaggleError::InvalidStateTransition(
                    "only the final offer can be declined; make a counter-offer instead"
                        .to_string(),
                ))
            }
            (NegotiationState::AwaitingFinalDecision, Decision::Accept) => {
                self.terminate(NegotiationState::Accepted, FinishReason::Accepted, Some(current))?;
                Ok(Vec::new())
            }
            (NegotiationState::AwaitingFinalDecision, Decision::Decline) => {
                self.terminate(NegotiationState::Declined, FinishReason::MaxRounds, None)?;
                Ok(Vec::new())
            }
            (state, _) => Err(HaggleError::SessionFinished(state.to_string())),
        }
    }

    /// Steps 3-5 of a round for an already validated offer
    fn run_round(&mut self, buyer_offer: u64) -> Result<Vec<Notice>> {
        let config = &self.config;
        let round = self.session.round();
        let standing = self.session.current_offer();
        let mut notices = Vec::new();

        if AcceptancePolicy::new(config).should_accept(&self.session, buyer_offer) {
            self.append(RoundRecord {
                round,
                seller_offer: standing,
                buyer_counter: Some(buyer_offer),
                accepted: true,
            })?;
            self.terminate(NegotiationState::Accepted, FinishReason::Accepted, Some(buyer_offer))?;
            return Ok(notices);
        }

        PatternDetector::new(&self.config).update_pattern(&mut self.session, buyer_offer);
        let check = AbortRiskModel::new(&self.config).maybe_abort(
            &self.session,
            buyer_offer,
            self.streams.risk.as_mut(),
        );
        self.session.set_last_risk(check.risk);

        if check.triggered {
            self.append(RoundRecord {
                round,
                seller_offer: standing,
                buyer_counter: Some(buyer_offer),
                accepted: false,
            })?;
            self.terminate(NegotiationState::Aborted, FinishReason::Abort, None)?;
            return Ok(notices);
        }

        if check.lowball && check.gated && self.config.risk.enabled {
            let warnings = self.session.add_warning();
            let limit = self.config.risk.max_warnings;
            tracing::info!(
                participant = %self.session.participant_id(),
                round,
                buyer_offer,
                warnings,
                "lowball warning"
            );
            if limit > 0 && warnings >= limit {
                self.append(RoundRecord {
                    round,
                    seller_offer: standing,
                    buyer_counter: Some(buyer_offer),
                    accepted: false,
                })?;
                self.terminate(NegotiationState::Aborted, FinishReason::Warnings, None)?;
                return Ok(vec![Notice::warning(
                    "The seller has had enough of insulting offers and walked away.",
                )]);
            }
            notices.push(Notice::warning(format!(
                "An offer of {} is insulting. Warning {} of {}.",
                buyer_offer, warnings, limit
            )));
        }

        if let Some(advisory) = self.session.advisory() {
            notices.push(Notice::advisory(advisory));
        }

        let next = PricingEngine::new(&self.config).next_offer(
            &self.session,
            buyer_offer,
            self.streams.pricing.as_mut(),
        );
        self.append(RoundRecord {
            round,
            seller_offer: standing,
            buyer_counter: Some(buyer_offer),
            accepted: false,
        })?;
        self.session.set_current_offer(next);

        if round >= self.session.max_rounds() {
            self.session.await_final_decision()?;
            tracing::info!(
                participant = %self.session.participant_id(),
                round,
                final_offer = next,
                "round limit reached"
            );
        } else {
            self.session.advance_round();
            tracing::info!(
                participant = %self.session.participant_id(),
                round,
                buyer_offer,
                seller_offer = next,
                risk = check.risk,
                "seller countered"
            );
        }

        Ok(notices)
    }

    fn append(&mut self, record: RoundRecord) -> Result<()> {
        let event = SessionEvent {
            kind: EventKind::Round,
            participant_id: self.session.participant_id().clone(),
            round: record.round,
            seller_offer: record.seller_offer,
            buyer_counter: record.buyer_counter,
            accepted: record.accepted,
            finished: false,
            deal_price: None,
            finish_reason: None,
        };
        self.session.record(record)?;
        self.emit(&event);
        Ok(())
    }

    fn terminate(
        &mut self,
        state: NegotiationState,
        reason: FinishReason,
        deal_price: Option<u64>,
    ) -> Result<()> {
        self.session.finish(state, reason, deal_price)?;

        let session = &self.session;
        tracing::info!(
            participant = %session.participant_id(),
            round = session.round(),
            state = %state,
            reason = %reason,
            deal_price = ?deal_price,
            "negotiation finished"
        );

        let event = SessionEvent {
            kind: EventKind::Terminal,
            participant_id: session.participant_id().clone(),
            round: session.round(),
            seller_offer: session.current_offer(),
            buyer_counter: session.previous_buyer_offer(),
            accepted: session.is_accepted(),
            finished: true,
            deal_price,
            finish_reason: Some(reason),
        };
        self.emit(&event);
        Ok(())
    }

    fn emit(&self, event: &SessionEvent) {
        if let Err(e) = self.sink.deliver(event) {
            tracing::warn!(
                participant = %event.participant_id,
                "dropping event for round {}: {}",
                event.round,
                e
            );
        }
    }
}
