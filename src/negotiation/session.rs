//! Negotiation session state

use crate::catalog::CatalogItem;
use crate::config::NegotiationConfig;
use crate::error::{HaggleError, Result};
use crate::types::{round_to_increment, scaled, ParticipantId};

use super::random::{shuffled, RandomSource};
use super::types::{FinishReason, NegotiationState, RoundRecord, SessionSnapshot};

/// Per-session values fixed at creation
#[derive(Clone, Debug, PartialEq)]
pub struct SessionParams {
    pub item_id: Option<String>,
    pub label: Option<String>,
    pub initial_offer: u64,
    pub min_price: u64,
    pub max_rounds: u32,
    pub scale_factor: f64,
}

impl SessionParams {
    /// Explicit values, bypassing all draws
    pub fn fixed(initial_offer: u64, min_price: u64, max_rounds: u32, scale_factor: f64) -> Self {
        Self {
            item_id: None,
            label: None,
            initial_offer,
            min_price: min_price.min(initial_offer),
            max_rounds: max_rounds.max(1),
            scale_factor,
        }
    }

    /// Draw round limit and scale factor, then scale the item's (or the
    /// configured) prices and round them to the configured increment
    pub fn draw(
        config: &NegotiationConfig,
        item: Option<&CatalogItem>,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let max_rounds = rng.uniform(i64::from(config.rounds.min), i64::from(config.rounds.max)) as u32;
        let scale_factor = shuffled(rng, &config.scale_factors)
            .first()
            .copied()
            .unwrap_or(1.0);

        let (base_initial, base_min) = match item {
            Some(item) => (item.initial_offer, item.min_price),
            None => (
                config.initial_offer,
                (config.initial_offer as f64 * config.min_price_ratio).round() as u64,
            ),
        };

        let increment = config.rounding_increment;
        let initial_offer = round_to_increment(scaled(base_initial, scale_factor) as f64, increment);
        let min_price = round_to_increment(scaled(base_min, scale_factor) as f64, increment);

        Self {
            item_id: item.map(|i| i.id.clone()),
            label: item.map(|i| i.label.clone()),
            initial_offer,
            min_price: min_price.min(initial_offer),
            max_rounds: max_rounds.max(1),
            scale_factor,
        }
    }
}

/// A single participant's negotiation against the scripted seller
#[derive(Clone, Debug)]
pub struct NegotiationSession {
    participant_id: ParticipantId,
    item_id: Option<String>,
    label: Option<String>,
    round: u32,
    max_rounds: u32,
    scale_factor: f64,
    initial_offer: u64,
    current_offer: u64,
    min_price: u64,
    history: Vec<RoundRecord>,
    warning_count: u32,
    pattern_active: bool,
    pattern_risk_rounds: u32,
    advisory: Option<String>,
    last_risk: Option<u8>,
    state: NegotiationState,
    deal_price: Option<u64>,
    finish_reason: Option<FinishReason>,
}

impl NegotiationSession {
    pub fn new(participant_id: ParticipantId, params: SessionParams) -> Self {
        Self {
            participant_id,
            item_id: params.item_id,
            label: params.label,
            round: 1,
            max_rounds: params.max_rounds,
            scale_factor: params.scale_factor,
            initial_offer: params.initial_offer,
            current_offer: params.initial_offer,
            min_price: params.min_price,
            history: Vec::new(),
            warning_count: 0,
            pattern_active: false,
            pattern_risk_rounds: 0,
            advisory: None,
            last_risk: None,
            state: NegotiationState::Negotiating,
            deal_price: None,
            finish_reason: None,
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Rounds left after the current one
    pub fn rounds_remaining(&self) -> u32 {
        self.max_rounds.saturating_sub(self.round)
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn initial_offer(&self) -> u64 {
        self.initial_offer
    }

    pub fn current_offer(&self) -> u64 {
        self.current_offer
    }

    pub fn min_price(&self) -> u64 {
        self.min_price
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn pattern_active(&self) -> bool {
        self.pattern_active
    }

    pub fn pattern_risk_rounds(&self) -> u32 {
        self.pattern_risk_rounds
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn last_risk(&self) -> Option<u8> {
        self.last_risk
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_accepted(&self) -> bool {
        self.state == NegotiationState::Accepted
    }

    pub fn deal_price(&self) -> Option<u64> {
        self.deal_price
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// The creation-time values, for replaying this session's pricing
    pub fn params(&self) -> SessionParams {
        SessionParams {
            item_id: self.item_id.clone(),
            label: self.label.clone(),
            initial_offer: self.initial_offer,
            min_price: self.min_price,
            max_rounds: self.max_rounds,
            scale_factor: self.scale_factor,
        }
    }

    /// Buyer counters in the order they were made
    pub fn buyer_offers(&self) -> impl Iterator<Item = u64> + '_ {
        self.history.iter().filter_map(|r| r.buyer_counter)
    }

    /// The buyer's most recent recorded counter
    pub fn previous_buyer_offer(&self) -> Option<u64> {
        self.history.iter().rev().find_map(|r| r.buyer_counter)
    }

    /// Append a completed exchange
    pub(crate) fn record(&mut self, record: RoundRecord) -> Result<()> {
        if self.state.is_terminal() {
            return Err(HaggleError::InvalidStateTransition(
                "Cannot record a round on a finished session".to_string(),
            ));
        }
        self.history.push(record);
        Ok(())
    }

    /// Install the seller's new standing offer, keeping it within
    /// `[min_price, current_offer]`
    pub(crate) fn set_current_offer(&mut self, offer: u64) {
        self.current_offer = offer.clamp(self.min_price, self.current_offer);
    }

    pub(crate) fn advance_round(&mut self) {
        if self.round < self.max_rounds {
            self.round += 1;
        }
    }

    pub(crate) fn set_pattern(&mut self, active: bool, risk_rounds: u32, advisory: Option<String>) {
        self.pattern_active = active;
        self.pattern_risk_rounds = risk_rounds;
        self.advisory = advisory;
    }

    pub(crate) fn set_last_risk(&mut self, risk: u8) {
        self.last_risk = Some(risk);
    }

    pub(crate) fn add_warning(&mut self) -> u32 {
        self.warning_count += 1;
        self.warning_count
    }

    pub(crate) fn await_final_decision(&mut self) -> Result<()> {
        if self.state != NegotiationState::Negotiating {
            return Err(HaggleError::InvalidStateTransition(format!(
                "Cannot await a final decision from {}",
                self.state
            )));
        }
        self.state = NegotiationState::AwaitingFinalDecision;
        Ok(())
    }

    /// Move to a terminal state; terminal fields are set exactly once
    pub(crate) fn finish(
        &mut self,
        state: NegotiationState,
        reason: FinishReason,
        deal_price: Option<u64>,
    ) -> Result<()> {
        if self.state.is_terminal() {
            return Err(HaggleError::SessionFinished(format!(
                "already {} ({})",
                self.state,
                self.finish_reason.map(|r| r.to_string()).unwrap_or_default()
            )));
        }
        if !state.is_terminal() {
            return Err(HaggleError::InvalidStateTransition(format!(
                "{} is not a terminal state",
                state
            )));
        }
        self.state = state;
        self.finish_reason = Some(reason);
        self.deal_price = deal_price;
        Ok(())
    }

    /// Full view for the presentation layer
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            participant_id: self.participant_id.clone(),
            label: self.label.clone(),
            state: self.state,
            round: self.round,
            max_rounds: self.max_rounds,
            current_offer: self.current_offer,
            initial_offer: self.initial_offer,
            risk_percent: self.last_risk,
            warning_count: self.warning_count,
            pattern_active: self.pattern_active,
            advisory: self.advisory.clone(),
            notices: Vec::new(),
            history: self.history.clone(),
            deal_price: self.deal_price,
            finish_reason: self.finish_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NegotiationConfig, Profile, RoundRange};
    use crate::negotiation::random::ScriptedRandom;

    fn session() -> NegotiationSession {
        NegotiationSession::new(
            ParticipantId("p_test".to_string()),
            SessionParams::fixed(5500, 4000, 8, 1.0),
        )
    }

    #[test]
    fn test_session_creation() {
        let session = session();

        assert_eq!(session.round(), 1);
        assert_eq!(session.current_offer(), 5500);
        assert_eq!(session.min_price(), 4000);
        assert_eq!(session.state(), NegotiationState::Negotiating);
        assert!(session.history().is_empty());
        assert!(!session.is_finished());
    }

    #[test]
    fn test_draw_scales_prices() {
        let mut config = NegotiationConfig::for_profile(Profile::Standard);
        config.rounds = RoundRange { min: 9, max: 9 };
        config.scale_factors = vec![1.5];
        let item = CatalogItem {
            id: "3".to_string(),
            label: "Kombi".to_string(),
            initial_offer: 5500,
            min_price: 4000,
        };

        let mut rng = ScriptedRandom::new(vec![0]);
        let params = SessionParams::draw(&config, Some(&item), &mut rng);

        assert_eq!(params.max_rounds, 9);
        assert_eq!(params.scale_factor, 1.5);
        assert_eq!(params.initial_offer, 8250);
        assert_eq!(params.min_price, 6000);
        assert_eq!(params.item_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_draw_without_item_uses_ratio() {
        let mut config = NegotiationConfig::default();
        config.scale_factors = vec![1.0];
        let mut rng = ScriptedRandom::new(vec![0]);
        let params = SessionParams::draw(&config, None, &mut rng);

        assert_eq!(params.initial_offer, 5500);
        assert_eq!(params.min_price, 4000);
        assert_eq!(params.max_rounds, 7);
    }

    #[test]
    fn test_current_offer_stays_in_bounds() {
        let mut session = session();

        session.set_current_offer(3000);
        assert_eq!(session.current_offer(), 4000);

        session.set_current_offer(9000);
        assert_eq!(session.current_offer(), 4000);
    }

    #[test]
    fn test_round_never_passes_limit() {
        let mut session = session();
        for _ in 0..20 {
            session.advance_round();
        }
        assert_eq!(session.round(), 8);
        assert_eq!(session.rounds_remaining(), 0);
    }

    #[test]
    fn test_previous_buyer_offer() {
        let mut session = session();
        assert_eq!(session.previous_buyer_offer(), None);

        session
            .record(RoundRecord {
                round: 1,
                seller_offer: 5500,
                buyer_counter: Some(3000),
                accepted: false,
            })
            .unwrap();
        session
            .record(RoundRecord {
                round: 2,
                seller_offer: 5100,
                buyer_counter: Some(3200),
                accepted: false,
            })
            .unwrap();

        assert_eq!(session.previous_buyer_offer(), Some(3200));
        assert_eq!(session.buyer_offers().collect::<Vec<_>>(), vec![3000, 3200]);
    }

    #[test]
    fn test_finish_only_once() {
        let mut session = session();
        session
            .finish(NegotiationState::Accepted, FinishReason::Accepted, Some(5400))
            .unwrap();

        assert!(session.is_accepted());
        assert_eq!(session.deal_price(), Some(5400));

        let again = session.finish(NegotiationState::Aborted, FinishReason::Abort, None);
        assert!(matches!(again, Err(HaggleError::SessionFinished(_))));
        assert_eq!(session.finish_reason(), Some(FinishReason::Accepted));
    }

    #[test]
    fn test_cannot_record_after_finish() {
        let mut session = session();
        session
            .finish(NegotiationState::Declined, FinishReason::MaxRounds, None)
            .unwrap();

        let result = session.record(RoundRecord {
            round: 1,
            seller_offer: 5500,
            buyer_counter: Some(4000),
            accepted: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_finish_rejects_non_terminal_state() {
        let mut session = session();
        let result = session.finish(NegotiationState::Negotiating, FinishReason::Abort, None);
        assert!(matches!(result, Err(HaggleError::InvalidStateTransition(_))));
        assert!(!session.is_finished());
    }
}
