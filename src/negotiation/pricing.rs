//! Seller counter-offer computation

use crate::config::{LateReduction, NegotiationConfig};
use crate::types::{round_to_increment, scaled, ParticipantId};

use super::random::RandomSource;
use super::session::{NegotiationSession, SessionParams};
use super::types::{FinishReason, RoundRecord};

/// Computes the seller's next standing offer
pub struct PricingEngine<'a> {
    config: &'a NegotiationConfig,
}

impl<'a> PricingEngine<'a> {
    pub fn new(config: &'a NegotiationConfig) -> Self {
        Self { config }
    }

    /// Next seller offer after `buyer_offer` was countered this round.
    ///
    /// Always a multiple of the rounding increment (unless pinned to the
    /// floor), never below `min_price` and never above the standing offer.
    pub fn next_offer(
        &self,
        session: &NegotiationSession,
        buyer_offer: u64,
        rng: &mut dyn RandomSource,
    ) -> u64 {
        let reduction = if session.round() <= self.config.pricing.early_rounds {
            self.early_reduction(session.scale_factor(), buyer_offer)
        } else {
            match self.config.pricing.late_mode {
                LateReduction::BuyerMovement => self.movement_reduction(session, buyer_offer, rng),
                LateReduction::EvenSpread => self.even_spread_reduction(session),
            }
        };

        let current = session.current_offer();
        let target = current as f64 - reduction as f64;
        let offer = round_to_increment(target, self.config.rounding_increment)
            .clamp(session.min_price(), current);

        tracing::debug!(
            round = session.round(),
            buyer_offer,
            reduction,
            offer,
            "computed seller counter"
        );

        offer
    }

    /// Early phase: higher buyer offers earn larger steps, interpolated
    /// between the scaled minimum and maximum step
    pub fn early_reduction(&self, scale_factor: f64, buyer_offer: u64) -> u64 {
        let pricing = &self.config.pricing;
        let min_step = scaled(pricing.early_min_step, scale_factor) as f64;
        let max_step = scaled(pricing.early_max_step, scale_factor) as f64;
        let threshold = scaled(pricing.early_threshold, scale_factor).max(1) as f64;

        let ratio = (buyer_offer as f64 / threshold).clamp(0.0, 1.0);
        (min_step + ratio * (max_step - min_step)).round() as u64
    }

    /// Late phase: a random share of how far the buyer just moved
    fn movement_reduction(
        &self,
        session: &NegotiationSession,
        buyer_offer: u64,
        rng: &mut dyn RandomSource,
    ) -> u64 {
        let pricing = &self.config.pricing;
        let distance = match session.previous_buyer_offer() {
            Some(previous) => buyer_offer as i64 - previous as i64,
            None => session.initial_offer() as i64 - buyer_offer as i64,
        };

        if distance <= 0 {
            return scaled(pricing.fallback_step, session.scale_factor())
                .max(self.config.rounding_increment);
        }

        let percent = rng.uniform(
            i64::from(pricing.late_percent_min),
            i64::from(pricing.late_percent_max),
        );
        let raw = distance as f64 * percent as f64 / 100.0;
        let reduction = round_to_increment(raw, self.config.rounding_increment);

        // a step that rounds away to nothing would stall the seller
        reduction.max(self.config.rounding_increment)
    }

    /// Remaining room to the floor spread over the remaining rounds
    fn even_spread_reduction(&self, session: &NegotiationSession) -> u64 {
        let remaining = session.current_offer().saturating_sub(session.min_price());
        let remaining_rounds = u64::from(session.max_rounds() - session.round() + 1).max(1);
        let step = (remaining as f64 / remaining_rounds as f64).round() as u64;
        step.max(scaled(
            self.config.pricing.even_spread_min_step,
            session.scale_factor(),
        ))
        .max(self.config.rounding_increment)
    }

    /// Re-run the pricing of a recorded history against `rng`.
    ///
    /// Returns the sequence of standing offers starting with the opening
    /// price: one entry per record that was countered. Accepted records end
    /// the replay. When the session broke off (`finish_reason` is `Abort` or
    /// `Warnings`) its last record was never countered and is skipped.
    pub fn replay(
        &self,
        params: SessionParams,
        history: &[RoundRecord],
        finish_reason: Option<FinishReason>,
        rng: &mut dyn RandomSource,
    ) -> Vec<u64> {
        let mut shadow = NegotiationSession::new(ParticipantId("replay".to_string()), params);
        let mut offers = vec![shadow.current_offer()];

        let countered = match finish_reason {
            Some(FinishReason::Abort | FinishReason::Warnings) => {
                &history[..history.len().saturating_sub(1)]
            }
            _ => history,
        };

        for record in countered {
            let Some(buyer_offer) = record.buyer_counter else {
                break;
            };
            if record.accepted {
                break;
            }

            let next = self.next_offer(&shadow, buyer_offer, rng);
            let replayed = RoundRecord {
                round: shadow.round(),
                seller_offer: shadow.current_offer(),
                buyer_counter: Some(buyer_offer),
                accepted: false,
            };
            if shadow.record(replayed).is_err() {
                break;
            }
            shadow.set_current_offer(next);
            shadow.advance_round();
            offers.push(next);
        }

        offers
    }
}
