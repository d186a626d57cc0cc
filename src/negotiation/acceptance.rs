//! Seller acceptance policy

use crate::config::NegotiationConfig;
use crate::types::scaled;

use super::session::NegotiationSession;

/// Which acceptance rule fired
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptRule {
    /// Buyer met or beat the standing offer
    MetStandingOffer,
    /// Within the relative tolerance band
    WithinTolerance,
    /// Within the absolute distance
    WithinDistance,
    /// Above the absolute acceptance threshold
    AboveThreshold,
    /// Final rounds and at or above the floor
    FinalRoundsAtFloor,
}

pub struct AcceptancePolicy<'a> {
    config: &'a NegotiationConfig,
}

impl<'a> AcceptancePolicy<'a> {
    pub fn new(config: &'a NegotiationConfig) -> Self {
        Self { config }
    }

    pub fn should_accept(&self, session: &NegotiationSession, buyer_offer: u64) -> bool {
        self.matching_rule(session, buyer_offer).is_some()
    }

    /// First rule that accepts `buyer_offer`, in evaluation order
    pub fn matching_rule(&self, session: &NegotiationSession, buyer_offer: u64) -> Option<AcceptRule> {
        let acceptance = &self.config.acceptance;
        let current = session.current_offer();
        let scale = session.scale_factor();

        if buyer_offer >= current {
            return Some(AcceptRule::MetStandingOffer);
        }

        let gap = current - buyer_offer;
        if current > 0 && gap as f64 / current as f64 <= acceptance.tolerance {
            return Some(AcceptRule::WithinTolerance);
        }

        if let Some(within) = acceptance.accept_within {
            if gap <= scaled(within, scale) {
                return Some(AcceptRule::WithinDistance);
            }
        }

        if let Some(above) = acceptance.accept_above {
            if buyer_offer > scaled(above, scale) {
                return Some(AcceptRule::AboveThreshold);
            }
        }

        if session.rounds_remaining() < acceptance.final_rounds_window
            && buyer_offer >= session.min_price()
        {
            return Some(AcceptRule::FinalRoundsAtFloor);
        }

        None
    }
}
