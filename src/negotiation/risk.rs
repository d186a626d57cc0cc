//! Breakdown (abort) risk model

use crate::config::{NegotiationConfig, RiskCurve};
use crate::types::scaled;

use super::random::RandomSource;
use super::session::NegotiationSession;

/// Outcome of one abort check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbortCheck {
    /// Risk in percent, 0..=100
    pub risk: u8,
    /// Offer was below the insulting-offer threshold
    pub lowball: bool,
    /// Round gate (or a disabled model) prevented a real abort
    pub gated: bool,
    /// Uniform roll in 1..=100, when one was needed
    pub roll: Option<u8>,
    pub triggered: bool,
}

pub struct AbortRiskModel<'a> {
    config: &'a NegotiationConfig,
}

impl<'a> AbortRiskModel<'a> {
    pub fn new(config: &'a NegotiationConfig) -> Self {
        Self { config }
    }

    pub fn is_lowball(&self, session: &NegotiationSession, buyer_offer: u64) -> bool {
        buyer_offer < scaled(self.config.risk.insulting_offer, session.scale_factor())
    }

    /// Risk from the gap between the standing offer and `buyer_offer`
    pub fn base_risk(&self, session: &NegotiationSession, buyer_offer: u64) -> f64 {
        let gap = session.current_offer().saturating_sub(buyer_offer);
        let scale = session.scale_factor();

        match &self.config.risk.curve {
            RiskCurve::Linear {
                reference_distance,
                max_percent,
            } => {
                let reference = scaled(*reference_distance, scale).max(1) as f64;
                gap as f64 / reference * max_percent
            }
            RiskCurve::Tiered { tiers } => {
                let mut sorted: Vec<_> = tiers.iter().collect();
                sorted.sort_by_key(|t| t.min_gap);
                sorted
                    .iter()
                    .rev()
                    .find(|t| gap >= scaled(t.min_gap, scale))
                    .map(|t| t.percent)
                    .unwrap_or(0.0)
            }
        }
    }

    /// Surcharge for an active minimal-increment pattern, escalating per
    /// consecutive pattern round up to the configured cap
    pub fn pattern_surcharge(&self, session: &NegotiationSession) -> f64 {
        if !session.pattern_active() {
            return 0.0;
        }
        let surcharge = &self.config.risk.pattern_surcharge;
        let extra_rounds = session.pattern_risk_rounds().saturating_sub(1) as f64;
        (surcharge.base + surcharge.per_round * extra_rounds).min(surcharge.max)
    }

    /// Breakdown risk in percent for `buyer_offer` against the standing offer
    pub fn risk_of(&self, session: &NegotiationSession, buyer_offer: u64) -> u8 {
        if self.is_lowball(session, buyer_offer) {
            return 100;
        }
        let total = self.base_risk(session, buyer_offer) + self.pattern_surcharge(session);
        total.clamp(0.0, 100.0).round() as u8
    }

    /// Whether a triggered abort is suppressed this round
    pub fn is_gated(&self, session: &NegotiationSession) -> bool {
        let risk = &self.config.risk;
        !risk.enabled
            || risk
                .abort_from_round
                .map_or(false, |from| session.round() < from)
    }

    /// Compute the risk and, unless gated, sample whether the seller walks
    /// away. Certain (100%) and impossible (0%) outcomes consume no draw.
    /// The caller applies the resulting transition.
    pub fn maybe_abort(
        &self,
        session: &NegotiationSession,
        buyer_offer: u64,
        rng: &mut dyn RandomSource,
    ) -> AbortCheck {
        let risk = self.risk_of(session, buyer_offer);
        let lowball = self.is_lowball(session, buyer_offer);
        let gated = self.is_gated(session);

        let (roll, triggered) = if gated || risk == 0 {
            (None, false)
        } else if risk >= 100 {
            (None, true)
        } else {
            let roll = rng.uniform(1, 100) as u8;
            (Some(roll), roll <= risk)
        };

        tracing::debug!(
            round = session.round(),
            buyer_offer,
            risk,
            gated,
            ?roll,
            triggered,
            "abort check"
        );

        AbortCheck {
            risk,
            lowball,
            gated,
            roll,
            triggered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use crate::negotiation::random::ScriptedRandom;
    use crate::negotiation::session::SessionParams;
    use crate::types::ParticipantId;

    fn session(scale: f64) -> NegotiationSession {
        NegotiationSession::new(
            ParticipantId("p_risk".to_string()),
            SessionParams::fixed(5500, 4000, 10, scale),
        )
    }

    #[test]
    fn test_insulting_offer_is_certain() {
        let config = NegotiationConfig::default();
        let model = AbortRiskModel::new(&config);

        assert_eq!(model.risk_of(&session(1.0), 1000), 100);
        assert_eq!(model.risk_of(&session(1.0), 1999), 100);
        assert!(model.risk_of(&session(1.0), 2000) < 100);
        // threshold scales: 2000 * 1.5 = 3000
        assert_eq!(model.risk_of(&session(1.5), 2999), 100);
    }

    #[test]
    fn test_linear_gap_risk() {
        let config = NegotiationConfig::default();
        let model = AbortRiskModel::new(&config);

        // gap 2500 / 3000 * 30 = 25
        assert_eq!(model.risk_of(&session(1.0), 3000), 25);
        // gap 1500 -> 15
        assert_eq!(model.risk_of(&session(1.0), 4000), 15);
        assert_eq!(model.risk_of(&session(1.0), 5500), 0);
    }

    #[test]
    fn test_tiered_gap_risk_rewards_bold_gaps() {
        let config = NegotiationConfig::for_profile(Profile::Strict);
        let model = AbortRiskModel::new(&config);
        let mut session = session(1.0);

        assert_eq!(model.risk_of(&session, 5400), 0);
        assert_eq!(model.risk_of(&session, 4900), 6);
        assert_eq!(model.risk_of(&session, 2900), 20);

        // from 7000 a 2500 offer is a bold 4500 gap
        session = NegotiationSession::new(
            ParticipantId("p_bold".to_string()),
            SessionParams::fixed(7000, 4000, 10, 1.0),
        );
        assert_eq!(model.risk_of(&session, 2500), 12);
    }

    #[test]
    fn test_pattern_surcharge_escalates_and_caps() {
        let config = NegotiationConfig::default();
        let model = AbortRiskModel::new(&config);
        let mut session = session(1.0);

        assert_eq!(model.pattern_surcharge(&session), 0.0);

        session.set_pattern(true, 1, None);
        assert_eq!(model.pattern_surcharge(&session), 2.0);
        assert_eq!(model.risk_of(&session, 3000), 27);

        session.set_pattern(true, 4, None);
        assert_eq!(model.pattern_surcharge(&session), 5.0);

        session.set_pattern(true, 30, None);
        assert_eq!(model.pattern_surcharge(&session), 7.0);
    }

    #[test]
    fn test_risk_never_exceeds_100() {
        let mut config = NegotiationConfig::default();
        config.risk.curve = RiskCurve::Linear {
            reference_distance: 100,
            max_percent: 90.0,
        };
        let model = AbortRiskModel::new(&config);
        let mut session = session(1.0);
        session.set_pattern(true, 3, None);

        assert_eq!(model.risk_of(&session, 2500), 100);
    }

    #[test]
    fn test_gate_suppresses_early_abort() {
        let config = NegotiationConfig::default();
        let model = AbortRiskModel::new(&config);
        let mut rng = ScriptedRandom::new(vec![1]);

        let check = model.maybe_abort(&session(1.0), 1000, &mut rng);
        assert_eq!(check.risk, 100);
        assert!(check.lowball);
        assert!(check.gated);
        assert!(!check.triggered);
        assert_eq!(rng.consumed(), 0);
    }

    #[test]
    fn test_certain_abort_without_roll() {
        let config = NegotiationConfig::for_profile(Profile::Strict);
        let model = AbortRiskModel::new(&config);
        let mut rng = ScriptedRandom::new(vec![100]);

        let check = model.maybe_abort(&session(1.0), 1000, &mut rng);
        assert!(check.triggered);
        assert_eq!(check.roll, None);
        assert_eq!(rng.consumed(), 0);
    }

    #[test]
    fn test_roll_against_risk() {
        let config = NegotiationConfig::for_profile(Profile::Strict);
        let model = AbortRiskModel::new(&config);

        // risk 20
        let check = model.maybe_abort(&session(1.0), 2900, &mut ScriptedRandom::new(vec![20]));
        assert!(check.triggered);
        assert_eq!(check.roll, Some(20));

        let check = model.maybe_abort(&session(1.0), 2900, &mut ScriptedRandom::new(vec![21]));
        assert!(!check.triggered);
    }

    #[test]
    fn test_disabled_model_never_aborts() {
        let config = NegotiationConfig::for_profile(Profile::Classic);
        let model = AbortRiskModel::new(&config);
        let mut session = session(1.0);
        while session.round() < 8 {
            session.advance_round();
        }

        let check = model.maybe_abort(&session, 500, &mut ScriptedRandom::new(vec![1]));
        assert_eq!(check.risk, 100);
        assert!(check.gated);
        assert!(!check.triggered);
    }
}
