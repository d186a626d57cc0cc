//! Detection of minimal-increment offer streaks

use crate::config::NegotiationConfig;
use crate::types::scaled;

use super::session::NegotiationSession;

/// Result of one pattern update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternUpdate {
    pub active: bool,
    /// Offers in the terminal run of minimal increments
    pub run_length: usize,
    pub risk_rounds: u32,
}

pub struct PatternDetector<'a> {
    config: &'a NegotiationConfig,
}

impl<'a> PatternDetector<'a> {
    pub fn new(config: &'a NegotiationConfig) -> Self {
        Self { config }
    }

    /// Length of the trailing run of offers whose increases stay within the
    /// step bound. Offers below the relevant floor are ignored; if the
    /// latest offer is one of them there is no run.
    pub fn terminal_run(&self, scale_factor: f64, offers: &[u64]) -> usize {
        let floor = scaled(self.config.pattern.relevant_floor, scale_factor);
        let step_bound = scaled(self.config.pattern.step_bound, scale_factor) as i64;

        match offers.last() {
            Some(last) if *last >= floor => {}
            _ => return 0,
        }

        let relevant: Vec<i64> = offers
            .iter()
            .filter(|o| **o >= floor)
            .map(|o| *o as i64)
            .collect();

        let mut run = 1;
        for pair in relevant.windows(2).rev() {
            let increase = pair[1] - pair[0];
            if (0..=step_bound).contains(&increase) {
                run += 1;
            } else {
                break;
            }
        }
        run
    }

    /// Fold `buyer_offer` into the session's pattern state
    pub fn update_pattern(&self, session: &mut NegotiationSession, buyer_offer: u64) -> PatternUpdate {
        let offers: Vec<u64> = session
            .buyer_offers()
            .chain(std::iter::once(buyer_offer))
            .collect();
        let run_length = self.terminal_run(session.scale_factor(), &offers);
        let active = run_length >= self.config.pattern.run_threshold;

        let update = if active {
            let risk_rounds = session.pattern_risk_rounds() + 1;
            let advisory = format!(
                "Your last {} offers barely moved. The seller is losing patience.",
                run_length
            );
            session.set_pattern(true, risk_rounds, Some(advisory));
            PatternUpdate {
                active,
                run_length,
                risk_rounds,
            }
        } else {
            session.set_pattern(false, 0, None);
            PatternUpdate {
                active,
                run_length,
                risk_rounds: 0,
            }
        };

        if update.active {
            tracing::debug!(
                participant = %session.participant_id(),
                run_length,
                risk_rounds = update.risk_rounds,
                "minimal-increment pattern active"
            );
        }

        update
    }
}
