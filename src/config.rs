//! Negotiation configuration and named profiles
//!
//! Every monetary constant here is a base amount; sessions multiply it by
//! their drawn scale factor before use. Layering, lowest precedence first:
//! profile defaults, JSON file, `HAGGLE_*` environment variables, CLI flags.

use crate::error::{HaggleError, Result};
use crate::negotiation::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Current configuration schema version
pub const CONFIG_VERSION: u32 = 1;

/// Named behavior profiles for the variants that disagree on abort gating,
/// pattern thresholds and how large gaps affect risk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Aborts gated to round 4+, pattern after 3 offers, linear gap risk
    #[default]
    Standard,
    /// Aborts from round 1, pattern after 2 offers, tiered gap risk
    Strict,
    /// No breakdown risk, absolute-gap auto-accept, even-spread late steps
    Classic,
}

impl Profile {
    pub fn all() -> [Profile; 3] {
        [Profile::Standard, Profile::Strict, Profile::Classic]
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Profile::Standard => "aborts gated to round 4+, pattern after 3 offers, linear gap risk",
            Profile::Strict => "aborts from round 1, pattern after 2 offers, tiered gap risk",
            Profile::Classic => "no breakdown risk, auto-accept within 100, even-spread late steps",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Standard => "standard",
            Profile::Strict => "strict",
            Profile::Classic => "classic",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Profile {
    type Err = HaggleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Profile::Standard),
            "strict" => Ok(Profile::Strict),
            "classic" => Ok(Profile::Classic),
            other => Err(HaggleError::UnknownProfile(other.to_string())),
        }
    }
}

/// Inclusive range the per-session round limit is drawn from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRange {
    pub min: u32,
    pub max: u32,
}

/// How the seller concedes once the early phase is over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateReduction {
    /// Random share of how far the buyer moved between their last two offers
    BuyerMovement,
    /// Remaining room to the floor spread evenly over the remaining rounds
    EvenSpread,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Rounds `1..=early_rounds` use the early-phase reduction
    pub early_rounds: u32,
    pub early_min_step: u64,
    pub early_max_step: u64,
    /// Buyer offer at which the early reduction reaches `early_max_step`
    pub early_threshold: u64,
    pub late_mode: LateReduction,
    /// Inclusive percentage range applied to the buyer's movement
    pub late_percent_min: u32,
    pub late_percent_max: u32,
    /// Used when the buyer did not move at all
    pub fallback_step: u64,
    /// Smallest step in even-spread mode
    pub even_spread_min_step: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceConfig {
    /// Relative band around the seller offer, e.g. 0.05 for 5%
    pub tolerance: f64,
    /// Any offer strictly above this is accepted
    pub accept_above: Option<u64>,
    /// Accept any offer within this absolute distance of the seller offer
    pub accept_within: Option<u64>,
    /// With fewer than this many rounds left, any offer at or above the floor is accepted
    pub final_rounds_window: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Offers below this are left to the lowball path
    pub relevant_floor: u64,
    /// Largest increase that still counts as a minimal step
    pub step_bound: u64,
    /// Run length (in offers) that activates the pattern
    pub run_threshold: usize,
}

/// One step of a tiered gap lookup: gaps of at least `min_gap` carry `percent`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub min_gap: u64,
    pub percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskCurve {
    /// `gap / reference_distance * max_percent`
    Linear {
        reference_distance: u64,
        max_percent: f64,
    },
    /// Highest tier whose `min_gap` the gap reaches; tiers need not be monotonic
    Tiered { tiers: Vec<RiskTier> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternSurcharge {
    /// Percent added in the first pattern round
    pub base: f64,
    /// Percent added per further consecutive pattern round
    pub per_round: f64,
    /// Cap on the surcharge itself
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// When false, risk is still computed and shown but never triggers
    pub enabled: bool,
    /// Offers below this are insulting: risk is 100
    pub insulting_offer: u64,
    pub curve: RiskCurve,
    pub pattern_surcharge: PatternSurcharge,
    /// Rounds before this never abort; `None` allows aborts from round 1
    pub abort_from_round: Option<u32>,
    /// Lowball warnings tolerated before the seller walks away
    pub max_warnings: u32,
}

/// Cosmetic pause before the seller's counter is revealed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThinkDelay {
    pub base_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl ThinkDelay {
    /// Pause length: `base_ms` plus a uniform jitter
    pub fn sample(&self, rng: &mut dyn RandomSource) -> Duration {
        let jitter = rng.uniform(self.jitter_min_ms as i64, self.jitter_max_ms as i64);
        Duration::from_millis(self.base_ms + jitter.max(0) as u64)
    }
}

/// Complete, versioned negotiation configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    pub version: u32,
    pub profile: Profile,
    /// Seller's opening price when no catalog item is used
    pub initial_offer: u64,
    /// Floor as a share of the opening price when no catalog item is used
    pub min_price_ratio: f64,
    pub rounds: RoundRange,
    /// One factor is drawn per session
    pub scale_factors: Vec<f64>,
    pub rounding_increment: u64,
    pub pricing: PricingConfig,
    pub acceptance: AcceptanceConfig,
    pub pattern: PatternConfig,
    pub risk: RiskConfig,
    pub think_delay: ThinkDelay,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Standard)
    }
}

impl NegotiationConfig {
    /// Defaults for a named profile
    pub fn for_profile(profile: Profile) -> Self {
        let mut config = Self {
            version: CONFIG_VERSION,
            profile,
            initial_offer: 5500,
            min_price_ratio: 0.7273,
            rounds: RoundRange { min: 7, max: 12 },
            scale_factors: vec![1.0, 1.3, 1.5],
            rounding_increment: 25,
            pricing: PricingConfig {
                early_rounds: 3,
                early_min_step: 250,
                early_max_step: 500,
                early_threshold: 3000,
                late_mode: LateReduction::BuyerMovement,
                late_percent_min: 1,
                late_percent_max: 25,
                fallback_step: 50,
                even_spread_min_step: 25,
            },
            acceptance: AcceptanceConfig {
                tolerance: 0.05,
                accept_above: Some(5000),
                accept_within: None,
                final_rounds_window: 2,
            },
            pattern: PatternConfig {
                relevant_floor: 2250,
                step_bound: 100,
                run_threshold: 3,
            },
            risk: RiskConfig {
                enabled: true,
                insulting_offer: 2000,
                curve: RiskCurve::Linear {
                    reference_distance: 3000,
                    max_percent: 30.0,
                },
                pattern_surcharge: PatternSurcharge {
                    base: 2.0,
                    per_round: 1.0,
                    max: 7.0,
                },
                abort_from_round: Some(4),
                max_warnings: 3,
            },
            think_delay: ThinkDelay {
                base_ms: 500,
                jitter_min_ms: 200,
                jitter_max_ms: 600,
            },
        };

        match profile {
            Profile::Standard => {}
            Profile::Strict => {
                config.rounding_increment = 50;
                config.pricing.even_spread_min_step = 50;
                config.acceptance.accept_above = None;
                config.pattern.run_threshold = 2;
                config.risk.abort_from_round = None;
                config.risk.curve = RiskCurve::Tiered {
                    tiers: vec![
                        RiskTier { min_gap: 0, percent: 0.0 },
                        RiskTier { min_gap: 250, percent: 3.0 },
                        RiskTier { min_gap: 500, percent: 6.0 },
                        RiskTier { min_gap: 1000, percent: 10.0 },
                        RiskTier { min_gap: 1500, percent: 15.0 },
                        RiskTier { min_gap: 2500, percent: 20.0 },
                        // bold opening offers are tolerated better than timid ones
                        RiskTier { min_gap: 3500, percent: 12.0 },
                    ],
                };
                config.risk.pattern_surcharge = PatternSurcharge {
                    base: 3.0,
                    per_round: 2.0,
                    max: 7.0,
                };
            }
            Profile::Classic => {
                config.rounding_increment = 10;
                config.pricing.even_spread_min_step = 10;
                config.acceptance.accept_above = None;
                config.acceptance.accept_within = Some(100);
                config.pricing.late_mode = LateReduction::EvenSpread;
                config.risk.enabled = false;
            }
        }

        config
    }

    /// Load a JSON file layered over the defaults of the profile it names
    /// (or `standard`). Omitted fields keep their profile defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json_str_over(text, Profile::default())
    }

    /// Like `from_json_file`, with `fallback` as the base profile when the
    /// file does not name one
    pub fn from_json_file_over(path: &Path, fallback: Profile) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str_over(&text, fallback)
    }

    pub fn from_json_str_over(text: &str, fallback: Profile) -> Result<Self> {
        let overrides: serde_json::Value = serde_json::from_str(text)?;
        let profile = match overrides.get("profile").and_then(|p| p.as_str()) {
            Some(name) => name.parse()?,
            None => fallback,
        };

        let mut merged = serde_json::to_value(Self::for_profile(profile))?;
        merge_json(&mut merged, overrides);

        let config: Self = serde_json::from_value(merged)?;
        if config.version != CONFIG_VERSION {
            return Err(HaggleError::InvalidConfig(format!(
                "unsupported config version {} (expected {})",
                config.version, CONFIG_VERSION
            )));
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply `HAGGLE_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `HAGGLE_*` overrides from an arbitrary lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HAGGLE_INITIAL_OFFER") {
            self.initial_offer = parse_env("HAGGLE_INITIAL_OFFER", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_MIN_PRICE_RATIO") {
            self.min_price_ratio = parse_env("HAGGLE_MIN_PRICE_RATIO", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_ROUNDS_MIN") {
            self.rounds.min = parse_env("HAGGLE_ROUNDS_MIN", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_ROUNDS_MAX") {
            self.rounds.max = parse_env("HAGGLE_ROUNDS_MAX", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_ROUNDING_INCREMENT") {
            self.rounding_increment = parse_env("HAGGLE_ROUNDING_INCREMENT", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_INSULTING_OFFER") {
            self.risk.insulting_offer = parse_env("HAGGLE_INSULTING_OFFER", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_ABORT_FROM_ROUND") {
            self.risk.abort_from_round = match v.trim() {
                "" | "off" | "none" => None,
                n => Some(parse_env("HAGGLE_ABORT_FROM_ROUND", n)?),
            };
        }
        if let Some(v) = lookup("HAGGLE_PATTERN_THRESHOLD") {
            self.pattern.run_threshold = parse_env("HAGGLE_PATTERN_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("HAGGLE_SCALE_FACTORS") {
            self.scale_factors = v
                .split(',')
                .map(|f| parse_env("HAGGLE_SCALE_FACTORS", f))
                .collect::<Result<Vec<f64>>>()?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(HaggleError::InvalidConfig(msg.to_string())) };

        if self.rounds.min == 0 || self.rounds.min > self.rounds.max {
            return invalid("rounds.min must be >= 1 and <= rounds.max");
        }
        if self.scale_factors.is_empty() {
            return invalid("scale_factors must not be empty");
        }
        if self.scale_factors.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return invalid("scale_factors must be positive");
        }
        if self.rounding_increment == 0 {
            return invalid("rounding_increment must be >= 1");
        }
        if !(self.min_price_ratio > 0.0 && self.min_price_ratio <= 1.0) {
            return invalid("min_price_ratio must be in (0, 1]");
        }
        if self.pricing.early_min_step > self.pricing.early_max_step {
            return invalid("pricing.early_min_step must be <= early_max_step");
        }
        if self.pricing.fallback_step < self.rounding_increment
            || self.pricing.even_spread_min_step < self.rounding_increment
        {
            return invalid(
                "pricing.fallback_step and even_spread_min_step must be >= rounding_increment",
            );
        }
        if self.pricing.early_threshold == 0 {
            return invalid("pricing.early_threshold must be >= 1");
        }
        if self.pricing.late_percent_min > self.pricing.late_percent_max
            || self.pricing.late_percent_max > 100
        {
            return invalid("pricing.late_percent range must be within 0..=100");
        }
        if !(0.0..1.0).contains(&self.acceptance.tolerance) {
            return invalid("acceptance.tolerance must be in [0, 1)");
        }
        if self.pattern.run_threshold < 2 {
            return invalid("pattern.run_threshold must be >= 2");
        }
        if let RiskCurve::Linear {
            reference_distance, ..
        } = self.risk.curve
        {
            if reference_distance == 0 {
                return invalid("risk.curve.reference_distance must be >= 1");
            }
        }
        if self.think_delay.jitter_min_ms > self.think_delay.jitter_max_ms {
            return invalid("think_delay.jitter_min_ms must be <= jitter_max_ms");
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HaggleError::InvalidConfig(format!("{}={:?}", key, value)))
}

/// Recursively overlay `patch` onto `base`; objects merge, everything else replaces
fn merge_json(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::random::ScriptedRandom;
    use std::collections::HashMap;

    #[test]
    fn test_default_profiles_validate() {
        for profile in Profile::all() {
            let config = NegotiationConfig::for_profile(profile);
            assert!(config.validate().is_ok(), "{} should validate", profile);
            assert_eq!(config.profile, profile);
        }
    }

    #[test]
    fn test_profiles_resolve_variants() {
        let standard = NegotiationConfig::for_profile(Profile::Standard);
        let strict = NegotiationConfig::for_profile(Profile::Strict);

        assert_eq!(standard.risk.abort_from_round, Some(4));
        assert_eq!(strict.risk.abort_from_round, None);
        assert_eq!(standard.pattern.run_threshold, 3);
        assert_eq!(strict.pattern.run_threshold, 2);
        assert!(matches!(strict.risk.curve, RiskCurve::Tiered { .. }));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("Strict".parse::<Profile>().unwrap(), Profile::Strict);
        assert!(matches!(
            "lenient".parse::<Profile>(),
            Err(HaggleError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_partial_json_layers_over_profile() {
        let json = r#"{
            "profile": "strict",
            "rounding_increment": 10,
            "risk": { "insulting_offer": 1800 }
        }"#;
        let config = NegotiationConfig::from_json_str(json).unwrap();

        assert_eq!(config.profile, Profile::Strict);
        assert_eq!(config.rounding_increment, 10);
        assert_eq!(config.risk.insulting_offer, 1800);
        // untouched strict defaults survive
        assert_eq!(config.pattern.run_threshold, 2);
        assert_eq!(config.risk.abort_from_round, None);
    }

    #[test]
    fn test_json_fallback_profile() {
        let json = r#"{ "initial_offer": 6000 }"#;
        let config = NegotiationConfig::from_json_str_over(json, Profile::Classic).unwrap();
        assert_eq!(config.profile, Profile::Classic);
        assert_eq!(config.initial_offer, 6000);
        assert_eq!(config.acceptance.accept_within, Some(100));

        let named = r#"{ "profile": "strict" }"#;
        let config = NegotiationConfig::from_json_str_over(named, Profile::Classic).unwrap();
        assert_eq!(config.profile, Profile::Strict);
    }

    #[test]
    fn test_json_version_mismatch_rejected() {
        let result = NegotiationConfig::from_json_str(r#"{ "version": 99 }"#);
        assert!(matches!(result, Err(HaggleError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HAGGLE_ROUNDS_MIN", "5"),
            ("HAGGLE_ROUNDS_MAX", "6"),
            ("HAGGLE_ABORT_FROM_ROUND", "off"),
            ("HAGGLE_SCALE_FACTORS", "1.0, 2.0"),
        ]
        .into_iter()
        .collect();

        let mut config = NegotiationConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rounds, RoundRange { min: 5, max: 6 });
        assert_eq!(config.risk.abort_from_round, None);
        assert_eq!(config.scale_factors, vec![1.0, 2.0]);
    }

    #[test]
    fn test_env_override_bad_value() {
        let mut config = NegotiationConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == "HAGGLE_ROUNDING_INCREMENT").then(|| "ten".to_string())
        });
        assert!(matches!(result, Err(HaggleError::InvalidConfig(_))));
    }

    #[test]
    fn test_think_delay_sample() {
        let delay = NegotiationConfig::default().think_delay;
        let mut rng = ScriptedRandom::new(vec![0, 10_000]);
        assert_eq!(delay.sample(&mut rng), Duration::from_millis(700));
        assert_eq!(delay.sample(&mut rng), Duration::from_millis(1100));
    }

    #[test]
    fn test_validate_rejects_inverted_rounds() {
        let mut config = NegotiationConfig::default();
        config.rounds = RoundRange { min: 9, max: 3 };
        assert!(config.validate().is_err());

        let mut config = NegotiationConfig::default();
        config.scale_factors.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_steps_below_increment() {
        let mut config = NegotiationConfig::for_profile(Profile::Classic);
        config.pricing.even_spread_min_step = 5;
        assert!(matches!(config.validate(), Err(HaggleError::InvalidConfig(_))));

        let mut config = NegotiationConfig::for_profile(Profile::Strict);
        config.pricing.fallback_step = 25;
        assert!(matches!(config.validate(), Err(HaggleError::InvalidConfig(_))));
    }
}
