//! Core types used throughout haggle

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::negotiation::random::RandomSource;

/// Anonymized participant identifier (hash of random material)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Derive an identifier from arbitrary seed material
    pub fn from_material(material: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(material);
        let result = hasher.finalize();
        Self(hex::encode(&result[..12]))
    }

    /// Generate a fresh identifier from the session random stream and the clock
    pub fn generate(rng: &mut dyn RandomSource) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut material = Vec::with_capacity(32);
        for _ in 0..4 {
            let draw = rng.uniform(0, i64::from(u32::MAX));
            material.extend_from_slice(&draw.to_be_bytes());
        }
        material.extend_from_slice(&nanos.to_be_bytes());

        Self::from_material(&material)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scale a monetary constant by the session factor, rounding to whole units
pub fn scaled(amount: u64, factor: f64) -> u64 {
    (amount as f64 * factor).round().max(0.0) as u64
}

/// Round an amount to the nearest multiple of `increment`
pub fn round_to_increment(amount: f64, increment: u64) -> u64 {
    if increment <= 1 {
        return amount.round().max(0.0) as u64;
    }
    let inc = increment as f64;
    ((amount / inc).round() * inc).max(0.0) as u64
}
