//! Error types for haggle

use thiserror::Error;

/// Main error type for haggle
#[derive(Error, Debug)]
pub enum HaggleError {
    // Input errors
    #[error("Invalid offer: {0}")]
    InvalidOffer(String),

    #[error("Offer {offered} is below your previous offer of {previous}")]
    RegressiveOffer { previous: u64, offered: u64 },

    // Negotiation errors
    #[error("Invalid negotiation state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Negotiation already finished: {0}")]
    SessionFinished(String),

    // Catalog errors
    #[error("Catalog fetch failed: {0}")]
    CatalogFetch(String),

    #[error("Catalog parse error: {0}")]
    CatalogParse(String),

    #[error("Catalog item not found: {0}")]
    ItemNotFound(String),

    // Event sink errors
    #[error("Event sink delivery failed: {0}")]
    SinkDelivery(String),

    // Configuration errors
    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HaggleError {
    /// Whether the participant can fix this by entering something else
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            HaggleError::InvalidOffer(_) | HaggleError::RegressiveOffer { .. }
        )
    }
}

/// Result type alias for haggle operations
pub type Result<T> = std::result::Result<T, HaggleError>;
