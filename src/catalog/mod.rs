//! Item catalog: the opening price and floor for each negotiable item
//!
//! Catalogs are small CSV tables, usually a published spreadsheet. The header
//! row names the columns, so column order does not matter. Both the German
//! headers of the survey spreadsheet (`ID`, `Startpreis`, `Schmerzgrenze`,
//! `Fahrzeug`) and English ones (`id`, `initial_offer`, `min_price`, `label`)
//! are recognised.

pub mod source;

pub use source::{export_url, CatalogSource};

use serde::{Deserialize, Serialize};

use crate::error::{HaggleError, Result};

/// One negotiable item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub label: String,
    pub initial_offer: u64,
    pub min_price: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

/// One CSV row under canonical column names
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogRow {
    id: String,
    initial_offer: String,
    min_price: String,
    label: String,
}

/// Map a recognised header onto its canonical column name
fn canonical_header(header: &str) -> String {
    let header = header.trim().to_lowercase();
    match header.as_str() {
        "startpreis" | "initial" => "initial_offer".to_string(),
        "schmerzgrenze" | "floor" => "min_price".to_string(),
        "fahrzeug" | "name" => "label".to_string(),
        _ => header,
    }
}

fn csv_error(e: csv::Error) -> HaggleError {
    HaggleError::CatalogParse(e.to_string())
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// Small catalog used when no source is configured
    pub fn builtin() -> Self {
        let item = |id: &str, label: &str, initial_offer, min_price| CatalogItem {
            id: id.to_string(),
            label: label.to_string(),
            initial_offer,
            min_price,
        };
        Self::new(vec![
            item("1", "Compact hatchback", 5500, 4000),
            item("2", "Station wagon", 7200, 5300),
            item("3", "City scooter", 2400, 1750),
            item("4", "Camper van", 11800, 8600),
        ])
    }

    /// Parse a header-driven CSV table
    pub fn parse_csv(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let raw_headers = reader.headers().map_err(csv_error)?;
        if raw_headers.iter().all(|h| h.is_empty()) {
            return Err(HaggleError::CatalogParse("empty catalog".to_string()));
        }
        let headers: csv::StringRecord = raw_headers.iter().map(canonical_header).collect();

        for required in ["id", "initial_offer", "min_price"] {
            if !headers.iter().any(|h| h == required) {
                return Err(HaggleError::CatalogParse(format!(
                    "header {:?} lacks an id, opening price or floor column",
                    raw_headers.iter().collect::<Vec<_>>().join(",")
                )));
            }
        }

        let mut items = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let row = record.position().map_or(0, |p| p.line());
            let raw: CatalogRow = record.deserialize(Some(&headers)).map_err(csv_error)?;

            if raw.id.is_empty() {
                continue;
            }
            let initial_offer = parse_amount(&raw.initial_offer, row)?;
            let min_price = parse_amount(&raw.min_price, row)?;
            if min_price > initial_offer {
                return Err(HaggleError::CatalogParse(format!(
                    "row {}: floor {} is above opening price {}",
                    row, min_price, initial_offer
                )));
            }

            let label = if raw.label.is_empty() {
                raw.id.clone()
            } else {
                raw.label
            };
            items.push(CatalogItem {
                id: raw.id,
                label,
                initial_offer,
                min_price,
            });
        }

        tracing::debug!(items = items.len(), "parsed catalog");
        Ok(Self::new(items))
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, id: &str) -> Result<&CatalogItem> {
        let id = id.trim();
        self.items
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| HaggleError::ItemNotFound(id.to_string()))
    }
}

fn parse_amount(raw: &str, row: u64) -> Result<u64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect();
    let value: f64 = cleaned
        .parse()
        .map_err(|_| HaggleError::CatalogParse(format!("row {}: {:?} is not an amount", row, raw)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(HaggleError::CatalogParse(format!(
            "row {}: {:?} is not an amount",
            row, raw
        )));
    }
    Ok(value.round() as u64)
}
