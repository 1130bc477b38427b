//! Demo tools looking up facts about countries.

mod capital;
mod language;

use schemars::JsonSchema;
use serde::Deserialize;

pub use capital::CapitalTool;
pub use language::LanguageTool;

/// Input of the country tools.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CountryParameters {
    #[schemars(description = "Name of the country, in English.")]
    country: String,
}

impl CountryParameters {
    /// Creates parameters for `country`.
    #[inline]
    pub fn new<S: Into<String>>(country: S) -> Self {
        Self {
            country: country.into(),
        }
    }
}

/// Looks `country` up in a `(country, value)` table, ignoring case and
/// surrounding whitespace.
fn lookup(table: &[(&str, &'static str)], country: &str) -> &'static str {
    let country = country.trim();
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(country))
        .map_or("Unknown", |&(_, value)| value)
}
