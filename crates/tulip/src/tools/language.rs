use std::future::ready;

use schemars::schema_for;
use serde_json::Value;
use tulip_core::tool::{Tool, ToolResult};

use super::{CountryParameters, lookup};

const LANGUAGES: &[(&str, &str)] = &[
    ("France", "French"),
    ("Germany", "German"),
    ("Italy", "Italian"),
    ("Japan", "Japanese"),
];

/// A tool returning the language spoken in a country.
pub struct LanguageTool {
    parameter_schema: Value,
}

impl LanguageTool {
    /// Creates a new language tool.
    #[inline]
    pub fn new() -> Self {
        LanguageTool {
            parameter_schema: schema_for!(CountryParameters).to_value(),
        }
    }
}

impl Default for LanguageTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for LanguageTool {
    type Input = CountryParameters;

    fn name(&self) -> &str {
        "language"
    }

    fn description(&self) -> &str {
        "Returns the language spoken in a country"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: CountryParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(ToolResult::Ok(lookup(LANGUAGES, &input.country).to_owned()))
    }
}
