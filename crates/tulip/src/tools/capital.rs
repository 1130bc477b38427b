use std::future::ready;

use schemars::schema_for;
use serde_json::Value;
use tulip_core::tool::{Tool, ToolResult};

use super::{CountryParameters, lookup};

const CAPITALS: &[(&str, &str)] = &[
    ("France", "Paris"),
    ("Germany", "Berlin"),
    ("Italy", "Rome"),
    ("Japan", "Tokyo"),
];

/// A tool returning the capital of a country.
pub struct CapitalTool {
    parameter_schema: Value,
}

impl CapitalTool {
    /// Creates a new capital tool.
    #[inline]
    pub fn new() -> Self {
        CapitalTool {
            parameter_schema: schema_for!(CountryParameters).to_value(),
        }
    }
}

impl Default for CapitalTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CapitalTool {
    type Input = CountryParameters;

    fn name(&self) -> &str {
        "capital"
    }

    fn description(&self) -> &str {
        "Returns the capital of a country"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: CountryParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(ToolResult::Ok(lookup(CAPITALS, &input.country).to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_and_unknown_countries() {
        let tool = CapitalTool::new();

        let result = tool.execute(CountryParameters::new("France")).await;
        assert_eq!(result.unwrap(), "Paris");

        let result = tool.execute(CountryParameters::new(" japan ")).await;
        assert_eq!(result.unwrap(), "Tokyo");

        let result = tool.execute(CountryParameters::new("Atlantis")).await;
        assert_eq!(result.unwrap(), "Unknown");
    }

    #[test]
    fn test_schema() {
        let tool = CapitalTool::new();
        let schema = tool.parameter_schema();
        assert_eq!(schema["properties"]["country"]["type"], "string");
        assert_eq!(schema["required"][0], "country");
    }
}
