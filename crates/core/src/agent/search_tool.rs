use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use tulip_model::ModelTool;

pub(super) const NAME: &str = "search_tools";

/// Arguments of the `search_tools` function.
#[derive(Debug, Deserialize, JsonSchema)]
pub(super) struct SearchToolsParameters {
    /// A list of textual description for the actions you want to execute.
    pub action_descriptions: Vec<String>,
}

/// The function the model calls to search the tool library.
pub(super) fn definition() -> ModelTool {
    ModelTool {
        name: NAME.to_owned(),
        description: "Search for tools in your tool library.".to_owned(),
        parameters: schema_for!(SearchToolsParameters).to_value(),
    }
}
