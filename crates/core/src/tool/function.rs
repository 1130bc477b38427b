use std::fmt::{self, Debug};
use std::marker::PhantomData;

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Tool, ToolResult};

/// A [`Tool`] backed by an async function.
///
/// The parameter schema is derived from `I` with `schemars`, so the input
/// type documents its own fields:
///
/// ```
/// use schemars::JsonSchema;
/// use serde::Deserialize;
/// use tulip_core::tool::{FunctionTool, ToolResult};
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Country {
///     /// Name of the country.
///     country: String,
/// }
///
/// async fn capital(input: Country) -> ToolResult {
///     Ok(format!("capital of {}", input.country))
/// }
///
/// let description = "Returns the capital of a country";
/// let tool = FunctionTool::new("capital", description, capital);
/// # let _ = tool;
/// ```
pub struct FunctionTool<I, F> {
    name: String,
    description: String,
    parameter_schema: Value,
    func: F,
    _input: PhantomData<fn(I)>,
}

impl<I: JsonSchema, F> FunctionTool<I, F> {
    /// Creates a tool named `name` that runs `func`.
    pub fn new<Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = ToolResult>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: schema_for!(I).to_value(),
            func,
            _input: PhantomData,
        }
    }
}

impl<I, F, Fut> Tool for FunctionTool<I, F>
where
    I: DeserializeOwned + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    type Input = I;

    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[inline]
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        (self.func)(input)
    }
}

impl<I, F> Debug for FunctionTool<I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::tool::{ErrorKind, ToolObject, ToolObjectImpl};

    #[derive(Deserialize, JsonSchema)]
    struct Country {
        /// Name of the country.
        country: String,
    }

    async fn capital(input: Country) -> ToolResult {
        match input.country.as_str() {
            "France" => Ok("Paris".to_owned()),
            _ => Ok("Unknown".to_owned()),
        }
    }

    fn capital_tool() -> impl Tool<Input = Country> {
        let description = "Returns the capital of a country";
        FunctionTool::new("capital", description, capital)
    }

    #[test]
    fn test_input_type_is_inferred_from_function() {
        let tool = FunctionTool::new("capital", "Capital lookup", capital);
        assert!(format!("{tool:?}").contains("\"capital\""));
        assert_eq!(tool.parameter_schema["required"], json!(["country"]));
    }

    #[test]
    fn test_schema_is_derived_from_input() {
        let tool = capital_tool();
        let schema = tool.parameter_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["country"]["type"], "string");
        assert_eq!(schema["required"], json!(["country"]));
    }

    #[tokio::test]
    async fn test_execute_through_object() {
        let object = ToolObjectImpl(capital_tool());
        let output = object.execute(json!({ "country": "France" })).await;
        assert_eq!(output.unwrap(), "Paris");

        let err = object.execute(json!({ "city": "Paris" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let definition = object.definition();
        assert_eq!(definition.name, "capital");
        assert_eq!(definition.description, "Returns the capital of a country");
    }
}
