//! Tools bound to the built-in agent graph.
//!
//! `get_weather` answers from a fixed table and `calculate` evaluates
//! arithmetic with [`calculator::evaluate`](super::calculator::evaluate).
//! Each tool is constructed via [`AgentTool::new`] and returned as
//! `Arc<dyn Tool>`.

use std::sync::Arc;

use crate::tools::calculator::{evaluate, format_number};
use crate::tools::tool::{required_str, AgentTool, Tool};
use crate::tools::types::AgentToolParameters;

const WEATHER_TABLE: &[(&str, &str)] = &[
    ("new york", "72°F, sunny"),
    ("london", "15°C, cloudy"),
    ("tokyo", "25°C, partly cloudy"),
    ("paris", "18°C, rainy"),
];

/// Look up canned weather for `city` (case-insensitive).
pub fn lookup_weather(city: &str) -> String {
    let key = city.to_lowercase();
    WEATHER_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, report)| (*report).to_string())
        .unwrap_or_else(|| format!("Weather data not available for {city}"))
}

/// Evaluate `expression`, reporting failures as text for the model.
pub fn calculate(expression: &str) -> String {
    match evaluate(expression) {
        Ok(value) => format_number(value),
        Err(err) => format!("Error evaluating expression: {err}"),
    }
}

/// Create the `get_weather` tool.
pub fn weather_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_weather",
        "Get the current weather for a city.",
        AgentToolParameters::object()
            .string("city", "Name of the city", true)
            .build(),
        |args| async move {
            let city = required_str("get_weather", &args, "city")?;
            Ok(lookup_weather(city))
        },
    ))
}

/// Create the `calculate` tool.
pub fn calculator_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "calculate",
        "Evaluate a math expression. E.g. '2 + 2' or '100 / 3'.",
        AgentToolParameters::object()
            .string("expression", "Arithmetic expression to evaluate", true)
            .build(),
        |args| async move {
            let expression = required_str("calculate", &args, "expression")?;
            Ok(calculate(expression))
        },
    ))
}

/// All tools the agent graph binds, in declaration order.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![weather_tool(), calculator_tool()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weather_lookup_ignores_case() {
        assert_eq!(lookup_weather("London"), "15°C, cloudy");
        assert_eq!(lookup_weather("Atlantis"), "Weather data not available for Atlantis");
    }

    #[test]
    fn calculate_reports_errors_as_text() {
        assert_eq!(calculate("2 + 2"), "4");
        assert_eq!(
            calculate("1 / 0"),
            "Error evaluating expression: division by zero"
        );
    }

    #[tokio::test]
    async fn tools_are_exposed_in_order() {
        let tools = all_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["get_weather", "calculate"]);

        let out = tools[1].execute(&json!({"expression": "6 * 7"})).await.unwrap();
        assert_eq!(out, "42");
    }

    #[tokio::test]
    async fn missing_argument_is_a_tool_error() {
        let err = weather_tool().execute(&json!({})).await.unwrap_err();
        assert!(err.to_string().contains("city"));
    }
}
