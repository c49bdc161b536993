//! LLM tool surface: JSON-schema definitions and handlers for the
//! preference and flight tools exposed to a tool-calling loop.
//!
//! Handlers take loosely-typed JSON arguments, validate them, and return
//! JSON results. Upstream search failures are reported as `{"error": ..}`
//! results rather than tool errors so the model can relay them.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::engine::{FlightSearch, PreferenceEngine};
use crate::flights::{SearchRequest, TravelClass};
use crate::preferences::{PreferenceCategory, PreferenceError, UiPreferences};

/// Errors from tool dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool with the given name.
    #[error("unknown tool: {0}")]
    NotFound(String),

    /// Arguments were missing or malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran but failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<PreferenceError> for ToolError {
    fn from(err: PreferenceError) -> Self {
        match err {
            PreferenceError::EmptyText | PreferenceError::TooLarge { .. } => {
                Self::InvalidArguments(err.to_string())
            }
            other => Self::ExecutionFailed(other.to_string()),
        }
    }
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name, matched by [`dispatch`].
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub input_schema: Value,
}

/// Definitions of every tool [`dispatch`] understands.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let categories: Vec<&str> = PreferenceCategory::ALL.iter().map(|c| c.as_str()).collect();
    vec![
        ToolDefinition {
            name: "search_flights".to_owned(),
            description: "Search for available flights between two airports. Stored travel \
                          preferences are applied automatically."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "origin": {"type": "string", "description": "Origin airport IATA code (e.g. 'JFK')"},
                    "destination": {"type": "string", "description": "Destination airport IATA code (e.g. 'CDG')"},
                    "departure_date": {"type": "string", "description": "Departure date, YYYY-MM-DD"},
                    "return_date": {"type": "string", "description": "Return date, YYYY-MM-DD, for round trips"},
                    "adults": {"type": "integer", "description": "Number of adult passengers"},
                    "travel_class": {
                        "type": "string",
                        "enum": ["ECONOMY", "PREMIUM_ECONOMY", "BUSINESS", "FIRST"],
                        "description": "Cabin class"
                    },
                    "non_stop": {"type": "boolean", "description": "Only direct flights"}
                },
                "required": ["origin", "destination", "departure_date"]
            }),
        },
        ToolDefinition {
            name: "remember_preference".to_owned(),
            description: "Store a travel preference the user stated explicitly \
                          (e.g. 'prefers window seats', 'avoids red-eye flights')."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "preference": {"type": "string", "description": "The preference to remember"}
                },
                "required": ["preference"]
            }),
        },
        ToolDefinition {
            name: "list_preferences".to_owned(),
            description: "List the user's stored travel preferences.".to_owned(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "forget_preference".to_owned(),
            description: "Forget a stored travel preference by its text, or every \
                          preference in a category."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "preference": {"type": "string", "description": "Preference text to forget"},
                    "category": {
                        "type": "string",
                        "enum": categories,
                        "description": "Forget every preference in this category"
                    }
                }
            }),
        },
    ]
}

/// Everything a tool call needs for one request.
pub struct ToolContext<'a> {
    /// The preference engine.
    pub engine: &'a PreferenceEngine,
    /// Flight-search collaborator.
    pub searcher: &'a dyn FlightSearch,
    /// Calling user.
    pub user_id: &'a str,
    /// UI selections for this request.
    pub ui: &'a UiPreferences,
}

/// Run the named tool.
///
/// # Errors
///
/// Returns [`ToolError::NotFound`] for unknown names,
/// [`ToolError::InvalidArguments`] for bad input, or
/// [`ToolError::ExecutionFailed`] if the store fails.
#[instrument(skip(ctx, args), fields(user_id = ctx.user_id))]
pub async fn dispatch(ctx: &ToolContext<'_>, name: &str, args: &Value) -> Result<Value, ToolError> {
    match name {
        "remember_preference" => remember_preference(ctx, args).await,
        "search_flights" => search_flights(ctx, args).await,
        "list_preferences" => list_preferences(ctx).await,
        "forget_preference" => forget_preference(ctx, args).await,
        other => Err(ToolError::NotFound(other.to_owned())),
    }
}

async fn remember_preference(ctx: &ToolContext<'_>, args: &Value) -> Result<Value, ToolError> {
    let preference = required_str(args, "preference")?;
    let record = ctx.engine.remember(ctx.user_id, preference).await?;
    info!(category = %record.category, "preference remembered via tool");
    Ok(json!({
        "stored": true,
        "category": record.category,
        "preference": record.canonical_text,
        "confirmation": format!("I'll remember: {}", record.canonical_text),
    }))
}

async fn search_flights(ctx: &ToolContext<'_>, args: &Value) -> Result<Value, ToolError> {
    let request = parse_search_request(args)?;
    let outcome = ctx
        .engine
        .search_flights(ctx.user_id, &request, ctx.ui, ctx.searcher)
        .await?;

    if let Some(error) = outcome.error {
        return Ok(json!({"error": error, "flights": []}));
    }
    Ok(json!({
        "flights": outcome.offers,
        "count": outcome.offers.len(),
    }))
}

async fn list_preferences(ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
    let records = ctx.engine.preferences(ctx.user_id).await?;
    let preferences: Vec<Value> = records
        .iter()
        .map(|r| json!({"id": r.id, "category": r.category, "preference": r.canonical_text}))
        .collect();
    Ok(json!({"count": preferences.len(), "preferences": preferences}))
}

async fn forget_preference(ctx: &ToolContext<'_>, args: &Value) -> Result<Value, ToolError> {
    if let Some(category) = optional_str(args, "category") {
        let category = PreferenceCategory::parse(category)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let removed = ctx.engine.forget_category(ctx.user_id, category).await?;
        return Ok(json!({"removed": removed}));
    }
    let preference = required_str(args, "preference")?;
    let removed = ctx.engine.forget(ctx.user_id, preference).await?;
    Ok(json!({"removed": removed}))
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// Build a [`SearchRequest`] from tool arguments.
///
/// Airport codes are upper-cased. `non_stop` accepts booleans and the
/// strings "true", "yes", "1" (anything else is false).
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when a required field is
/// missing or a value has the wrong shape.
pub fn parse_search_request(args: &Value) -> Result<SearchRequest, ToolError> {
    let origin = required_str(args, "origin")?.trim().to_uppercase();
    let destination = required_str(args, "destination")?.trim().to_uppercase();
    let departure_date = required_str(args, "departure_date")?.trim().to_owned();

    let return_date = optional_str(args, "return_date").map(|s| s.trim().to_owned());

    let adults = match args.get("adults") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let n = v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ToolError::InvalidArguments("'adults' must be a positive integer".to_owned())
                })?;
            Some(n)
        }
    };

    let travel_class = optional_str(args, "travel_class")
        .map(TravelClass::parse)
        .transpose()
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    let non_stop = match args.get("non_stop") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => Some(matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "1"
        )),
        Some(_) => {
            return Err(ToolError::InvalidArguments(
                "'non_stop' must be a boolean".to_owned(),
            ))
        }
    };

    Ok(SearchRequest {
        origin,
        destination,
        departure_date,
        return_date,
        adults,
        travel_class,
        non_stop,
    })
}

fn required_str<'v>(args: &'v Value, key: &str) -> Result<&'v str, ToolError> {
    optional_str(args, key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}' argument")))
}

fn optional_str<'v>(args: &'v Value, key: &str) -> Option<&'v str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
