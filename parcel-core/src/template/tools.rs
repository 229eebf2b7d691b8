//! Default formatter for tool declarations, appended to the system text of
//! the first turn.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ParcelError, Result};

#[derive(Deserialize)]
struct Tool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Parameters,
}

#[derive(Default, Deserialize)]
struct Parameters {
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    required: Vec<String>,
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn str_field<'a>(param: &'a Value, key: &str) -> &'a str {
    param.get(key).and_then(Value::as_str).unwrap_or("")
}

fn param_line(name: &str, param: &Value, required: bool) -> String {
    let required = if required { ", required" } else { "" };
    let choices = match param.get("enum").and_then(Value::as_array) {
        Some(values) if !values.is_empty() => {
            let values: Vec<String> = values.iter().map(text).collect();
            format!(", should be one of [{}]", values.join(", "))
        }
        _ => String::new(),
    };
    let items = match param.get("items") {
        Some(items) if !items.is_null() => {
            format!(", where each item should be {}", str_field(items, "type"))
        }
        _ => String::new(),
    };
    format!(
        "  - {name} ({}{required}): {}{choices}{items}\n",
        str_field(param, "type"),
        str_field(param, "description"),
    )
}

/// Render a JSON list of tool declarations as instructions for the model.
/// An empty list renders as nothing.
pub fn format_tools(tools: &str) -> Result<String> {
    let tools: Vec<Tool> = serde_json::from_str(tools)
        .map_err(|e| ParcelError::Format(format!("invalid tool list: {e}")))?;
    if tools.is_empty() {
        return Ok(String::new());
    }

    let mut tool_text = String::new();
    let mut tool_names = Vec::with_capacity(tools.len());
    for tool in &tools {
        let mut args = String::new();
        for (name, param) in &tool.parameters.properties {
            args.push_str(&param_line(name, param, tool.parameters.required.contains(name)));
        }
        tool_text.push_str(&format!(
            "> Tool Name: {}\nTool Description: {}\nTool Args:\n{args}\n",
            tool.name, tool.description
        ));
        tool_names.push(tool.name.as_str());
    }

    Ok(format!(
        "You have access to the following tools:\n{tool_text}\
         Use the following format if using a tool:\n```\n\
         Action: tool name (one of [{}]).\n\
         Action Input: the input to the tool, in a JSON format representing the kwargs \
         (e.g. ```{{\"input\": \"hello world\", \"num_beams\": 5}}```).\n```\n",
        tool_names.join(", ")
    ))
}
