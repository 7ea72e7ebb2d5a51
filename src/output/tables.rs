use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};
use serde_json::Value;

use crate::mcp::protocol::Tool;

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Argument names from a tool's input schema, optional ones marked with `?`.
fn argument_list(schema: &Value) -> String {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema["properties"]
        .as_object()
        .map(|properties| {
            properties
                .keys()
                .map(|name| {
                    if required.contains(&name.as_str()) {
                        name.clone()
                    } else {
                        format!("{name}?")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

pub fn tool_catalog_table(tools: &[Tool]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Tool", "Arguments", "Description"]);
    for tool in tools {
        table.add_row(vec![
            Cell::new(&tool.name).fg(TableColor::Cyan),
            Cell::new(argument_list(&tool.input_schema)),
            Cell::new(tool.description.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn print_tool_catalog(tools: &[Tool]) {
    println!("{}", tool_catalog_table(tools));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_argument_list_marks_optional() {
        let schema = json!({
            "type": "object",
            "properties": {"repo": {}, "limit": {}},
            "required": ["repo"]
        });
        let args = argument_list(&schema);
        assert!(args.contains("repo"));
        assert!(args.contains("limit?"));
        assert!(!args.contains("repo?"));
    }

    #[test]
    fn test_table_has_a_row_per_tool() {
        let tools = crate::mcp::tool_catalog();
        let mut table = tool_catalog_table(&tools);
        table.set_width(240);
        let rendered = table.to_string();
        for tool in &tools {
            assert!(rendered.contains(&tool.name), "{}", tool.name);
        }
    }
}
