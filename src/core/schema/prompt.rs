//! Field-schema prompt builder
//!
//! Turns free text plus a caller-supplied field list into a prompt that asks
//! for a JSON object bounded to exactly those fields. Templates carry two
//! recognized placeholder tokens; a custom template with neither is treated
//! as a fully custom instruction and gets no scaffolding at all.

/// Placeholder replaced with the caller's input text
pub const TEXT_TOKEN: &str = "{{text}}";
/// Placeholder replaced with the generated JSON field schema
pub const SCHEMA_TOKEN: &str = "{{schema}}";
/// Placeholder replaced with the literal allowed-field list
pub const FIELDS_TOKEN: &str = "{{fields}}";

/// Built-in template used when the caller supplies none
const DEFAULT_TEMPLATE: &str = "\
Analyze the following text and fill in the fields described below.

Text:
{{text}}

Fill this JSON schema, where each value describes what the field should contain:
{{schema}}

Allowed fields: {{fields}}";

/// Build the full prompt for one parsing request.
///
/// A `custom_template` containing neither [`TEXT_TOKEN`] nor [`SCHEMA_TOKEN`]
/// is fully custom: the input text is appended verbatim after a separator and
/// no schema or constraint scaffolding is added.
pub fn build_integrated_prompt(
    text: &str,
    field_names: &[String],
    custom_template: Option<&str>,
) -> String {
    if let Some(template) = custom_template {
        if !template.contains(TEXT_TOKEN) && !template.contains(SCHEMA_TOKEN) {
            return format!("{}\n\n---\n\n{}", template.trim_end(), text);
        }
    }

    let template = custom_template.unwrap_or(DEFAULT_TEMPLATE);
    let prompt = template
        .replace(TEXT_TOKEN, text)
        .replace(SCHEMA_TOKEN, &build_field_schema(field_names))
        .replace(FIELDS_TOKEN, &field_list(field_names));

    format!("{}\n\n{}", prompt, constraint_block(field_names))
}

/// JSON object mapping each field name to a hint describing its content
fn build_field_schema(field_names: &[String]) -> String {
    let mut schema = String::from("{\n");
    for (index, name) in field_names.iter().enumerate() {
        schema.push_str(&format!("  \"{}\": \"{}\"", name, field_hint(name)));
        if index + 1 < field_names.len() {
            schema.push(',');
        }
        schema.push('\n');
    }
    schema.push('}');
    schema
}

/// Heuristic content hint keyed off the field name
fn field_hint(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.contains("meaning") || lower.contains("definition") {
        "the meaning or definition of the text".to_string()
    } else if lower.contains("reading") || lower.contains("pronunciation") {
        "the reading or pronunciation of the text".to_string()
    } else if lower.contains("example") || lower.contains("sentence") {
        "an example sentence using the text".to_string()
    } else if lower.contains("translation") {
        "a translation of the text".to_string()
    } else if lower.contains("note") || lower.contains("comment") {
        "supplementary notes about the text".to_string()
    } else {
        format!("content for the \"{}\" field", name)
    }
}

fn field_list(field_names: &[String]) -> String {
    field_names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trailing constraint naming exactly the allowed fields. Partial output is
/// permitted; unknown keys are not.
fn constraint_block(field_names: &[String]) -> String {
    format!(
        "Respond with a valid JSON object and nothing else. \
Use only these keys: {}. \
Omit any key you cannot fill, but fill at least one. \
Do not wrap the JSON in a Markdown code block.",
        field_list(field_names)
    )
}
