//! Instruction text sent to the extraction model.
//!
//! The system message is always the prompt's own instructions followed by a
//! restatement of the target schema. Keeping the composition here means the
//! invoker in [`crate::pipeline::llm`] never touches wording.

use crate::schema::JsonSchema;

/// Instructions offered when a new prompt is created without any.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a meticulous data extraction assistant. You receive one or more page images of a single document.

Follow these rules precisely:

1. Extract only information that is visible in the images.
2. Use the exact field names of the schema; do not invent new fields.
3. Copy numbers without currency symbols or thousands separators.
4. Write dates as YYYY-MM-DD when the schema asks for a date.
5. When a value is not present, omit the field rather than guessing.
6. Respond with a single JSON object and nothing else."#;

/// The schema restatement appended to the system prompt.
pub fn schema_instruction(schema: &JsonSchema) -> String {
    format!(
        "\n\nYou must respond with valid JSON matching this schema:\n{}",
        schema.to_pretty_string()
    )
}

/// Full system message: instructions, then the schema contract.
pub fn compose_system_message(system_prompt: &str, schema: &JsonSchema) -> String {
    let mut message = String::with_capacity(system_prompt.len() + 256);
    message.push_str(system_prompt);
    message.push_str(&schema_instruction(schema));
    message
}
