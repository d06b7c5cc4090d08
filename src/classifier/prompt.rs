use crate::transform::transform_model::Context;

pub const DEFAULT_INSTRUCTION: &str = "Transform this component";

/// Instruction precedence: context, then configured override, then default.
pub fn effective_instruction<'a>(context: &'a Context, configured: Option<&'a str>) -> &'a str {
    let present = |s: &&str| !s.trim().is_empty();
    context
        .instruction
        .as_deref()
        .filter(present)
        .or_else(|| configured.filter(present))
        .unwrap_or(DEFAULT_INSTRUCTION)
}

/// Build the single prompt sent to the text-generation endpoint.
pub fn build_prompt(instruction: &str, content: &str, context: &Context) -> String {
    let context_lines = context
        .fields()
        .iter()
        .map(|(label, value)| format!("- {}: {}", label, value.unwrap_or("none")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r##"You are a UI transformer. Transform the following components based on this instruction: "{instruction}"

COMPONENTS:
{content}

CAMPAIGN CONTEXT:
{context}

Return ONLY a JSON object in this exact format:
{{
  "elements": {{
    "element-id-or-class": {{
      "text": "new text content if needed",
      "href": "new link target if needed",
      "style": {{
        "backgroundColor": "color value",
        "color": "text color",
        "hover": {{
          "backgroundColor": "hover color",
          "color": "hover text color"
        }}
      }}
    }}
  }}
}}

RULES:
1. Use the exact id or className from the components above as keys
2. Only include elements that have an id or className and need to change
3. Put hover effects in a "hover" object inside "style"
4. Any valid CSS property may appear in "style"
5. Keep the original structure; only modify the listed elements
6. Respond with only the JSON object, no explanation or text outside it"##,
        instruction = instruction,
        content = if content.trim().is_empty() { "(empty)" } else { content },
        context = context_lines,
    )
}
