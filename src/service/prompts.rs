//! Prompt construction for explanation generation

use crate::model::AlertEvent;

pub const EXPLANATION_SYSTEM_PROMPT: &str = "\
You are a security analyst assistant. Given one runtime security alert, \
explain it for an on-call responder. Structure your answer as three \
sections with these exact headers: 'Security Impact:', 'Next Steps:', \
'Remediation Steps:'. Put each concrete command to run on its own line \
prefixed with 'Command:'. Be specific and concise; do not invent details \
that are not in the alert.";

/// Render the alert into the user prompt.
pub fn build_explanation_prompt(event: &AlertEvent) -> String {
    let mut prompt = format!(
        "Rule: {}\nPriority: {}\nAlert: {}\nSource: {}\n",
        event.rule, event.priority_raw, event.output, event.source
    );

    if !event.fields.is_empty() {
        prompt.push_str("Fields:\n");
        for (key, value) in &event.fields {
            prompt.push_str(&format!("  {}: {}\n", key, value));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn prompt_carries_rule_output_and_fields() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "proc.name".to_string(),
            serde_json::Value::String("bash".to_string()),
        );

        let event = AlertEvent {
            rule: "Terminal shell in container".to_string(),
            priority_raw: "warning".to_string(),
            priority: Some(crate::model::AlertPriority::Warning),
            output: "A shell was spawned".to_string(),
            occurred_at: None,
            source: "syscall".to_string(),
            fields,
        };

        let prompt = build_explanation_prompt(&event);
        assert!(prompt.contains("Terminal shell in container"));
        assert!(prompt.contains("A shell was spawned"));
        assert!(prompt.contains("proc.name"));
    }
}
