//! Categorization prompt
//!
//! The template uses `{{var}}` placeholders. The label list is generated
//! from [`CategoryLabel::ALL`] so the prompt and the closed label set
//! cannot drift apart.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::CategoryLabel;

/// User prompt sent once per cache miss
pub const CATEGORIZE_TEMPLATE: &str = "Categorize the following financial transaction:
Description: {{description}}
Amount: {{amount}}

Return only the category name in Portuguese, from these options:
{{labels}}

Be precise and consider common Brazilian spending patterns.";

/// Replace `{{key}}` placeholders with their values
///
/// Single pass over the template: inserted values are never scanned again,
/// so a value that itself contains `{{...}}` is kept verbatim. Unknown
/// placeholders are left as they are.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => result.push_str(value),
                    None => {
                        result.push_str("{{");
                        result.push_str(key);
                        result.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// Bullet list of the allowed labels, e.g. "- Alimentação (food)"
fn label_list() -> String {
    CategoryLabel::ALL
        .iter()
        .map(|label| format!("- {} ({})", label.as_str(), label.gloss()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the categorization prompt for one transaction
pub fn categorize_prompt(description: &str, amount: Option<Decimal>) -> String {
    let mut vars = HashMap::new();
    vars.insert("description", description.to_string());
    vars.insert(
        "amount",
        amount
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    );
    vars.insert("labels", label_list());
    render(CATEGORIZE_TEMPLATE, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_description_and_amount() {
        let prompt = categorize_prompt("IFOOD *PEDIDO", Some(Decimal::new(-5000, 2)));
        assert!(prompt.contains("Description: IFOOD *PEDIDO"));
        assert!(prompt.contains("Amount: -50.00"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_prompt_lists_every_label() {
        let prompt = categorize_prompt("x", None);
        for label in CategoryLabel::ALL {
            assert!(prompt.contains(&format!("- {} ({})", label.as_str(), label.gloss())));
        }
        assert!(prompt.contains("Amount: unknown"));
    }

    #[test]
    fn test_description_placeholders_are_kept_verbatim() {
        let expected = categorize_prompt("PIX {{amount}} {{labels}}", Some(Decimal::new(-5000, 2)));
        assert!(expected.contains("Description: PIX {{amount}} {{labels}}\n"));
        assert!(expected.contains("Amount: -50.00"));

        for _ in 0..50 {
            let prompt =
                categorize_prompt("PIX {{amount}} {{labels}}", Some(Decimal::new(-5000, 2)));
            assert_eq!(prompt, expected);
        }
    }

    #[test]
    fn test_render_unterminated_placeholder() {
        let mut vars = HashMap::new();
        vars.insert("a", "1".to_string());
        assert_eq!(render("{{a}} {{a", &vars), "1 {{a");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("a", "1".to_string());
        assert_eq!(render("{{a}} {{b}}", &vars), "1 {{b}}");
    }
}
