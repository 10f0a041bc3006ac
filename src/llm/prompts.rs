// Prompts for the two classification phases

use crate::schema::{FinCategory, KnownItem, UnknownItem};

pub const SYSTEM_PROMPT_CLASSIFIER: &str = r#"
You are a financial statement analyst. You receive line item labels exactly as
they were read from a company's statements and sort them into a fixed
vocabulary. You answer with JSON only: no prose, no code fences.
"#;

const COARSE_INSTRUCTIONS: &str = r#"
## TASK
Decide for every line item below which of the allowed categories it belongs to.

## RULES
- Use the meaning of the label first, then the sign of the amount hint if one
  is given, then the neighbouring items.
- Use only the allowed category names, written exactly as listed.
- Classify as many items as you can. If an item truly fits none of the
  allowed categories, answer null for it.
- Every item name must appear once as a key, spelled exactly as given.

## OUTPUT
A single JSON object: item name to category name or null.
"#;

const MAPPING_INSTRUCTIONS: &str = r#"
## TASK
Map every unknown line item to the one known field that means the same thing.

## RULES
- Compare the unknown label (and its amount hint, if any) with each known
  field's name and description.
- Answer with the known field name exactly as listed, never a new name.
- Each unknown item maps to at most one known field. Several unknown items
  may map to the same known field.
- If no known field fits, answer null. Before settling on null, look again at
  the descriptions: broad fields such as "other" or "miscellaneous" often fit.
- Every unknown item must appear once as a key, spelled exactly as given.

## OUTPUT
A single JSON object: unknown item name to known field name or null.
"#;

fn render_items(items: &[UnknownItem]) -> String {
    items
        .iter()
        .map(|item| match &item.hint {
            Some(hint) => format!("- {} (amount: {})\n", item.name, hint),
            None => format!("- {}\n", item.name),
        })
        .collect()
}

pub fn coarse_type_prompt(items: &[UnknownItem], categories: &[FinCategory]) -> String {
    let allowed = categories
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\n## ALLOWED CATEGORIES\n{}\n\n## LINE ITEMS\n{}",
        COARSE_INSTRUCTIONS,
        allowed,
        render_items(items)
    )
}

pub fn name_mapping_prompt(unknown: &[UnknownItem], known: &[KnownItem]) -> String {
    let candidates: String = known
        .iter()
        .map(|item| format!("- {}: {}\n", item.name, item.description))
        .collect();

    format!(
        "{}\n## KNOWN FIELDS\n{}\n## UNKNOWN LINE ITEMS\n{}",
        MAPPING_INSTRUCTIONS,
        candidates,
        render_items(unknown)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_list_every_item() {
        let items = vec![
            UnknownItem::new("sales").with_hint("148300"),
            UnknownItem::new("office supplies"),
        ];
        let coarse = coarse_type_prompt(&items, &[FinCategory::Earning, FinCategory::Expense]);
        assert!(coarse.contains("\"earning\", \"expense\""));
        assert!(coarse.contains("- sales (amount: 148300)"));
        assert!(coarse.contains("- office supplies\n"));

        let known = vec![KnownItem {
            name: "revenue".to_string(),
            description: "Sales of goods".to_string(),
        }];
        let mapping = name_mapping_prompt(&items, &known);
        assert!(mapping.contains("- revenue: Sales of goods"));
        assert!(mapping.contains("- office supplies"));
    }
}
