use crate::registry::{layout, FieldRole};
use crate::schema::{EntityKind, FinCategory, KnownItem, StatementKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Qualified path: `revenue` or `cogs.total_cogs`.
    pub path: String,
    pub entity: String,
    pub description: String,
    pub category: FinCategory,
    pub derived: bool,
}

/// Every field a composite statement can receive, flattened across its
/// components and grouped by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub statement: StatementKind,
    pub sections: BTreeMap<FinCategory, Vec<CatalogEntry>>,
}

impl FieldCatalog {
    pub fn for_statement(statement: StatementKind) -> Self {
        let mut sections: BTreeMap<FinCategory, Vec<CatalogEntry>> = BTreeMap::new();
        let composite = layout(statement.entity());

        let mut push = |prefix: Option<&str>, kind: EntityKind| {
            for field in layout(kind).fields {
                let descriptor = field.descriptor;
                let path = match prefix {
                    Some(prefix) => format!("{}.{}", prefix, descriptor.name),
                    None => descriptor.name.to_string(),
                };
                sections
                    .entry(descriptor.category)
                    .or_default()
                    .push(CatalogEntry {
                        path,
                        entity: kind.to_string(),
                        description: descriptor.description.to_string(),
                        category: descriptor.category,
                        derived: field.role == FieldRole::Derived,
                    });
            }
        };

        push(None, composite.kind);
        for slot in composite.components {
            push(Some(slot.name), slot.kind);
        }

        for entries in sections.values_mut() {
            entries.sort_by(|a, b| a.path.cmp(&b.path));
        }

        Self {
            statement,
            sections,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.sections.values().flatten()
    }

    pub fn lookup(&self, path: &str) -> Option<&CatalogEntry> {
        self.entries().find(|entry| entry.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Matcher candidates for one category.
    pub fn known_items(&self, category: FinCategory) -> Vec<KnownItem> {
        self.sections
            .get(&category)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| KnownItem {
                        name: entry.path.clone(),
                        description: entry.description.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Field Catalog - {} statement\n\n", self.statement));

        for (category, entries) in &self.sections {
            output.push_str(&format!("## {}\n\n", category));
            output.push_str("| Field | Entity | Derived | Description |\n");
            output.push_str("|-------|--------|---------|-------------|\n");
            for entry in entries {
                output.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    entry.path,
                    entry.entity,
                    if entry.derived { "yes" } else { "no" },
                    entry.description
                ));
            }
            output.push('\n');
        }

        output
    }
}
