//! Structured page content produced by the external document-vision service.

use crate::error::{FinancialStatementError, Result};
use crate::utils::extract_json_payload;
use async_trait::async_trait;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct Paragraph {
    #[schemars(description = "Title of the section holding the paragraph, or an empty string")]
    pub section: String,

    #[schemars(description = "Text content of the paragraph")]
    pub paragraph: String,
}

/// A table, graph or statement as a header plus a free-form body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct TableBlock {
    #[serde(alias = "Header")]
    #[schemars(description = "Table header; carried over from the previous page when absent")]
    pub header: Value,

    #[serde(alias = "Body")]
    #[schemars(description = "Table body, rows keyed by column or year")]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct FiboEntity {
    #[serde(alias = "Entity")]
    #[schemars(description = "Entity name using FIBO ontology terms")]
    pub entity: String,

    #[serde(alias = "Timestamp")]
    #[schemars(description = "Timestamp of the entity, or 'n.a.'")]
    pub timestamp: String,

    #[serde(alias = "Value")]
    #[schemars(description = "Value of the entity")]
    pub value: Value,
}

/// One page of a source document as structured JSON with the fixed keys
/// `text`, `tables`, `graphs`, `financial_statements`, `FIBO_entities`,
/// `images` and `summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct PageContent {
    #[schemars(description = "Paragraphs of the page, excluding tables, graphs and statements")]
    pub text: Vec<Paragraph>,

    #[schemars(description = "All tabular data on the page")]
    pub tables: Vec<TableBlock>,

    #[schemars(description = "Graphs rendered as tables")]
    pub graphs: Vec<TableBlock>,

    #[serde(alias = "financial statements")]
    #[schemars(description = "Tables or graphs carrying financial data such as sales, costs or debt")]
    pub financial_statements: Vec<TableBlock>,

    #[serde(rename = "FIBO_entities", alias = "FIBO entities", alias = "fibo_entities")]
    #[schemars(description = "Entities named with FIBO ontology terms")]
    pub fibo_entities: Vec<FiboEntity>,

    #[schemars(description = "Descriptions standing in for images")]
    pub images: Vec<String>,

    #[schemars(description = "Summary of what the tables and statements cover")]
    pub summary: String,
}

impl PageContent {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PageContent)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }

    /// Parses a service reply. Pages without useful content (title pages,
    /// disclaimers, contents) come back as `""` and yield `None`.
    pub fn from_reply(reply: &str) -> Result<Option<Self>> {
        let trimmed = reply.trim();
        if trimmed.is_empty() || trimmed == "\"\"" {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(extract_json_payload(trimmed))?;
        match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::Object(_) => Ok(Some(serde_json::from_value(value)?)),
            other => Err(FinancialStatementError::InvalidArtifact(format!(
                "page content must be an object, got {}",
                other
            ))),
        }
    }

    pub fn has_financial_data(&self) -> bool {
        !self.financial_statements.is_empty()
    }
}

/// A page handed to the extraction service.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPage {
    pub document: String,
    pub page_number: u32,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// External document-vision service.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// `Ok(None)` for pages with nothing worth keeping.
    async fn extract_structured_content(&self, page: &DocumentPage) -> Result<Option<PageContent>>;
}

/// Extracts every page in order, dropping empty ones.
pub async fn extract_document(
    extractor: &dyn DocumentExtractor,
    pages: &[DocumentPage],
) -> Result<Vec<PageContent>> {
    let mut contents = Vec::with_capacity(pages.len());
    for page in pages {
        match extractor.extract_structured_content(page).await? {
            Some(content) => contents.push(content),
            None => debug!("Page {} of {} has no content", page.page_number, page.document),
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_with_spaced_keys() {
        let reply = r#"{
            "text": [{"section": "Overview", "paragraph": "Sales grew."}],
            "tables": [],
            "graphs": [],
            "financial statements": [{"Header": "Income", "Body": {"2023": {"Sales": 10}}}],
            "FIBO entities": [{"Entity": "Revenue", "Timestamp": "2023", "Value": 10}],
            "images": ["[Logo]"],
            "summary": "Income statement for 2023."
        }"#;

        let page = PageContent::from_reply(reply).unwrap().unwrap();
        assert!(page.has_financial_data());
        assert_eq!(page.financial_statements[0].header, "Income");
        assert_eq!(page.fibo_entities[0].entity, "Revenue");
        assert_eq!(page.text[0].section, "Overview");
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(PageContent::from_reply("\"\"").unwrap(), None);
        assert_eq!(PageContent::from_reply("   ").unwrap(), None);
    }

    #[test]
    fn test_missing_keys_default() {
        let page = PageContent::from_reply(r#"{"summary": "Nothing financial."}"#)
            .unwrap()
            .unwrap();
        assert!(!page.has_financial_data());
        assert!(page.tables.is_empty());
    }

    struct ReplayExtractor;

    #[async_trait]
    impl DocumentExtractor for ReplayExtractor {
        async fn extract_structured_content(
            &self,
            page: &DocumentPage,
        ) -> Result<Option<PageContent>> {
            PageContent::from_reply(&String::from_utf8_lossy(&page.bytes))
        }
    }

    #[tokio::test]
    async fn test_extract_document_drops_empty_pages() {
        let page = |n: u32, body: &str| DocumentPage {
            document: "annual_report".to_string(),
            page_number: n,
            mime_type: "application/json".to_string(),
            bytes: body.as_bytes().to_vec(),
        };
        let pages = vec![
            page(1, "\"\""),
            page(2, r#"{"summary": "Balance sheet", "financial_statements": [{"header": "Balance", "body": {}}]}"#),
        ];

        let contents = extract_document(&ReplayExtractor, &pages).await.unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].summary, "Balance sheet");
    }

    #[test]
    fn test_schema_uses_fibo_key() {
        let schema = PageContent::schema_as_json().unwrap();
        assert!(schema.contains("FIBO_entities"));
        assert!(schema.contains("financial_statements"));
    }
}
