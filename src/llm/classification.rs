use crate::classifier::{ClassificationService, FieldMapping};
use crate::error::{FinancialStatementError, Result};
use crate::llm::client::{CompletionClient, CompletionRequest};
use crate::llm::prompts::{coarse_type_prompt, name_mapping_prompt, SYSTEM_PROMPT_CLASSIFIER};
use crate::schema::{CoarseTypeResponse, FinCategory, KnownItem, NameMappingResponse, UnknownItem};
use crate::utils::{extract_json_payload, parse_typed_items};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

/// Classification backed by a text-completion model. Malformed replies
/// surface as `ClassificationFailed`; retrying is left to the caller.
pub struct LlmClassificationService<C: CompletionClient> {
    client: C,
    system_prompt: String,
}

impl<C: CompletionClient> LlmClassificationService<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            system_prompt: SYSTEM_PROMPT_CLASSIFIER.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    async fn ask(&self, user_prompt: String, schema: schemars::schema::RootSchema) -> Result<Value> {
        let request = CompletionRequest::new(self.system_prompt.clone(), user_prompt)
            .with_schema(serde_json::to_value(schema)?);

        let reply = self.client.complete(request).await?;
        debug!("Model reply: {}", reply);

        serde_json::from_str(extract_json_payload(&reply)).map_err(|e| {
            FinancialStatementError::ClassificationFailed(format!("reply is not JSON: {}", e))
        })
    }
}

/// Re-keys answers by the caller's item names; replies are matched without
/// regard to case.
fn rekey<T: Clone>(items: &[UnknownItem], answers: &BTreeMap<String, T>) -> BTreeMap<String, T> {
    items
        .iter()
        .filter_map(|item| {
            answers
                .get(&item.name)
                .or_else(|| answers.get(&item.name.to_lowercase()))
                .map(|answer| (item.name.clone(), answer.clone()))
        })
        .collect()
}

fn parse_name_mapping(value: &Value) -> Result<BTreeMap<String, Option<String>>> {
    let mut mapping = BTreeMap::new();

    let mut absorb = |object: &serde_json::Map<String, Value>| -> Result<()> {
        for (unknown, known) in object {
            let known = match known {
                Value::Null => None,
                Value::String(s) if s.trim().is_empty() || s.eq_ignore_ascii_case("null") => None,
                Value::String(s) => Some(s.trim().to_lowercase()),
                other => {
                    return Err(FinancialStatementError::ClassificationFailed(format!(
                        "mapping for '{}' must be a string or null, got {}",
                        unknown, other
                    )))
                }
            };
            mapping.insert(unknown.to_lowercase(), known);
        }
        Ok(())
    };

    match value {
        Value::Object(object) => absorb(object)?,
        Value::Array(entries) => {
            for entry in entries {
                let object = entry.as_object().ok_or_else(|| {
                    FinancialStatementError::ClassificationFailed(
                        "mapping entries must be objects".to_string(),
                    )
                })?;
                absorb(object)?;
            }
        }
        other => {
            return Err(FinancialStatementError::ClassificationFailed(format!(
                "expected a mapping object, got {}",
                other
            )))
        }
    }

    Ok(mapping)
}

#[async_trait]
impl<C: CompletionClient> ClassificationService for LlmClassificationService<C> {
    async fn classify_types(
        &self,
        items: &[UnknownItem],
        categories: &[FinCategory],
    ) -> Result<BTreeMap<String, Option<FinCategory>>> {
        let value = self
            .ask(
                coarse_type_prompt(items, categories),
                CoarseTypeResponse::generate_json_schema(),
            )
            .await?;

        let typed: BTreeMap<String, Option<FinCategory>> = parse_typed_items(&value)
            .map_err(|e| FinancialStatementError::ClassificationFailed(e.to_string()))?
            .into_iter()
            .collect();

        Ok(rekey(items, &typed))
    }

    async fn classify_names(
        &self,
        unknown: &[UnknownItem],
        known: &[KnownItem],
    ) -> Result<FieldMapping> {
        let value = self
            .ask(
                name_mapping_prompt(unknown, known),
                NameMappingResponse::generate_json_schema(),
            )
            .await?;

        let mapping = parse_name_mapping(&value)?;
        Ok(rekey(unknown, &mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedClient {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedClient {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request);
            self.replies.lock().unwrap().pop().ok_or_else(|| {
                FinancialStatementError::ClassificationFailed("no reply".to_string())
            })
        }
    }

    #[tokio::test]
    async fn test_coarse_reply_with_fences_and_plural_labels() {
        let client = CannedClient::new(&[
            "```json\n[{\"sales\": \"earnings\"}, {\"office supplies\": \"expenses\"}, {\"misc\": null}]\n```",
        ]);
        let service = LlmClassificationService::new(client);
        let items = vec![
            UnknownItem::new("Sales"),
            UnknownItem::new("office supplies"),
            UnknownItem::new("misc"),
        ];

        let typed = service
            .classify_types(&items, &[FinCategory::Earning, FinCategory::Expense])
            .await
            .unwrap();

        assert_eq!(typed["Sales"], Some(FinCategory::Earning));
        assert_eq!(typed["office supplies"], Some(FinCategory::Expense));
        assert_eq!(typed["misc"], None);

        let prompts = service.client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_mapping_reply_parsed() {
        let client = CannedClient::new(&[
            "Here is the mapping: {\"stationery\": \"operating_expenses.office_supplies\", \"gizmo\": null}",
        ]);
        let service = LlmClassificationService::new(client);
        let unknown = vec![UnknownItem::new("stationery"), UnknownItem::new("gizmo")];
        let known = vec![KnownItem {
            name: "operating_expenses.office_supplies".to_string(),
            description: "Office supplies".to_string(),
        }];

        let mapping = service.classify_names(&unknown, &known).await.unwrap();
        assert_eq!(
            mapping["stationery"].as_deref(),
            Some("operating_expenses.office_supplies")
        );
        assert_eq!(mapping["gizmo"], None);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_classification_failure() {
        let service = LlmClassificationService::new(CannedClient::new(&["I cannot help"]));
        let result = service
            .classify_names(&[UnknownItem::new("x")], &[])
            .await;
        assert!(matches!(
            result,
            Err(FinancialStatementError::ClassificationFailed(_))
        ));
    }
}
