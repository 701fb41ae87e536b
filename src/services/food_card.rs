//! FoodCardTracker MCP service.

use super::{
    check_date, check_optional_date, lenient_i64, lenient_opt_string, lenient_string, no_fields,
    not_found, parse_args, storage_failure,
};
use crate::mcp::protocol::{JsonRpcError, ToolCallResult, ToolDefinition};
use crate::mcp::ToolService;
use crate::store::{CardActionStore, CardActionUpdate, NewCardAction};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Food card action tracker backed by [`CardActionStore`].
pub struct FoodCardTracker {
    store: CardActionStore,
}

#[derive(Debug, Deserialize)]
struct AddArgs {
    date: String,
    #[serde(deserialize_with = "lenient_string")]
    cardnumber: String,
    cardaction: String,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeArgs {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    cardnumber: Option<String>,
    #[serde(default)]
    cardaction: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
}

impl FoodCardTracker {
    pub fn new(store: CardActionStore) -> Self {
        Self { store }
    }

    fn add(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: AddArgs = parse_args("add_card_action", arguments)?;
        check_date("date", &args.date)?;

        let action = NewCardAction {
            date: args.date,
            cardnumber: args.cardnumber,
            cardaction: args.cardaction,
            note: args.note.unwrap_or_default(),
        };
        let id = self
            .store
            .add(&action)
            .map_err(|e| storage_failure("add_card_action", e))?;

        tracing::info!("Added card action {} ({} on {})", id, action.cardaction, action.cardnumber);
        Ok(ToolCallResult::json(&json!({ "status": "ok", "id": id })))
    }

    fn list(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: RangeArgs = parse_args("list_card_actions", arguments)?;
        check_date("start_date", &args.start_date)?;
        check_date("end_date", &args.end_date)?;

        let actions = self
            .store
            .list(&args.start_date, &args.end_date)
            .map_err(|e| storage_failure("list_card_actions", e))?;
        Ok(ToolCallResult::json(&actions))
    }

    fn update(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: UpdateArgs = parse_args("update_card_action", arguments)?;
        check_optional_date("date", args.date.as_deref())?;

        let update = CardActionUpdate {
            date: args.date,
            cardnumber: args.cardnumber,
            cardaction: args.cardaction,
            note: args.note,
        };
        if update.is_empty() {
            return Ok(ToolCallResult::json(&no_fields()));
        }

        let found = self
            .store
            .update(args.id, &update)
            .map_err(|e| storage_failure("update_card_action", e))?;
        if !found {
            return Ok(ToolCallResult::json(&not_found(args.id)));
        }

        Ok(ToolCallResult::json(
            &json!({ "status": "ok", "updated_id": args.id }),
        ))
    }

    fn delete(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: IdArgs = parse_args("delete_card_action", arguments)?;

        let found = self
            .store
            .delete(args.id)
            .map_err(|e| storage_failure("delete_card_action", e))?;
        if !found {
            return Ok(ToolCallResult::json(&not_found(args.id)));
        }

        Ok(ToolCallResult::json(
            &json!({ "status": "ok", "deleted_id": args.id }),
        ))
    }
}

#[async_trait]
impl ToolService for FoodCardTracker {
    fn name(&self) -> &'static str {
        "FoodCardTracker"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "add_card_action".to_string(),
                description: "Add a new food card action to the database.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "date": {"type": "string", "description": "The date of the transaction in YYYY-MM-DD format."},
                        "cardnumber": {"type": "string", "description": "The identifier for the food card."},
                        "cardaction": {"type": "string", "description": "The type of action (e.g., 'RELOAD', 'SPEND')."},
                        "note": {"type": "string", "description": "Additional notes about the transaction.", "default": ""}
                    },
                    "required": ["date", "cardnumber", "cardaction"]
                }),
            },
            ToolDefinition {
                name: "list_card_actions".to_string(),
                description: "List food card entries within an inclusive date range.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "start_date": {"type": "string", "description": "The start date of the range in YYYY-MM-DD format."},
                        "end_date": {"type": "string", "description": "The end date of the range in YYYY-MM-DD format."}
                    },
                    "required": ["start_date", "end_date"]
                }),
            },
            ToolDefinition {
                name: "update_card_action".to_string(),
                description: "Update an existing food card action by its ID.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "description": "The ID of the record to update."},
                        "date": {"type": "string", "description": "New date in YYYY-MM-DD format."},
                        "cardnumber": {"type": "string", "description": "New card number."},
                        "cardaction": {"type": "string", "description": "New action type."},
                        "note": {"type": "string", "description": "New note."}
                    },
                    "required": ["id"]
                }),
            },
            ToolDefinition {
                name: "delete_card_action".to_string(),
                description: "Delete a food card action from the database by its ID.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "description": "The ID of the record to delete."}
                    },
                    "required": ["id"]
                }),
            },
        ]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, JsonRpcError> {
        let outcome = match name {
            "add_card_action" => self.add(arguments),
            "list_card_actions" => self.list(arguments),
            "update_card_action" => self.update(arguments),
            "delete_card_action" => self.delete(arguments),
            _ => {
                return Err(JsonRpcError::invalid_params(format!(
                    "Unknown tool: {}",
                    name
                )))
            }
        };

        Ok(outcome.unwrap_or_else(|error| error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FoodCardTracker {
        FoodCardTracker::new(CardActionStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_card_action_lifecycle() {
        let t = tracker();

        let added = t
            .call_tool(
                "add_card_action",
                json!({"date": "2025-10-03", "cardnumber": "4321", "cardaction": "RELOAD", "note": "monthly"}),
            )
            .await
            .unwrap();
        assert_eq!(added.structured_content, Some(json!({"status": "ok", "id": 1})));

        let listed = t
            .call_tool(
                "list_card_actions",
                json!({"start_date": "2025-10-01", "end_date": "2025-10-31"}),
            )
            .await
            .unwrap();
        let rows = listed.structured_content.unwrap()["result"].clone();
        assert_eq!(rows[0]["cardnumber"], "4321");
        assert_eq!(rows[0]["note"], "monthly");

        let updated = t
            .call_tool("update_card_action", json!({"id": 1, "cardaction": "SPEND"}))
            .await
            .unwrap();
        assert_eq!(
            updated.structured_content,
            Some(json!({"status": "ok", "updated_id": 1}))
        );

        let deleted = t
            .call_tool("delete_card_action", json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(
            deleted.structured_content,
            Some(json!({"status": "ok", "deleted_id": 1}))
        );
    }

    #[tokio::test]
    async fn test_update_without_fields() {
        let result = tracker()
            .call_tool("update_card_action", json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(
            result.structured_content,
            Some(json!({"status": "error", "message": "No fields provided for update"}))
        );
    }

    #[tokio::test]
    async fn test_missing_card_number_is_tool_error() {
        let result = tracker()
            .call_tool(
                "add_card_action",
                json!({"date": "2025-10-03", "cardaction": "SPEND"}),
            )
            .await
            .unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_numeric_card_number_is_accepted() {
        let t = tracker();

        let added = t
            .call_tool(
                "add_card_action",
                json!({"date": "2025-10-03", "cardnumber": 4321, "cardaction": "SPEND"}),
            )
            .await
            .unwrap();
        assert!(!added.is_error(), "{}", added.text_content());

        let updated = t
            .call_tool("update_card_action", json!({"id": 1, "cardnumber": 9876}))
            .await
            .unwrap();
        assert!(!updated.is_error(), "{}", updated.text_content());

        let listed = t
            .call_tool(
                "list_card_actions",
                json!({"start_date": "2025-10-01", "end_date": "2025-10-31"}),
            )
            .await
            .unwrap();
        assert_eq!(listed.structured_content.unwrap()["result"][0]["cardnumber"], "9876");
    }

    #[tokio::test]
    async fn test_has_no_resources() {
        assert!(tracker().resources().is_empty());
        assert!(tracker().call_tool("summarize", json!({})).await.is_err());
    }
}
