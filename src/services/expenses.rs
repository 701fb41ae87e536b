//! ExpenseTracker MCP service.

use super::{
    check_date, check_optional_date, lenient_f64, lenient_i64, lenient_opt_f64, no_fields,
    not_found, parse_args, storage_failure,
};
use crate::mcp::protocol::{
    codes, JsonRpcError, ResourceContents, ResourceDefinition, ToolCallResult, ToolDefinition,
};
use crate::mcp::ToolService;
use crate::store::{ExpenseStore, ExpenseUpdate, NewExpense};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

pub const CATEGORIES_URI: &str = "expense://categories";

/// Expense tracker backed by [`ExpenseStore`].
pub struct ExpenseTracker {
    store: ExpenseStore,
    categories_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AddArgs {
    date: String,
    #[serde(deserialize_with = "lenient_f64")]
    amount: f64,
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeArgs {
    start_date: String,
    end_date: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    amount: Option<f64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
}

impl ExpenseTracker {
    pub fn new(store: ExpenseStore, categories_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            categories_path: categories_path.into(),
        }
    }

    fn add_expense(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: AddArgs = parse_args("add_expense", arguments)?;
        check_date("date", &args.date)?;

        let expense = NewExpense {
            date: args.date,
            amount: args.amount,
            category: args.category,
            subcategory: args.subcategory.unwrap_or_default(),
            note: args.note.unwrap_or_default(),
        };
        let id = self
            .store
            .add(&expense)
            .map_err(|e| storage_failure("add_expense", e))?;

        tracing::info!("Added expense {} ({} {})", id, expense.amount, expense.category);
        Ok(ToolCallResult::json(&json!({ "status": "ok", "id": id })))
    }

    fn list_expenses(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: RangeArgs = parse_args("list_expenses", arguments)?;
        check_date("start_date", &args.start_date)?;
        check_date("end_date", &args.end_date)?;

        let expenses = self
            .store
            .list(&args.start_date, &args.end_date)
            .map_err(|e| storage_failure("list_expenses", e))?;
        Ok(ToolCallResult::json(&expenses))
    }

    fn summarize(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: RangeArgs = parse_args("summarize", arguments)?;
        check_date("start_date", &args.start_date)?;
        check_date("end_date", &args.end_date)?;

        let totals = self
            .store
            .summarize(&args.start_date, &args.end_date, args.category.as_deref())
            .map_err(|e| storage_failure("summarize", e))?;
        Ok(ToolCallResult::json(&totals))
    }

    fn update_expense(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: UpdateArgs = parse_args("update_expense", arguments)?;
        check_optional_date("date", args.date.as_deref())?;

        let update = ExpenseUpdate {
            date: args.date,
            amount: args.amount,
            category: args.category,
            subcategory: args.subcategory,
            note: args.note,
        };
        if update.is_empty() {
            return Ok(ToolCallResult::json(&no_fields()));
        }

        let found = self
            .store
            .update(args.id, &update)
            .map_err(|e| storage_failure("update_expense", e))?;
        if !found {
            return Ok(ToolCallResult::json(&not_found(args.id)));
        }

        Ok(ToolCallResult::json(
            &json!({ "status": "ok", "updated_id": args.id }),
        ))
    }

    fn delete_expense(&self, arguments: Value) -> Result<ToolCallResult, ToolCallResult> {
        let args: IdArgs = parse_args("delete_expense", arguments)?;

        let found = self
            .store
            .delete(args.id)
            .map_err(|e| storage_failure("delete_expense", e))?;
        if !found {
            return Ok(ToolCallResult::json(&not_found(args.id)));
        }

        Ok(ToolCallResult::json(
            &json!({ "status": "ok", "deleted_id": args.id }),
        ))
    }
}

#[async_trait]
impl ToolService for ExpenseTracker {
    fn name(&self) -> &'static str {
        "ExpenseTracker"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "add_expense".to_string(),
                description: "Add a new expense entry to the database.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "date": {"type": "string", "description": "The date of the expense in YYYY-MM-DD format."},
                        "amount": {"type": "number", "description": "The amount of the expense."},
                        "category": {"type": "string", "description": "The primary category of the expense."},
                        "subcategory": {"type": "string", "description": "The subcategory of the expense.", "default": ""},
                        "note": {"type": "string", "description": "Additional notes about the expense.", "default": ""}
                    },
                    "required": ["date", "amount", "category"]
                }),
            },
            ToolDefinition {
                name: "list_expenses".to_string(),
                description: "List expense entries within an inclusive date range.".to_string(),
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
                name: "summarize".to_string(),
                description: "Summarize expenses by category within an inclusive date range.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "start_date": {"type": "string", "description": "The start date of the range in YYYY-MM-DD format."},
                        "end_date": {"type": "string", "description": "The end date of the range in YYYY-MM-DD format."},
                        "category": {"type": "string", "description": "Filter by a specific category."}
                    },
                    "required": ["start_date", "end_date"]
                }),
            },
            ToolDefinition {
                name: "update_expense".to_string(),
                description: "Update an existing expense by its ID. Only the given fields change.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "description": "The ID of the expense to update."},
                        "date": {"type": "string", "description": "New date in YYYY-MM-DD format."},
                        "amount": {"type": "number", "description": "New amount."},
                        "category": {"type": "string", "description": "New category."},
                        "subcategory": {"type": "string", "description": "New subcategory."},
                        "note": {"type": "string", "description": "New note."}
                    },
                    "required": ["id"]
                }),
            },
            ToolDefinition {
                name: "delete_expense".to_string(),
                description: "Delete an expense from the database by its ID.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "description": "The ID of the expense to delete."}
                    },
                    "required": ["id"]
                }),
            },
        ]
    }

    fn resources(&self) -> Vec<ResourceDefinition> {
        vec![ResourceDefinition {
            uri: CATEGORIES_URI.to_string(),
            name: "categories".to_string(),
            description: Some("Expense categories and their subcategories.".to_string()),
            mime_type: Some("application/json".to_string()),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, JsonRpcError> {
        let outcome = match name {
            "add_expense" => self.add_expense(arguments),
            "list_expenses" => self.list_expenses(arguments),
            "summarize" => self.summarize(arguments),
            "update_expense" => self.update_expense(arguments),
            "delete_expense" => self.delete_expense(arguments),
            _ => {
                return Err(JsonRpcError::invalid_params(format!(
                    "Unknown tool: {}",
                    name
                )))
            }
        };

        Ok(outcome.unwrap_or_else(|error| error))
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents, JsonRpcError> {
        if uri != CATEGORIES_URI {
            return Err(JsonRpcError::new(
                codes::RESOURCE_NOT_FOUND,
                format!("Resource not found: {}", uri),
            ));
        }

        // Re-read on every request; the file may be edited while serving.
        let text = tokio::fs::read_to_string(&self.categories_path)
            .await
            .map_err(|e| {
                JsonRpcError::internal(format!(
                    "Failed to read {}: {}",
                    self.categories_path.display(),
                    e
                ))
            })?;

        Ok(ResourceContents {
            uri: CATEGORIES_URI.to_string(),
            mime_type: Some("application/json".to_string()),
            text: Some(text),
        })
    }
}
