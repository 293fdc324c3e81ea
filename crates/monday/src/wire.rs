//! GraphQL payloads and their mapping onto raw records.

use std::collections::HashMap;

use boardsight_core::domain::{BoardCategory, RawRecord, RawValue};
use serde::Deserialize;
use serde_json::Value;

pub(crate) const SCHEMA_QUERY: &str = "query ($boardId: [ID!]) { boards(ids: $boardId) { id name columns { id title type } } }";

pub(crate) const FIRST_PAGE_QUERY: &str = "query ($boardId: [ID!], $limit: Int!) { boards(ids: $boardId) { items_page(limit: $limit) { cursor items { id name created_at column_values { id text value } } } } }";

pub(crate) const NEXT_PAGE_QUERY: &str = "query ($cursor: String!, $limit: Int!) { next_items_page(cursor: $cursor, limit: $limit) { cursor items { id name created_at column_values { id text value } } } }";

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl<T> Envelope<T> {
    /// Error codes the API uses for throttling.
    pub fn is_throttled(&self) -> bool {
        let codes = self
            .errors
            .iter()
            .filter_map(|error| error.extensions.as_ref().and_then(|ext| ext.code.as_deref()))
            .chain(self.error_code.as_deref());
        codes.into_iter().any(|code| {
            let code = code.to_ascii_uppercase();
            code.contains("RATE_LIMIT") || code.contains("COMPLEXITY")
        })
    }

    pub fn error_summary(&self) -> Option<String> {
        let mut messages: Vec<&str> = self.errors.iter().map(|error| error.message.as_str()).collect();
        messages.extend(self.error_message.as_deref());
        (!messages.is_empty()).then(|| messages.join("; "))
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "B: Deserialize<'de>"))]
pub(crate) struct BoardsData<B> {
    #[serde(default)]
    pub boards: Vec<B>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SchemaBoard {
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ColumnDef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PagedBoard {
    pub items_page: ItemsPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextPageData {
    pub next_items_page: ItemsPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemsPage {
    pub cursor: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Item {
    pub id: String,
    pub name: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub column_values: Vec<ColumnValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ColumnValue {
    pub id: String,
    pub text: Option<String>,
    /// JSON-encoded column payload, as a string.
    pub value: Option<String>,
}

/// Column id to title for one board.
pub(crate) fn column_titles(board: SchemaBoard) -> HashMap<String, String> {
    board.columns.into_iter().map(|column| (column.id, column.title)).collect()
}

pub(crate) fn item_to_record(
    category: BoardCategory,
    item: Item,
    titles: &HashMap<String, String>,
) -> RawRecord {
    let mut record = RawRecord::new(category).with("id", item.id);
    if let Some(name) = item.name {
        record = record.with("name", name);
    }
    if let Some(created_at) = item.created_at {
        record = record.with("created_at", created_at);
    }

    for column in item.column_values {
        let title = titles.get(&column.id).cloned().unwrap_or(column.id);
        let value = column_value(column.text, column.value.as_deref());
        // Item-level fields win over a column that happens to share the title.
        record.fields.entry(title).or_insert(value);
    }
    record
}

/// Display text first; otherwise the decoded payload when it carries
/// something the normalizer can read.
fn column_value(text: Option<String>, payload: Option<&str>) -> RawValue {
    if let Some(text) = text.filter(|text| !text.trim().is_empty()) {
        return RawValue::Text(text);
    }

    match payload.and_then(|raw| serde_json::from_str::<Value>(raw).ok()) {
        Some(Value::Number(number)) => number.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
        Some(Value::String(text)) => RawValue::Text(text),
        Some(value @ Value::Object(_)) => RawValue::Structured(value),
        _ => RawValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use boardsight_core::domain::{BoardCategory, RawValue};

    use super::{column_titles, item_to_record, BoardsData, Envelope, PagedBoard, SchemaBoard};

    #[test]
    fn schema_maps_column_ids_to_titles() {
        let envelope: Envelope<BoardsData<SchemaBoard>> = serde_json::from_str(
            r#"{"data": {"boards": [{"id": "1", "name": "Deals", "columns": [
                {"id": "numbers", "title": "Deal Amount", "type": "numbers"},
                {"id": "status", "title": "Status", "type": "status"}
            ]}]}}"#,
        )
        .expect("decode schema");

        let board = envelope.data.expect("data").boards.into_iter().next().expect("board");
        let titles = column_titles(board);
        assert_eq!(titles.get("numbers").map(String::as_str), Some("Deal Amount"));
    }

    #[test]
    fn items_become_raw_records_keyed_by_title() {
        let envelope: Envelope<BoardsData<PagedBoard>> = serde_json::from_str(
            r#"{"data": {"boards": [{"items_page": {"cursor": "abc", "items": [{
                "id": "101", "name": "Acme", "created_at": "2024-01-10T09:00:00Z",
                "column_values": [
                    {"id": "numbers", "text": "125000", "value": "\"125000\""},
                    {"id": "status", "text": "", "value": "{\"index\": 1, \"label\": \"Working on it\"}"},
                    {"id": "date4", "text": null, "value": null},
                    {"id": "unmapped", "text": "x", "value": null}
                ]
            }]}}]}}"#,
        )
        .expect("decode page");

        let page = envelope.data.expect("data").boards.into_iter().next().expect("board").items_page;
        assert_eq!(page.cursor.as_deref(), Some("abc"));

        let titles: HashMap<String, String> = [("numbers", "Deal Amount"), ("status", "Status")]
            .into_iter()
            .map(|(id, title)| (id.to_string(), title.to_string()))
            .collect();
        let item = page.items.into_iter().next().expect("item");
        let record = item_to_record(BoardCategory::Deal, item, &titles);

        assert_eq!(record.fields["id"], RawValue::Text("101".to_string()));
        assert_eq!(record.fields["Deal Amount"], RawValue::Text("125000".to_string()));
        assert_eq!(record.fields["Status"].as_text().as_deref(), Some("Working on it"));
        assert_eq!(record.fields["date4"], RawValue::Null);
        assert!(record.fields.contains_key("unmapped"));
    }

    #[test]
    fn throttling_is_detected_from_error_codes() {
        let envelope: Envelope<BoardsData<SchemaBoard>> = serde_json::from_str(
            r#"{"errors": [{"message": "Complexity budget exhausted", "extensions": {"code": "ComplexityException"}}]}"#,
        )
        .expect("decode errors");

        assert!(envelope.is_throttled());
        assert_eq!(envelope.error_summary().as_deref(), Some("Complexity budget exhausted"));
    }
}
