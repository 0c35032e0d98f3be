//! Query-related data models.
//!
//! The primary interface is the tagged [`QuerySpec`] variant, constructed
//! explicitly. [`QueryDescriptor`] layers the dynamic descriptor shape on top
//! as a convenience: a deserialized object whose operation is inferred from
//! which fields are present.

use crate::error::{DataError, DataResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A positional parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Structured value, bound as JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::Str(s),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// WHERE clause: either raw SQL with externally supplied parameters, or an
/// equality mapping combined with `AND`. Anything beyond equality (ranges,
/// OR, IN) goes through the raw escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Raw {
        sql: String,
        params: Vec<QueryParam>,
    },
    Equals(Vec<(String, QueryParam)>),
}

impl WhereClause {
    /// Equality clause on a single column.
    pub fn eq(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::Equals(vec![(column.into(), value.into())])
    }
}

/// A single join fragment: raw SQL or a typed spec rendered as
/// `[TYPE ]JOIN table ON condition`.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinSpec {
    Raw(String),
    On {
        join_type: Option<String>,
        table: String,
        on: String,
    },
}

/// Join clause: a raw string appended verbatim, or an ordered sequence of
/// join specs.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinClause {
    Raw(String),
    Specs(Vec<JoinSpec>),
}

/// Declarative description of a statement to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    /// Raw statement plus positional parameters; bypasses all structured
    /// fields.
    Raw {
        statement: String,
        params: Vec<QueryParam>,
    },
    Select {
        table: String,
        /// Empty means `*`; multiple entries join with `, `.
        columns: Vec<String>,
        join: Option<JoinClause>,
        filter: Option<WhereClause>,
        order_by: Option<String>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Insert {
        table: String,
        /// Column/value pairs; order here is column order in the statement.
        data: Vec<(String, QueryParam)>,
    },
    Update {
        table: String,
        data: Vec<(String, QueryParam)>,
        filter: Option<WhereClause>,
    },
    Delete {
        table: String,
        filter: Option<WhereClause>,
    },
}

impl QuerySpec {
    /// Raw statement with no parameters.
    pub fn raw(statement: impl Into<String>) -> Self {
        Self::Raw {
            statement: statement.into(),
            params: Vec::new(),
        }
    }

    /// Raw statement with positional parameters.
    pub fn raw_with(statement: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self::Raw {
            statement: statement.into(),
            params,
        }
    }

    /// Bare select over a table (`SELECT * FROM table`).
    pub fn select(table: impl Into<String>) -> Self {
        Self::Select {
            table: table.into(),
            columns: Vec::new(),
            join: None,
            filter: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    pub fn insert(table: impl Into<String>, data: Vec<(String, QueryParam)>) -> Self {
        Self::Insert {
            table: table.into(),
            data,
        }
    }

    pub fn update(
        table: impl Into<String>,
        data: Vec<(String, QueryParam)>,
        filter: Option<WhereClause>,
    ) -> Self {
        Self::Update {
            table: table.into(),
            data,
            filter,
        }
    }

    pub fn delete(table: impl Into<String>, filter: Option<WhereClause>) -> Self {
        Self::Delete {
            table: table.into(),
            filter,
        }
    }

    /// Set the column list (select only).
    pub fn with_columns(mut self, cols: Vec<String>) -> Self {
        if let Self::Select { columns, .. } = &mut self {
            *columns = cols;
        }
        self
    }

    /// Set the join clause (select only).
    pub fn with_join(mut self, clause: JoinClause) -> Self {
        if let Self::Select { join, .. } = &mut self {
            *join = Some(clause);
        }
        self
    }

    /// Set the WHERE clause (select, update, delete).
    pub fn with_filter(mut self, clause: WhereClause) -> Self {
        match &mut self {
            Self::Select { filter, .. }
            | Self::Update { filter, .. }
            | Self::Delete { filter, .. } => *filter = Some(clause),
            _ => {}
        }
        self
    }

    /// Set ORDER BY (select only).
    pub fn with_order_by(mut self, order: impl Into<String>) -> Self {
        if let Self::Select { order_by, .. } = &mut self {
            *order_by = Some(order.into());
        }
        self
    }

    /// Set LIMIT (select only).
    pub fn with_limit(mut self, n: u64) -> Self {
        if let Self::Select { limit, .. } = &mut self {
            *limit = Some(n);
        }
        self
    }

    /// Set OFFSET (select only).
    pub fn with_offset(mut self, n: u64) -> Self {
        if let Self::Select { offset, .. } = &mut self {
            *offset = Some(n);
        }
        self
    }

    /// Whether executing this spec produces a result set (as opposed to an
    /// affected-rows count). Raw statements are classified by their leading
    /// keyword.
    pub fn returns_rows(&self) -> bool {
        match self {
            Self::Select { .. } => true,
            Self::Insert { .. } | Self::Update { .. } | Self::Delete { .. } => false,
            Self::Raw { statement, .. } => {
                let head = statement
                    .trim_start()
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_ascii_uppercase();
                matches!(
                    head.as_str(),
                    "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH"
                )
            }
        }
    }
}

// =============================================================================
// Dynamic descriptor with operation inference
// =============================================================================

/// Column list input: a raw string or a sequence of column names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColumnsInput {
    One(String),
    Many(Vec<String>),
}

/// Join item input: a raw fragment or a `{type, table, on}` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JoinItemInput {
    Raw(String),
    Spec {
        #[serde(rename = "type")]
        join_type: Option<String>,
        table: String,
        on: String,
    },
}

/// Join input: a raw clause or an ordered sequence of join items.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JoinInput {
    Raw(String),
    Specs(Vec<JoinItemInput>),
}

/// WHERE input: a raw condition string or a column-to-value equality map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WhereInput {
    Raw(String),
    Equals(serde_json::Map<String, JsonValue>),
}

/// Dynamic query descriptor mirroring the declarative object shape accepted
/// by [`QueryDescriptor::into_spec`]. When `type` is absent the operation is
/// inferred: `data` plus `where` means update, `data` alone means insert, a
/// `delete` flag means delete, anything else is a select.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryDescriptor {
    /// Raw statement; when present every structured field is ignored.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub params: Vec<JsonValue>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default, rename = "type")]
    pub op: Option<String>,
    #[serde(default)]
    pub select: Option<ColumnsInput>,
    #[serde(default)]
    pub join: Option<JoinInput>,
    #[serde(default, rename = "where")]
    pub filter: Option<WhereInput>,
    #[serde(default)]
    pub where_params: Vec<JsonValue>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub data: Option<serde_json::Map<String, JsonValue>>,
    #[serde(default)]
    pub delete: bool,
}

fn to_params(values: Vec<JsonValue>) -> Vec<QueryParam> {
    values.into_iter().map(QueryParam::from).collect()
}

fn to_pairs(map: Option<serde_json::Map<String, JsonValue>>) -> Vec<(String, QueryParam)> {
    map.map(|m| m.into_iter().map(|(k, v)| (k, v.into())).collect())
        .unwrap_or_default()
}

impl QueryDescriptor {
    /// Convert the dynamic descriptor into a tagged [`QuerySpec`].
    pub fn into_spec(self) -> DataResult<QuerySpec> {
        if let Some(statement) = self.query {
            return Ok(QuerySpec::Raw {
                statement,
                params: to_params(self.params),
            });
        }

        let table = self
            .table
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DataError::invalid_query("structured query requires a table"))?;

        let op = match &self.op {
            Some(explicit) => explicit.to_lowercase(),
            None => {
                let inferred = if self.data.is_some() {
                    if self.filter.is_some() { "update" } else { "insert" }
                } else if self.delete {
                    "delete"
                } else {
                    "select"
                };
                inferred.to_string()
            }
        };

        let filter = Self::filter_clause(self.filter, self.where_params);
        match op.as_str() {
            "select" => Ok(QuerySpec::Select {
                table,
                columns: match self.select {
                    None => Vec::new(),
                    Some(ColumnsInput::One(s)) => vec![s],
                    Some(ColumnsInput::Many(cols)) => cols,
                },
                join: self.join.map(|j| match j {
                    JoinInput::Raw(s) => JoinClause::Raw(s),
                    JoinInput::Specs(items) => JoinClause::Specs(
                        items
                            .into_iter()
                            .map(|item| match item {
                                JoinItemInput::Raw(s) => JoinSpec::Raw(s),
                                JoinItemInput::Spec {
                                    join_type,
                                    table,
                                    on,
                                } => JoinSpec::On {
                                    join_type,
                                    table,
                                    on,
                                },
                            })
                            .collect(),
                    ),
                }),
                filter,
                order_by: self.order_by,
                limit: self.limit,
                offset: self.offset,
            }),
            "insert" => Ok(QuerySpec::Insert {
                table,
                data: to_pairs(self.data),
            }),
            "update" => Ok(QuerySpec::Update {
                table,
                data: to_pairs(self.data),
                filter,
            }),
            "delete" => Ok(QuerySpec::Delete { table, filter }),
            other => Err(DataError::unsupported_operation(other)),
        }
    }

    fn filter_clause(input: Option<WhereInput>, where_params: Vec<JsonValue>) -> Option<WhereClause> {
        match input {
            None => None,
            Some(WhereInput::Raw(sql)) => Some(WhereClause::Raw {
                sql,
                params: to_params(where_params),
            }),
            Some(WhereInput::Equals(map)) => Some(WhereClause::Equals(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(QueryParam::Str("hello".to_string()).type_name(), "string");
    }

    #[test]
    fn test_query_param_from_json() {
        assert_eq!(QueryParam::from(json!(null)), QueryParam::Null);
        assert_eq!(QueryParam::from(json!(7)), QueryParam::Int(7));
        assert_eq!(QueryParam::from(json!(1.5)), QueryParam::Float(1.5));
        assert_eq!(
            QueryParam::from(json!("x")),
            QueryParam::Str("x".to_string())
        );
        assert_eq!(
            QueryParam::from(json!({"a": 1})),
            QueryParam::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_returns_rows() {
        assert!(QuerySpec::select("users").returns_rows());
        assert!(!QuerySpec::insert("users", vec![]).returns_rows());
        assert!(QuerySpec::raw("  select 1").returns_rows());
        assert!(QuerySpec::raw("SHOW TABLES").returns_rows());
        assert!(!QuerySpec::raw("INSERT INTO t (a) VALUES (1)").returns_rows());
    }

    #[test]
    fn test_descriptor_raw_bypasses_structured_fields() {
        let descriptor: QueryDescriptor = serde_json::from_value(json!({
            "query": "SELECT 1",
            "params": [5],
            "table": "ignored",
            "data": {"a": 1}
        }))
        .unwrap();
        let spec = descriptor.into_spec().unwrap();
        assert_eq!(
            spec,
            QuerySpec::Raw {
                statement: "SELECT 1".to_string(),
                params: vec![QueryParam::Int(5)],
            }
        );
    }

    #[test]
    fn test_descriptor_requires_table() {
        let descriptor: QueryDescriptor =
            serde_json::from_value(json!({ "select": ["id"] })).unwrap();
        let err = descriptor.into_spec().unwrap_err();
        assert!(matches!(err, DataError::InvalidQuery { .. }));
    }

    #[test]
    fn test_descriptor_infers_operations() {
        let insert: QueryDescriptor =
            serde_json::from_value(json!({"table": "t", "data": {"a": 1}})).unwrap();
        assert!(matches!(
            insert.into_spec().unwrap(),
            QuerySpec::Insert { .. }
        ));

        let update: QueryDescriptor = serde_json::from_value(
            json!({"table": "t", "data": {"a": 1}, "where": {"id": 5}}),
        )
        .unwrap();
        assert!(matches!(
            update.into_spec().unwrap(),
            QuerySpec::Update { .. }
        ));

        let delete: QueryDescriptor =
            serde_json::from_value(json!({"table": "t", "delete": true, "where": {"id": 5}}))
                .unwrap();
        assert!(matches!(
            delete.into_spec().unwrap(),
            QuerySpec::Delete { .. }
        ));

        let select: QueryDescriptor = serde_json::from_value(json!({"table": "t"})).unwrap();
        assert!(matches!(
            select.into_spec().unwrap(),
            QuerySpec::Select { .. }
        ));
    }

    #[test]
    fn test_descriptor_explicit_type_case_insensitive() {
        let descriptor: QueryDescriptor =
            serde_json::from_value(json!({"table": "t", "type": "SELECT"})).unwrap();
        assert!(matches!(
            descriptor.into_spec().unwrap(),
            QuerySpec::Select { .. }
        ));
    }

    #[test]
    fn test_descriptor_unknown_type_rejected() {
        let descriptor: QueryDescriptor =
            serde_json::from_value(json!({"table": "t", "type": "merge"})).unwrap();
        let err = descriptor.into_spec().unwrap_err();
        assert!(matches!(err, DataError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_descriptor_where_string_uses_external_params() {
        let descriptor: QueryDescriptor = serde_json::from_value(json!({
            "table": "t",
            "where": "age > ?",
            "where_params": [21]
        }))
        .unwrap();
        match descriptor.into_spec().unwrap() {
            QuerySpec::Select { filter, .. } => {
                assert_eq!(
                    filter,
                    Some(WhereClause::Raw {
                        sql: "age > ?".to_string(),
                        params: vec![QueryParam::Int(21)],
                    })
                );
            }
            other => panic!("unexpected spec: {:?}", other),
        }
    }
}
