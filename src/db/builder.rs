//! Statement synthesis from declarative query specs.
//!
//! `build_query` is pure: it renders a [`QuerySpec`] into a parameterized
//! statement string plus its positional parameter list. Parameter values are
//! never interpolated into the statement text.

use crate::error::{DataError, DataResult};
use crate::models::{JoinClause, JoinSpec, QuerySpec, QueryParam, WhereClause};

/// Build a parameterized statement from a query spec.
pub fn build_query(spec: QuerySpec) -> DataResult<(String, Vec<QueryParam>)> {
    match spec {
        QuerySpec::Raw { statement, params } => Ok((statement, params)),
        QuerySpec::Select {
            table,
            columns,
            join,
            filter,
            order_by,
            limit,
            offset,
        } => {
            let table = require_table(&table)?;
            let column_list = if columns.is_empty() {
                "*".to_string()
            } else {
                columns.join(", ")
            };
            let join_clause = build_join(join);
            let (where_clause, params) = build_where(filter);
            let order = order_by
                .map(|o| format!(" ORDER BY {o}"))
                .unwrap_or_default();
            let limit = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
            let offset = offset.map(|n| format!(" OFFSET {n}")).unwrap_or_default();

            let statement = format!(
                "SELECT {column_list} FROM {table}{join_clause}{where_clause}{order}{limit}{offset}"
            );
            Ok((statement, params))
        }
        QuerySpec::Insert { table, data } => {
            let table = require_table(&table)?;
            let columns: Vec<&str> = data.iter().map(|(k, _)| k.as_str()).collect();
            let placeholders = vec!["?"; data.len()].join(", ");
            let statement = format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            );
            let params = data.into_iter().map(|(_, v)| v).collect();
            Ok((statement, params))
        }
        QuerySpec::Update {
            table,
            data,
            filter,
        } => {
            let table = require_table(&table)?;
            let set_clause = data
                .iter()
                .map(|(k, _)| format!("{k} = ?"))
                .collect::<Vec<_>>()
                .join(", ");
            let (where_clause, where_params) = build_where(filter);
            let statement = format!("UPDATE {table} SET {set_clause}{where_clause}");
            let mut params: Vec<QueryParam> = data.into_iter().map(|(_, v)| v).collect();
            params.extend(where_params);
            Ok((statement, params))
        }
        QuerySpec::Delete { table, filter } => {
            let table = require_table(&table)?;
            let (where_clause, params) = build_where(filter);
            let statement = format!("DELETE FROM {table}{where_clause}");
            Ok((statement, params))
        }
    }
}

fn require_table(table: &str) -> DataResult<&str> {
    if table.trim().is_empty() {
        return Err(DataError::invalid_query("structured query requires a table"));
    }
    Ok(table)
}

fn build_join(join: Option<JoinClause>) -> String {
    match join {
        None => String::new(),
        Some(JoinClause::Raw(s)) => format!(" {s}"),
        Some(JoinClause::Specs(items)) => {
            let parts: Vec<String> = items
                .into_iter()
                .map(|item| match item {
                    JoinSpec::Raw(s) => s,
                    JoinSpec::On {
                        join_type,
                        table,
                        on,
                    } => {
                        let prefix = join_type.map(|t| format!("{t} ")).unwrap_or_default();
                        format!("{prefix}JOIN {table} ON {on}")
                    }
                })
                .collect();
            format!(" {}", parts.join(" "))
        }
    }
}

fn build_where(filter: Option<WhereClause>) -> (String, Vec<QueryParam>) {
    match filter {
        None => (String::new(), Vec::new()),
        Some(WhereClause::Raw { sql, params }) => (format!(" WHERE {sql}"), params),
        Some(WhereClause::Equals(pairs)) => {
            if pairs.is_empty() {
                return (String::new(), Vec::new());
            }
            let clause = pairs
                .iter()
                .map(|(k, _)| format!("{k} = ?"))
                .collect::<Vec<_>>()
                .join(" AND ");
            let params = pairs.into_iter().map(|(_, v)| v).collect();
            (format!(" WHERE {clause}"), params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_passthrough() {
        let (sql, params) =
            build_query(QuerySpec::raw_with("SELECT 1", vec![QueryParam::Int(1)])).unwrap();
        assert_eq!(sql, "SELECT 1");
        assert_eq!(params, vec![QueryParam::Int(1)]);
    }

    #[test]
    fn test_select_defaults_to_star() {
        let (sql, params) = build_query(QuerySpec::select("users")).unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_column_list_joined() {
        let spec = QuerySpec::select("users")
            .with_columns(vec!["id".to_string(), "name".to_string()]);
        let (sql, _) = build_query(spec).unwrap();
        assert_eq!(sql, "SELECT id, name FROM users");
    }

    #[test]
    fn test_select_where_mapping_produces_and_conjunctions() {
        let spec = QuerySpec::select("users").with_filter(WhereClause::Equals(vec![
            ("status".to_string(), QueryParam::Str("active".to_string())),
            ("org_id".to_string(), QueryParam::Int(9)),
        ]));
        let (sql, params) = build_query(spec).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE status = ? AND org_id = ?"
        );
        assert_eq!(
            params,
            vec![
                QueryParam::Str("active".to_string()),
                QueryParam::Int(9)
            ]
        );
    }

    #[test]
    fn test_select_empty_where_mapping_omits_clause() {
        let spec = QuerySpec::select("users").with_filter(WhereClause::Equals(vec![]));
        let (sql, params) = build_query(spec).unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_raw_where_keeps_external_params() {
        let spec = QuerySpec::select("users").with_filter(WhereClause::Raw {
            sql: "age > ? OR vip = ?".to_string(),
            params: vec![QueryParam::Int(21), QueryParam::Bool(true)],
        });
        let (sql, params) = build_query(spec).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE age > ? OR vip = ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_select_join_specs() {
        let spec = QuerySpec::select("orders").with_join(JoinClause::Specs(vec![
            JoinSpec::On {
                join_type: Some("LEFT".to_string()),
                table: "users".to_string(),
                on: "users.id = orders.user_id".to_string(),
            },
            JoinSpec::Raw("JOIN items ON items.order_id = orders.id".to_string()),
        ]));
        let (sql, _) = build_query(spec).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM orders LEFT JOIN users ON users.id = orders.user_id \
             JOIN items ON items.order_id = orders.id"
        );
    }

    #[test]
    fn test_select_join_without_type() {
        let spec = QuerySpec::select("orders").with_join(JoinClause::Specs(vec![JoinSpec::On {
            join_type: None,
            table: "users".to_string(),
            on: "users.id = orders.user_id".to_string(),
        }]));
        let (sql, _) = build_query(spec).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM orders JOIN users ON users.id = orders.user_id"
        );
    }

    #[test]
    fn test_select_order_limit_offset() {
        let spec = QuerySpec::select("events")
            .with_order_by("created_at DESC")
            .with_limit(20)
            .with_offset(40);
        let (sql, _) = build_query(spec).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM events ORDER BY created_at DESC LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn test_insert_columns_and_placeholders_from_data_order() {
        let spec = QuerySpec::insert(
            "t",
            vec![
                ("a".to_string(), QueryParam::Int(1)),
                ("b".to_string(), QueryParam::Int(2)),
            ],
        );
        let (sql, params) = build_query(spec).unwrap();
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES (?, ?)");
        assert_eq!(params, vec![QueryParam::Int(1), QueryParam::Int(2)]);
    }

    #[test]
    fn test_update_params_order_data_then_where() {
        let spec = QuerySpec::update(
            "t",
            vec![("a".to_string(), QueryParam::Int(1))],
            Some(WhereClause::eq("id", 5i64)),
        );
        let (sql, params) = build_query(spec).unwrap();
        assert_eq!(sql, "UPDATE t SET a = ? WHERE id = ?");
        assert_eq!(params, vec![QueryParam::Int(1), QueryParam::Int(5)]);
    }

    #[test]
    fn test_delete_with_where() {
        let spec = QuerySpec::delete("t", Some(WhereClause::eq("id", 5i64)));
        let (sql, params) = build_query(spec).unwrap();
        assert_eq!(sql, "DELETE FROM t WHERE id = ?");
        assert_eq!(params, vec![QueryParam::Int(5)]);
    }

    #[test]
    fn test_empty_table_rejected() {
        let err = build_query(QuerySpec::select("  ")).unwrap_err();
        assert!(matches!(err, DataError::InvalidQuery { .. }));
    }
}
