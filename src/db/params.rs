//! Parameter binding utilities for statements.
//!
//! This module binds `SqlParam` values to `Any`-driver query objects.

use crate::models::SqlParam;
use sqlx::Any;
use sqlx::any::AnyArguments;
use sqlx::query::Query;

/// Bind a single parameter.
pub(crate) fn bind_any_param<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    param: &'q SqlParam,
) -> Query<'q, Any, AnyArguments<'q>> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(v) => query.bind(*v),
        SqlParam::Int(v) => query.bind(*v),
        SqlParam::Float(v) => query.bind(*v),
        SqlParam::String(v) => query.bind(v.as_str()),
        SqlParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Build a query for `sql` with every parameter bound in order.
pub(crate) fn bound_query<'q>(
    sql: &'q str,
    params: &'q [SqlParam],
) -> Query<'q, Any, AnyArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query::<Any>(sql), |query, param| {
            bind_any_param(query, param)
        })
}

/// Render parameters the way statement logs show them: `1(int), alice(string)`.
pub(crate) fn describe_params(params: &[SqlParam]) -> String {
    params
        .iter()
        .map(|p| match p {
            SqlParam::Null => "null".to_string(),
            SqlParam::Bool(v) => format!("{}({})", v, p.type_name()),
            SqlParam::Int(v) => format!("{}({})", v, p.type_name()),
            SqlParam::Float(v) => format!("{}({})", v, p.type_name()),
            SqlParam::String(v) => format!("{}({})", v, p.type_name()),
            SqlParam::Bytes(v) => format!("<{} bytes>({})", v.len(), p.type_name()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_params() {
        let params = vec![
            SqlParam::Int(1),
            SqlParam::from("alice"),
            SqlParam::Null,
            SqlParam::Bytes(vec![0, 1, 2]),
        ];
        assert_eq!(
            describe_params(&params),
            "1(int), alice(string), null, <3 bytes>(bytes)"
        );
        assert_eq!(describe_params(&[]), "");
    }
}
