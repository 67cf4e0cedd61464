use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Declared parameter types. They must match the routine's signature on the
/// database side, so the statement casts every placeholder explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SqlType {
    Int,
    VarChar(u32),
    Text,
    Date,
}

impl SqlType {
    fn cast(self) -> String {
        match self {
            Self::Int => "integer".to_string(),
            Self::VarChar(max) => format!("varchar({max})"),
            Self::Text => "text".to_string(),
            Self::Date => "date".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlValue {
    Null,
    Int(i32),
    Text(String),
    Date(time::Date),
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<time::Date> for SqlValue {
    fn from(value: time::Date) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub(crate) name: String,
    pub(crate) sql_type: SqlType,
    pub(crate) direction: Direction,
    pub(crate) value: SqlValue,
}

/// A named routine plus its ordered, typed parameters.
#[derive(Debug, Clone)]
pub(crate) struct ProcedureCall {
    name: String,
    params: Vec<Param>,
}

impl ProcedureCall {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Vec::new() }
    }

    pub(crate) fn input(
        mut self,
        name: impl Into<String>,
        sql_type: SqlType,
        value: impl Into<SqlValue>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            sql_type,
            direction: Direction::Input,
            value: value.into(),
        });
        self
    }

    pub(crate) fn output(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.params.push(Param {
            name: name.into(),
            sql_type,
            direction: Direction::Output,
            value: SqlValue::Null,
        });
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn params(&self) -> &[Param] {
        &self.params
    }

    pub(crate) fn inputs(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|param| param.direction == Direction::Input)
    }

    pub(crate) fn outputs(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|param| param.direction == Direction::Output)
    }

    /// Looks up a bound input value by parameter name.
    pub(crate) fn value(&self, name: &str) -> Option<&SqlValue> {
        self.inputs().find(|param| param.name.eq_ignore_ascii_case(name)).map(|param| &param.value)
    }

    /// Rejects calls that could never reach the routine intact: bad
    /// identifiers, duplicate names, mismatched values, oversize text.
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        if !is_qualified_identifier(&self.name) {
            return Err(GatewayError::InvalidCall(format!(
                "invalid procedure name: {:?}",
                self.name
            )));
        }

        for (index, param) in self.params.iter().enumerate() {
            if !is_identifier(&param.name) {
                return Err(GatewayError::InvalidCall(format!(
                    "invalid parameter name: {:?}",
                    param.name
                )));
            }

            if self.params[..index].iter().any(|prev| prev.name.eq_ignore_ascii_case(&param.name)) {
                return Err(GatewayError::InvalidCall(format!(
                    "duplicate parameter: {}",
                    param.name
                )));
            }

            match (param.sql_type, &param.value) {
                (_, SqlValue::Null) | (SqlType::Int, SqlValue::Int(_)) => {}
                (SqlType::Date, SqlValue::Date(_)) => {}
                (SqlType::Text, SqlValue::Text(_)) => {}
                (SqlType::VarChar(max), SqlValue::Text(text)) => {
                    if text.chars().count() > max as usize {
                        return Err(GatewayError::ValueTooLong { param: param.name.clone(), max });
                    }
                }
                (declared, value) => {
                    return Err(GatewayError::InvalidCall(format!(
                        "parameter {} declared as {declared:?} but bound to {value:?}",
                        param.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// `SELECT * FROM name(a => $1::integer, ...)` over the input parameters.
    pub(crate) fn statement(&self) -> String {
        let mut sql = format!("SELECT * FROM {}(", self.name);
        for (position, param) in self.inputs().enumerate() {
            if position > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{} => ${}::{}", param.name, position + 1, param.sql_type.cast());
        }
        sql.push(')');
        sql
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    value.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_qualified_identifier(value: &str) -> bool {
    match value.split_once('.') {
        Some((schema, name)) => is_identifier(schema) && is_identifier(name),
        None => is_identifier(value),
    }
}

/// One result row. Column lookups ignore case, matching how routines are
/// free to alias their output columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct Row(Map<String, Value>);

impl Row {
    pub(crate) fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    pub(crate) fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    fn key(&self, column: &str) -> Option<&String> {
        self.0
            .get_key_value(column)
            .map(|(key, _)| key)
            .or_else(|| self.0.keys().find(|key| key.eq_ignore_ascii_case(column)))
    }

    pub(crate) fn get(&self, column: &str) -> Option<&Value> {
        self.key(column).and_then(|key| self.0.get(key))
    }

    pub(crate) fn has(&self, column: &str) -> bool {
        self.key(column).is_some()
    }

    /// Non-null value rendered as text; numbers and booleans are stringified.
    pub(crate) fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    pub(crate) fn int(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(number) => {
                number.as_i64().or_else(|| number.as_f64().map(|value| value as i64))
            }
            Value::String(text) => text.trim().parse().ok(),
            Value::Bool(flag) => Some(i64::from(*flag)),
            _ => None,
        }
    }

    /// Loose truthiness: `true`, non-zero numbers and `"1"`/`"true"`.
    pub(crate) fn flag(&self, column: &str) -> bool {
        match self.get(column) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|value| value != 0.0),
            Some(Value::String(text)) => {
                matches!(text.trim().to_ascii_lowercase().as_str(), "1" | "true")
            }
            _ => false,
        }
    }

    /// Value of the leftmost column.
    pub(crate) fn first_value(&self) -> Option<&Value> {
        self.0.values().next()
    }

    pub(crate) fn remove(&mut self, column: &str) -> Option<Value> {
        let key = self.key(column)?.clone();
        self.0.shift_remove(&key)
    }
}

impl From<Value> for Row {
    /// Objects map one-to-one; any other JSON value yields an empty row.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// Every result set a call produced, in order, plus the values of any
/// declared output parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProcedureResult {
    pub(crate) record_sets: Vec<Vec<Row>>,
    pub(crate) output: Row,
}

impl ProcedureResult {
    pub(crate) fn from_sets(record_sets: Vec<Vec<Row>>) -> Self {
        Self { record_sets, output: Row::default() }
    }

    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        Self::from_sets(vec![rows])
    }

    pub(crate) fn recordset(&self) -> &[Row] {
        self.record_set(0)
    }

    pub(crate) fn record_set(&self, index: usize) -> &[Row] {
        self.record_sets.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn first_row(&self) -> Option<&Row> {
        self.recordset().first()
    }

    pub(crate) fn last_row(&self) -> Option<&Row> {
        self.recordset().last()
    }

    pub(crate) fn into_recordset(self) -> Vec<Row> {
        self.record_sets.into_iter().next().unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub(crate) enum GatewayError {
    #[error("invalid procedure call: {0}")]
    InvalidCall(String),
    #[error("value for {param} exceeds {max} characters")]
    ValueTooLong { param: String, max: u32 },
    #[error("database connection unavailable: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("procedure call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{procedure}: {message}")]
    Procedure { procedure: String, message: String, code: Option<String> },
    #[error("unexpected database failure: {0}")]
    Driver(#[source] sqlx::Error),
}

impl GatewayError {
    /// Maps a driver error raised while running `procedure`.
    pub(crate) fn from_sqlx(procedure: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self::Procedure {
                procedure: procedure.to_string(),
                message: db_err.message().to_string(),
                code: db_err.code().map(|code| code.into_owned()),
            },
            err if is_connection_failure(&err) => Self::Connection(err),
            err => Self::Driver(err),
        }
    }

    pub(crate) fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            Self::InvalidCall(_) | Self::ValueTooLong { .. } => "invalid",
            Self::Connection(_) => "connection_error",
            Self::Timeout(_) => "timeout",
            Self::Procedure { .. } => "procedure_error",
            Self::Driver(_) => "driver_error",
        }
    }
}

fn is_connection_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statement_binds_inputs_by_name_in_order() {
        let call = ProcedureCall::new("sp_update_track")
            .input("tr_id", SqlType::Int, 3)
            .input("tr_name", SqlType::VarChar(100), "Backend")
            .output("status", SqlType::Int)
            .input("manager_id", SqlType::Int, None::<i32>);

        assert_eq!(
            call.statement(),
            "SELECT * FROM sp_update_track(tr_id => $1::integer, \
             tr_name => $2::varchar(100), manager_id => $3::integer)"
        );
        assert_eq!(call.outputs().count(), 1);
        assert!(call.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unsafe_identifiers() {
        let bad_name = ProcedureCall::new("sp_x; DROP TABLE users");
        assert!(matches!(bad_name.validate(), Err(GatewayError::InvalidCall(_))));

        let bad_param = ProcedureCall::new("app.sp_x").input("a-b", SqlType::Int, 1);
        assert!(matches!(bad_param.validate(), Err(GatewayError::InvalidCall(_))));

        let empty = ProcedureCall::new("");
        assert!(empty.validate().is_err());
    }

    #[test]
    fn validate_enforces_declared_lengths_and_types() {
        let too_long = ProcedureCall::new("sp_insert_branch")
            .input("br_name", SqlType::VarChar(5), "Alexandria");
        assert!(matches!(
            too_long.validate(),
            Err(GatewayError::ValueTooLong { max: 5, .. })
        ));

        let mismatched = ProcedureCall::new("sp_delete_branch").input("br_id", SqlType::Int, "7");
        assert!(matches!(mismatched.validate(), Err(GatewayError::InvalidCall(_))));

        let duplicate = ProcedureCall::new("sp_x")
            .input("id", SqlType::Int, 1)
            .input("ID", SqlType::Int, 2);
        assert!(matches!(duplicate.validate(), Err(GatewayError::InvalidCall(_))));
    }

    #[test]
    fn row_lookup_ignores_case() {
        let row = Row::from(json!({"Message": "Branch added successfully", "Exam_ID": "12"}));
        assert_eq!(row.text("message").as_deref(), Some("Branch added successfully"));
        assert_eq!(row.int("exam_id"), Some(12));
        assert!(row.has("MESSAGE"));
        assert_eq!(row.first_value(), Some(&json!("Branch added successfully")));
    }

    #[test]
    fn row_flag_is_loose() {
        let row = Row::from(json!({"a": true, "b": 1, "c": "0", "d": null}));
        assert!(row.flag("a"));
        assert!(row.flag("b"));
        assert!(!row.flag("c"));
        assert!(!row.flag("d"));
        assert!(!row.flag("missing"));
    }

    #[test]
    fn database_errors_keep_message_and_code() {
        let err = GatewayError::from_sqlx("sp_x", sqlx::Error::PoolTimedOut);
        assert!(err.is_connection_failure());

        let err = GatewayError::from_sqlx("sp_x", sqlx::Error::RowNotFound);
        assert!(matches!(err, GatewayError::Driver(_)));
    }
}
