use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Decimal;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::core::time::{format_offset, format_primitive};
use crate::db::procedure::Row;

pub(super) const REFCURSOR: &str = "REFCURSOR";

pub(super) fn decode_rows(rows: &[PgRow]) -> Result<Vec<Row>, sqlx::Error> {
    rows.iter().map(decode_row).collect()
}

pub(super) fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let mut columns = Map::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        columns.insert(column.name().to_string(), value);
    }
    Ok(Row::new(columns))
}

/// Cursor names when every column of the primary result is a refcursor,
/// i.e. the routine hands back its result sets as cursors.
pub(super) fn cursor_names(rows: &[PgRow]) -> Result<Option<Vec<String>>, sqlx::Error> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    if first.columns().is_empty()
        || !first.columns().iter().all(|column| column.type_info().name() == REFCURSOR)
    {
        return Ok(None);
    }

    let mut names = Vec::new();
    for row in rows {
        for index in 0..row.len() {
            if let Some(name) = row.try_get_unchecked::<Option<String>, _>(index)? {
                names.push(name);
            }
        }
    }
    Ok(Some(names))
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => float(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => float(row.try_get::<f64, _>(index)?),
        "NUMERIC" => {
            let decimal = row.try_get::<Decimal, _>(index)?;
            match i64::try_from(decimal) {
                Ok(whole) if decimal.fract().is_zero() => Value::from(whole),
                _ => decimal.to_string().parse::<f64>().map(float).unwrap_or(Value::Null),
            }
        }
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CITEXT" => {
            Value::String(row.try_get_unchecked::<String, _>(index)?)
        }
        REFCURSOR => Value::String(row.try_get_unchecked::<String, _>(index)?),
        "DATE" => Value::String(row.try_get::<time::Date, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<time::Time, _>(index)?.to_string()),
        "TIMESTAMP" => Value::String(format_primitive(row.try_get(index)?)),
        "TIMESTAMPTZ" => Value::String(format_offset(row.try_get(index)?)),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        other => {
            tracing::debug!(column_type = other, "Unsupported column type decoded as null");
            Value::Null
        }
    };

    Ok(value)
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
