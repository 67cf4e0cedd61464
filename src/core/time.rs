use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn now_rfc3339() -> String {
    format_offset(OffsetDateTime::now_utc())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, keeping only the date.
pub(crate) fn parse_date(value: &str) -> Option<time::Date> {
    let value = value.trim();
    let calendar = time::macros::format_description!("[year]-[month]-[day]");
    time::Date::parse(value, calendar)
        .ok()
        .or_else(|| OffsetDateTime::parse(value, &Rfc3339).ok().map(|parsed| parsed.date()))
}
