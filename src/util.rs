use serde::{Deserialize, Deserializer, Serializer};
use time::{macros::format_description, Date, OffsetDateTime};

pub fn serialize_datetime<S>(x: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u64((x.unix_timestamp_nanos() / 1_000_000) as u64)
}

pub fn serialize_date<S>(x: &Date, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let date = x
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(serde::ser::Error::custom)?;
    s.serialize_str(&date)
}

pub fn deserialize_date<'de, D>(d: D) -> Result<Date, D::Error>
where
    D: Deserializer<'de>,
{
    let x = String::deserialize(d)?;
    parse_date(&x).ok_or_else(|| serde::de::Error::custom(format!("Invalid date '{}'", x)))
}

/// Parses a `YYYY-MM-DD` date. A trailing `T...` time component is ignored.
pub fn parse_date(x: &str) -> Option<Date> {
    let x = x.trim();
    let day = x.split_once('T').map_or(x, |(day, _)| day);
    Date::parse(day, format_description!("[year]-[month]-[day]")).ok()
}
