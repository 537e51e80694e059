use serde::{self, Deserialize, Deserializer, Serializer};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

/// Parses the timestamps the API returns.
///
/// Handles RFC 3339 (`2024-03-01T10:15:30-08:00`) and, assuming UTC, local
/// datetimes with or without fractional seconds.
pub fn parse_datetime(datetime_str: &str) -> Result<OffsetDateTime, String> {
    let datetime_str = datetime_str.trim();
    if let Ok(dt) = OffsetDateTime::parse(datetime_str, &Rfc3339) {
        return Ok(dt);
    }

    // e.g. "2024-03-01T10:15:30.123"
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    if let Ok(dt) = PrimitiveDateTime::parse(datetime_str, &format) {
        return Ok(dt.assume_utc());
    }

    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(datetime_str, &format) {
        return Ok(dt.assume_utc());
    }

    Err(format!("Failed to parse datetime '{datetime_str}': no matching format"))
}

/// Parses a `YYYY-MM-DD` date, ignoring any time component.
pub fn parse_date(date_str: &str) -> Result<Date, String> {
    let date_part = date_str.trim().split('T').next().unwrap_or_default();
    Date::parse(date_part, &format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("Failed to parse date '{date_str}': {e}"))
}

/// Formats a date the way report parameters expect it, `YYYY-MM-DD`.
pub fn format_date(date: Date) -> Result<String, time::error::Format> {
    date.format(&format_description!("[year]-[month]-[day]"))
}

pub fn format_datetime(datetime: OffsetDateTime) -> Result<String, time::error::Format> {
    datetime.format(&Rfc3339)
}

pub mod qbo_date_format {
    use super::{Date, Deserialize, Deserializer, Serializer, format_date, parse_date, serde};

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = format_date(*date).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let date_str = String::deserialize(deserializer)?;
        parse_date(&date_str).map_err(serde::de::Error::custom)
    }
}

pub mod qbo_datetime_format {
    use super::{
        Deserialize, Deserializer, OffsetDateTime, Serializer, format_datetime, parse_datetime,
        serde,
    };

    pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = format_datetime(*datetime).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let datetime_str = String::deserialize(deserializer)?;
        parse_datetime(&datetime_str).map_err(serde::de::Error::custom)
    }

    // Lenient: an unparseable timestamp becomes `None` rather than failing
    // the whole response.
    pub mod option {
        use super::{
            Deserialize, Deserializer, OffsetDateTime, Serializer, format_datetime,
            parse_datetime, serde,
        };

        #[allow(clippy::ref_option)]
        pub fn serialize<S>(
            datetime: &Option<OffsetDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match datetime {
                Some(dt) => {
                    let formatted = format_datetime(*dt).map_err(serde::ser::Error::custom)?;
                    serializer.serialize_str(&formatted)
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt = Option::<String>::deserialize(deserializer)?;
            Ok(opt
                .filter(|s| !s.is_empty())
                .and_then(|s| parse_datetime(&s).ok()))
        }
    }
}
