use crate::Result;
use anyhow::Context;
use time::{Date, PrimitiveDateTime, Time, macros::format_description};

pub(crate) fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("Cannot parse '{}' as time::Date", value))
}

pub(crate) fn parse_time(value: &str) -> Result<Time> {
    Time::parse(
        value,
        format_description!("[hour]:[minute]:[second].[subsecond]"),
    )
    .or(Time::parse(
        value,
        format_description!("[hour]:[minute]:[second]"),
    ))
    .or(Time::parse(value, format_description!("[hour]:[minute]")))
    .with_context(|| format!("Cannot parse '{}' as time::Time", value))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    )
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ))
    .with_context(|| format!("Cannot parse '{}' as time::PrimitiveDateTime", value))
}

/// Text form used when a driver stores a date as a string.
pub fn format_date(value: &Date) -> Result<String> {
    Ok(value.format(format_description!("[year]-[month]-[day]"))?)
}

/// Text form used when a driver stores a time as a string.
pub fn format_time(value: &Time) -> Result<String> {
    Ok(if value.nanosecond() == 0 {
        value.format(format_description!("[hour]:[minute]:[second]"))?
    } else {
        value.format(format_description!("[hour]:[minute]:[second].[subsecond]"))?
    })
}

/// Text form used when a driver stores a timestamp as a string.
pub fn format_timestamp(value: &PrimitiveDateTime) -> Result<String> {
    Ok(if value.nanosecond() == 0 {
        value.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))?
    } else {
        value.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"
        ))?
    })
}
