//! Demo tools offered with `--tools`

use indexmap::IndexMap;
use jiff::Zoned;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde_json::{Map, Value, json};
use switchboard_llm::{ToolCatalog, ToolDescriptor, ToolError, ToolParameter};

pub fn catalog() -> ToolCatalog {
    let current_time = ToolDescriptor::from_fn(
        "Clock",
        "current_time",
        "Current date and time, optionally in an IANA time zone",
        |args| async move { current_time(&args) },
    )
    .with_parameter(ToolParameter::optional(
        "timezone",
        "string",
        "IANA time zone such as Europe/Oslo",
        Some(json!("UTC")),
    ));

    let day_of_week = ToolDescriptor::from_fn(
        "Calendar",
        "day_of_week",
        "Weekday of a calendar date",
        |args| async move { day_of_week(&args) },
    )
    .with_parameter(ToolParameter::required("date", "string", "Date as YYYY-MM-DD"));

    let mut tools = IndexMap::new();
    tools.insert("Clock".to_owned(), vec![current_time]);
    tools.insert("Calendar".to_owned(), vec![day_of_week]);
    tools
}

fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{name}' must be a string")))
}

fn current_time(args: &Map<String, Value>) -> Result<Value, ToolError> {
    let zone = string_arg(args, "timezone")?;
    let tz = TimeZone::get(zone).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    Ok(json!(Zoned::now().with_time_zone(tz).to_string()))
}

fn day_of_week(args: &Map<String, Value>) -> Result<Value, ToolError> {
    let date: Date = string_arg(args, "date")?
        .parse()
        .map_err(|e: jiff::Error| ToolError::InvalidArguments(e.to_string()))?;

    Ok(json!(format!("{:?}", date.weekday())))
}
