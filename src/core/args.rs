use clap::Parser;
use log::kv::{ToValue, Value};

/// Interactive tabular data dashboard service.
#[derive(Parser, Debug, PartialEq)]
#[command(version, about)]
pub struct CliArgs {
    /// Path to a TOML config file.
    #[arg(short, long)]
    pub config: Option<String>,
}

impl ToValue for CliArgs {
    fn to_value(&self) -> Value<'_> {
        Value::from_debug(self)
    }
}
