use crate::cli::ConfigCheckArgs;
use anyhow::Context;
use mongolens::{LoggerConfig, LoggerSettings, Operation};
use std::path::Path;

/// Load settings from `path`. A missing file is an error only when `required`.
pub fn load_settings(path: &Path, required: bool) -> anyhow::Result<LoggerSettings> {
    if !required && !path.exists() {
        return Ok(LoggerSettings::default());
    }
    LoggerSettings::load(path).with_context(|| format!("failed to load {}", path.display()))
}

pub fn run_check(args: ConfigCheckArgs) -> anyhow::Result<()> {
    let settings = load_settings(&args.config, true)?;
    let config = LoggerConfig::from_settings(&settings)?;

    let explained: Vec<Operation> = Operation::ALL
        .into_iter()
        .filter(|op| config.is_explain_eligible(*op))
        .collect();

    println!("{}: ok", args.config.display());
    println!("  target:  {}", join(config.target_operations.iter().copied()));
    println!(
        "  explain: {}",
        if explained.is_empty() {
            "(none)".to_string()
        } else {
            join(explained)
        }
    );
    println!("  additional log properties: {}", settings.additional_log_properties);
    println!("  max array items: {}", settings.max_array_items);
    Ok(())
}

fn join(ops: impl IntoIterator<Item = Operation>) -> String {
    ops.into_iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_missing_file_falls_back_to_defaults() {
        let settings = load_settings(Path::new("/nonexistent/mongolens.toml"), false).unwrap();
        assert_eq!(settings, LoggerSettings::default());
    }

    #[test]
    fn required_missing_file_is_an_error() {
        let err = load_settings(Path::new("/nonexistent/mongolens.toml"), true).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load"));
    }
}
