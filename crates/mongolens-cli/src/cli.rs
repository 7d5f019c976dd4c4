use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "mongolens.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Explain,
    Config,
    ConfigCheck,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Explain(ExplainArgs),
    Config(ConfigCommand),
}

/// Where explain JSON is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ExplainArgs {
    pub input: Input,
    pub aggregate: bool,
    pub config: PathBuf,
    /// Whether `--config` was given explicitly (then the file must exist).
    pub config_explicit: bool,
    pub no_color: bool,
}

#[derive(Debug, Clone)]
pub enum ConfigCommand {
    Check(ConfigCheckArgs),
}

#[derive(Debug, Clone)]
pub struct ConfigCheckArgs {
    pub config: PathBuf,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "explain" => parse_explain(it.map(|s| s.as_str())),
        "config" => parse_config(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_config_value<'a>(
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<PathBuf>> {
    if token == "--config" {
        let Some(v) = it.next() else {
            anyhow::bail!("--config requires a value");
        };
        return Ok(Some(PathBuf::from(v)));
    }
    if let Some(v) = token.strip_prefix("--config=") {
        return Ok(Some(PathBuf::from(v)));
    }
    Ok(None)
}

fn parse_explain<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut input: Option<Input> = None;
    let mut aggregate = false;
    let mut config: Option<PathBuf> = None;
    let mut no_color = false;

    while let Some(token) = it.next() {
        if let Some(path) = parse_config_value(token, &mut it)? {
            config = Some(path);
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Explain)),
            "--aggregate" => aggregate = true,
            "--no-color" => no_color = true,
            "-" if input.is_none() => input = Some(Input::Stdin),
            _ if token.starts_with('-') => anyhow::bail!("unknown option: {token}"),
            _ if input.is_none() => input = Some(Input::File(PathBuf::from(token))),
            _ => anyhow::bail!("unexpected argument: {token}"),
        }
    }

    let Some(input) = input else {
        anyhow::bail!("explain requires an input file (or `-` for stdin)");
    };

    Ok(Command::Explain(ExplainArgs {
        input,
        aggregate,
        config_explicit: config.is_some(),
        config: config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG)),
        no_color,
    }))
}

fn parse_config<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut subcmd: Option<&str> = None;
    let mut config = PathBuf::from(DEFAULT_CONFIG);

    while let Some(token) = it.next() {
        if let Some(path) = parse_config_value(token, &mut it)? {
            config = path;
            continue;
        }
        match token {
            "-h" | "--help" => {
                return Ok(Command::Help(match subcmd {
                    None => HelpTopic::Config,
                    Some(_) => HelpTopic::ConfigCheck,
                }));
            }
            "check" if subcmd.is_none() => subcmd = Some(token),
            _ => anyhow::bail!("unexpected argument: {token}"),
        }
    }

    match subcmd {
        Some("check") => Ok(Command::Config(ConfigCommand::Check(ConfigCheckArgs { config }))),
        _ => Ok(Command::Help(HelpTopic::Config)),
    }
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
mongolens - inspect MongoDB explain output offline

USAGE:
  mongolens <COMMAND> [OPTIONS]

COMMANDS:
  explain       Classify a saved explain document
  config        Validate a mongolens.toml settings file

Run `mongolens <command> --help` for more."
            );
        }
        HelpTopic::Explain => {
            println!(
                "\
USAGE:
  mongolens explain <FILE|-> [OPTIONS]

Reads explain output as JSON (an object, or an array of pipeline stage
documents) and prints the classified winning plan.

OPTIONS:
  --aggregate           Treat an object with a `stages` array as aggregate output
  --config <FILE>       Settings file (default: mongolens.toml, if present)
  --no-color            Disable colored output
  -h, --help            Print help"
            );
        }
        HelpTopic::Config => {
            println!(
                "\
USAGE:
  mongolens config check [OPTIONS]

OPTIONS:
  --config <FILE>       Settings file (default: mongolens.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::ConfigCheck => {
            println!(
                "\
USAGE:
  mongolens config check [OPTIONS]

Loads and validates the settings file and prints the effective
target and explain operation sets.

OPTIONS:
  --config <FILE>       Settings file (default: mongolens.toml)
  -h, --help            Print help"
            );
        }
    }
}
