mod cli;
mod config_cmd;
mod explain_cmd;

pub fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Explain(args) => explain_cmd::run(args),
        cli::Command::Config(cmd) => match cmd {
            cli::ConfigCommand::Check(args) => config_cmd::run_check(args),
        },
    }
}
