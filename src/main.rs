use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "rusty-sfg")]
#[command(about = "Runs the processing steps of SFG pipeline configs in order")]
struct Cli {
    /// Pipeline config files, run one after the other
    #[arg(required = true)]
    configs: Vec<PathBuf>,

    /// Log selection and table details
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    for config in &cli.configs {
        info!("****New Config**** {}", config.display());
        rusty_sfg::pipeline::run_file(config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn configs_are_required() {
        assert!(Cli::try_parse_from(["rusty-sfg"]).is_err());
        let cli = Cli::try_parse_from(["rusty-sfg", "--debug", "a.json", "b.json"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.configs, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }
}
