use crate::Result;
use crate::settings::Settings;

/// Print or write the scrape config for the current registry contents
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Print or write the scrape config for the current registry contents

Without flags the YAML is printed to stdout. With --write it replaces the
file at PROMETHEUS_CONFIG_PATH. Nothing is written while the registry is
empty.

Examples:
  promsync config
  promsync config --write"
)]
pub struct Config {
    /// Write the config file instead of printing it
    #[clap(long, short)]
    write: bool,
}

impl Config {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor(Settings::load()?)?;
        if self.write {
            let count = supervisor.write_config_now().await?;
            println!(
                "wrote {} targets to {}",
                count,
                supervisor.settings().daemon.config_path.display()
            );
            return Ok(());
        }
        match supervisor.preview_config().await? {
            Some(yaml) => print!("{yaml}"),
            None => warn!("registry has no targets, nothing to scrape yet"),
        }
        Ok(())
    }
}
