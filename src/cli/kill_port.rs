use crate::Result;
use crate::error::SyncError;
use crate::port::PortReclaimer;
use crate::settings::Settings;

/// Terminate whatever process holds the daemon's port
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Terminate whatever process holds the daemon's port

Each holder gets SIGTERM, then SIGKILL if it is still alive after the
grace period. This process is never signalled.

Examples:
  promsync kill-port              Free PROMETHEUS_PORT (9090 by default)
  promsync kill-port --port 9091"
)]
pub struct KillPort {
    /// Port to free (defaults to the daemon's listen port)
    #[clap(long, short)]
    port: Option<u16>,
}

impl KillPort {
    pub async fn run(&self) -> Result<()> {
        let settings = Settings::load()?;
        let port = self.port.unwrap_or(settings.daemon.listen_port);
        let reclaimer = PortReclaimer::new(settings.reclaim_grace(), settings.reclaim_settle());
        let outcome = reclaimer.reclaim(port).await;
        if !outcome.is_free() {
            return Err(SyncError::PortReclaimFailed {
                port,
                reason: outcome.message(port),
            }
            .into());
        }
        println!("{}", outcome.message(port));
        Ok(())
    }
}
