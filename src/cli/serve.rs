use crate::Result;
use crate::settings::Settings;
use crate::web;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;

/// Runs the supervisor in the foreground
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Runs the supervisor in the foreground

Writes the scrape config from the current registry contents, starts the
change monitor and serves the JSON control API until SIGINT or SIGTERM.
On shutdown the monitor is stopped first, then the daemon.

Examples:
  promsync serve                  Monitor and serve the API on :5000
  promsync serve --start          Also start the daemon right away
  promsync serve --no-monitor     Only serve the API
  promsync serve --web-port 8080  Serve the API on another port"
)]
pub struct Serve {
    /// Start the daemon immediately
    #[clap(long)]
    start: bool,
    /// Do not run the change monitor loop
    #[clap(long)]
    no_monitor: bool,
    /// Port for the control API (overrides PROMSYNC_WEB_PORT)
    #[clap(long)]
    web_port: Option<u16>,
}

impl Serve {
    pub async fn run(&self) -> Result<()> {
        let mut settings = Settings::load()?;
        if let Some(port) = self.web_port {
            settings.web.port = port;
        }
        let host = settings.web.host.clone();
        let port = settings.web.port;
        let supervisor = super::supervisor(settings)?;

        if let Err(e) = supervisor.prime().await {
            warn!("could not write the initial scrape config: {e}");
        }
        if self.start
            && let Err(e) = supervisor.start().await
        {
            error!("{}", e.detailed_message());
        }
        if !self.no_monitor {
            supervisor.start_monitoring().await;
        }

        let served = web::serve(supervisor.clone(), &host, port, shutdown_signal()).await;
        info!("shutting down");
        supervisor.close().await;
        served
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to register signal handler for SIGTERM: {e}");
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to wait for ctrl-c: {}", e);
        }
    }
    info!("received signal, stopping");
}
