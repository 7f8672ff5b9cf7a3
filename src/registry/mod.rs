//! Read-only access to the registry of monitored targets.
//!
//! Every call to [`Registry::fetch_targets`] is self-contained: readers hold no
//! connection between calls, so an outage only fails the poll that hit it.

mod file;
mod memory;
pub(crate) mod postgres;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;
pub use postgres::PgRegistry;

use crate::error::RegistryError;
use crate::target::Target;

#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Current target set. An empty registry is `Ok(vec![])`, never an error.
    async fn fetch_targets(&self) -> Result<Vec<Target>, RegistryError>;

    /// Short description for log lines, without credentials.
    fn describe(&self) -> String;
}
