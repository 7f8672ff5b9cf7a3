use super::Registry;
use crate::error::RegistryError;
use crate::target::Target;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process registry whose contents can be swapped at runtime.
///
/// Useful for embedding the supervisor and in tests; `set_unavailable` makes the next
/// fetches fail like an unreachable database would.
#[derive(Default)]
pub struct MemoryRegistry {
    targets: Mutex<Vec<Target>>,
    unavailable: Mutex<Option<String>>,
    fetches: AtomicU64,
}

impl MemoryRegistry {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: Mutex::new(targets),
            ..Default::default()
        }
    }

    pub fn set_targets(&self, targets: Vec<Target>) {
        *self.targets.lock().unwrap_or_else(|p| p.into_inner()) = targets;
    }

    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.lock().unwrap_or_else(|p| p.into_inner()) = reason.map(str::to_string);
    }

    /// Number of fetches served so far, successful or not.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Registry for MemoryRegistry {
    async fn fetch_targets(&self) -> Result<Vec<Target>, RegistryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &*self.unavailable.lock().unwrap_or_else(|p| p.into_inner()) {
            return Err(RegistryError::Offline {
                reason: reason.clone(),
            });
        }
        Ok(self
            .targets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
