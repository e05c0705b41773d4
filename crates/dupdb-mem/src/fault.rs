use dupdb_core::{HostError, HostErrorKind, HostResult};
use parking_lot::Mutex;

#[derive(Debug)]
struct WriteFault {
    store: String,
    skip: usize,
}

/// Scripted write failures.
///
/// A fault armed for a store lets `skip` writes through and fails the next
/// one with an `Unknown` host error. Puts, adds, deletes, clears and cursor
/// deletes all count as writes.
#[derive(Debug, Default)]
pub struct FaultPlan {
    writes: Mutex<Vec<WriteFault>>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the write to `store` that follows `skip` successful ones.
    pub fn fail_write(&self, store: &str, skip: usize) {
        self.writes.lock().push(WriteFault {
            store: store.to_string(),
            skip,
        });
    }

    /// Disarm every pending fault.
    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    pub fn pending(&self) -> usize {
        self.writes.lock().len()
    }

    pub(crate) fn check_write(&self, store: &str) -> HostResult<()> {
        let mut writes = self.writes.lock();
        let Some(at) = writes.iter().position(|fault| fault.store == store) else {
            return Ok(());
        };
        if writes[at].skip > 0 {
            writes[at].skip -= 1;
            return Ok(());
        }
        writes.remove(at);
        tracing::debug!("Injected write fault on store {}", store);
        Err(HostError::new(
            HostErrorKind::Unknown,
            format!("injected write fault on store {}", store),
        ))
    }
}
