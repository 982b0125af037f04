use crate::error::{PromBenchError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

type Binding = (PathBuf, String);

static BINDINGS: OnceLock<Mutex<HashSet<Binding>>> = OnceLock::new();

fn bindings() -> &'static Mutex<HashSet<Binding>> {
    BINDINGS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive hold on a (storage directory, address) pair, released on drop.
#[derive(Debug)]
pub(super) struct Claim {
    binding: Binding,
}

impl Drop for Claim {
    fn drop(&mut self) {
        bindings()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.binding);
    }
}

pub(super) fn claim(storage_dir: &Path, address: &str) -> Result<Claim> {
    // Two spellings of one directory must collide
    let normalized =
        std::fs::canonicalize(storage_dir).unwrap_or_else(|_| storage_dir.to_path_buf());
    let binding = (normalized, address.to_string());

    let mut guard = bindings()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if !guard.insert(binding.clone()) {
        return Err(PromBenchError::AddressInUse {
            storage_dir: storage_dir.to_path_buf(),
            address: address.to_string(),
        });
    }
    Ok(Claim { binding })
}
