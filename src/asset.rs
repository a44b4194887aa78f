use std::{cell::RefCell, collections::HashMap};

use futures::{future::LocalBoxFuture, FutureExt as _};

use crate::error::LoadError;

/// Boxed, single-threaded future returned by every asset collaborator.
pub type LoadFuture<T> = LocalBoxFuture<'static, Result<T, LoadError>>;

/// Normalizes an asset path into the key used for caching.
///
/// Asset paths are case-insensitive and may use either separator, so
/// `Creature\Wolf\Wolf.m2` and `creature/wolf//wolf.m2` share one key.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .to_lowercase()
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

pub trait AssetHost {
    fn read(&self, path: &str) -> LoadFuture<Vec<u8>>;

    fn normalize_path(&self, path: &str) -> String {
        normalize_path(path)
    }
}

/// In-memory host for tests and embedded assets.
#[derive(Default)]
pub struct MemoryAssetHost {
    files: RefCell<HashMap<String, Vec<u8>>>,
}
impl MemoryAssetHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.files.borrow_mut().insert(normalize_path(path), data);
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow_mut().remove(&normalize_path(path))
    }
}
impl AssetHost for MemoryAssetHost {
    fn read(&self, path: &str) -> LoadFuture<Vec<u8>> {
        let result = self
            .files
            .borrow()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()));
        async move { result }.boxed_local()
    }
}
