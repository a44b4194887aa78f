use std::{path::PathBuf, rc::Rc};

use futures::FutureExt as _;

use crate::{
    asset::{AssetHost, LoadFuture},
    error::LoadError,
    resource_system::{
        file_formats::{
            manifest::{sidecar_path, ModelManifest},
            modelspec::ModelSpec,
        },
        io_worker::FileSystemAssetHost,
    },
};

/// Produces a [`ModelSpec`] from a model path.
pub trait FormatLoader {
    fn load_spec(&self, path: &str) -> LoadFuture<ModelSpec>;
}

/// Reads a JSON manifest and its vertex and index sidecars through an asset host.
pub struct JsonModelLoader {
    host: Rc<dyn AssetHost>,
}
impl JsonModelLoader {
    pub fn new(host: Rc<dyn AssetHost>) -> Self {
        Self { host }
    }
}
impl FormatLoader for JsonModelLoader {
    fn load_spec(&self, path: &str) -> LoadFuture<ModelSpec> {
        let host = self.host.clone();
        let path = host.normalize_path(path);
        async move {
            let bytes = host.read(&path).await?;
            let manifest: ModelManifest =
                serde_json::from_slice(&bytes).map_err(|err| LoadError::json(&path, err))?;

            let vertex_path = sidecar_path(&path, &manifest.vertex_buffer);
            let index_path = sidecar_path(&path, &manifest.index_buffer);
            let (vertex_buffer, index_buffer) =
                futures::future::try_join(host.read(&vertex_path), host.read(&index_path)).await?;
            log::debug!(
                "loaded model spec {} ({} vertex bytes, {} index bytes)",
                path,
                vertex_buffer.len(),
                index_buffer.len()
            );
            Ok(manifest.into_spec(vertex_buffer, index_buffer))
        }
        .boxed_local()
    }
}

/// [`JsonModelLoader`] reading from disk on background IO threads.
pub struct FileSystemModelLoader {
    inner: JsonModelLoader,
}
impl FileSystemModelLoader {
    pub fn new(root: impl Into<PathBuf>, io_threads: usize) -> Self {
        let host = FileSystemAssetHost::with_threads(root, io_threads);
        Self {
            inner: JsonModelLoader::new(Rc::new(host)),
        }
    }
}
impl FormatLoader for FileSystemModelLoader {
    fn load_spec(&self, path: &str) -> LoadFuture<ModelSpec> {
        self.inner.load_spec(path)
    }
}
