use std::path::PathBuf;

use crossbeam::channel::{Receiver, Sender};
use futures::{channel::oneshot, FutureExt as _};

use crate::{
    asset::{normalize_path, AssetHost, LoadFuture},
    error::LoadError,
};

pub enum IoRequest {
    ReadFile {
        path: PathBuf,
        reply: oneshot::Sender<std::io::Result<Vec<u8>>>,
    },
}

fn worker_loop(rx: Receiver<IoRequest>) {
    while let Ok(request) = rx.recv() {
        match request {
            IoRequest::ReadFile { path, reply } => {
                log::trace!("io worker reading {}", path.display());
                // the caller may have dropped its future
                let _ = reply.send(std::fs::read(&path));
            }
        }
    }
}

/// Blocking file reads on background threads, answered through futures.
pub struct IoWorkerPool {
    sender: Option<Sender<IoRequest>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}
impl IoWorkerPool {
    pub fn new(threads: usize) -> Self {
        let (req_tx, req_rx) = crossbeam::channel::unbounded::<IoRequest>();
        let workers = (0..threads.max(1))
            .map(|_| {
                let rx = req_rx.clone();
                std::thread::spawn(move || worker_loop(rx))
            })
            .collect();
        Self {
            sender: Some(req_tx),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues a read of `path`; `name` is the asset path used in errors.
    pub fn read(&self, path: PathBuf, name: &str) -> LoadFuture<Vec<u8>> {
        let name = name.to_string();
        let (reply, response) = oneshot::channel();
        let queued = self
            .sender
            .as_ref()
            .map(|sender| sender.send(IoRequest::ReadFile { path, reply }).is_ok())
            .unwrap_or(false);

        async move {
            if !queued {
                return Err(LoadError::WorkerGone(name));
            }
            match response.await {
                Ok(result) => result.map_err(|err| LoadError::io(&name, err)),
                Err(oneshot::Canceled) => Err(LoadError::WorkerGone(name)),
            }
        }
        .boxed_local()
    }
}
impl Drop for IoWorkerPool {
    fn drop(&mut self) {
        // closing the channel ends every worker loop
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Reads assets below a root directory on an [`IoWorkerPool`]. Keys are
/// normalized, so the files on disk are expected to use lowercase names.
pub struct FileSystemAssetHost {
    root: PathBuf,
    pool: IoWorkerPool,
}
impl FileSystemAssetHost {
    pub fn new(root: impl Into<PathBuf>, pool: IoWorkerPool) -> Self {
        Self {
            root: root.into(),
            pool,
        }
    }

    pub fn with_threads(root: impl Into<PathBuf>, io_threads: usize) -> Self {
        Self::new(root, IoWorkerPool::new(io_threads))
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(normalize_path(path))
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }
}
impl AssetHost for FileSystemAssetHost {
    fn read(&self, path: &str) -> LoadFuture<Vec<u8>> {
        self.pool.read(self.resolve(path), path)
    }
}
