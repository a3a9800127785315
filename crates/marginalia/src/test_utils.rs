use crate::gateway::fs::FsGateway;
use crate::store::CommentStore;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestEnv {
    // Kept so the directory lives as long as the test
    pub _temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn gateway(&self) -> FsGateway {
        FsGateway::new(self.root.clone())
    }

    /// A fresh store over this environment's directory, loaded from disk.
    pub fn store(&self) -> CommentStore<FsGateway> {
        CommentStore::connect(self.gateway())
    }
}
