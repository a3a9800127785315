use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::table::CommentTable;
use super::{Gateway, GatewayResponse, Request};
use crate::config::MarginaliaConfig;
use crate::error::{MarginaliaError, Result};

const DEFAULT_FILE_NAME: &str = "comments.json";

/// Gateway backed by a single JSON file holding the whole comment table.
///
/// The file has the `getAllComments/` response shape, so loads return it
/// verbatim. Saves rewrite the file atomically (tmp file + rename).
pub struct FsGateway {
    root: PathBuf,
    file_name: String,
}

impl FsGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// Gateway under `root` writing the configured `store_file`.
    pub fn from_config(root: impl Into<PathBuf>, config: &MarginaliaConfig) -> Self {
        Self::new(root).with_file_name(&config.store_file)
    }

    /// Gateway rooted in the OS-appropriate data directory.
    pub fn in_data_dir(config: &MarginaliaConfig) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "marginalia").ok_or_else(|| {
            MarginaliaError::Config("Could not determine a data directory".to_string())
        })?;
        Ok(Self::from_config(dirs.data_dir(), config))
    }

    pub fn with_file_name(mut self, name: &str) -> Self {
        self.file_name = name.to_string();
        self
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file_name)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(MarginaliaError::Io)?;
        }
        Ok(())
    }

    fn read_table(&self) -> Result<CommentTable> {
        let path = self.path();
        if !path.exists() {
            return Ok(CommentTable::default());
        }
        let content = fs::read_to_string(path).map_err(MarginaliaError::Io)?;
        if content.trim().is_empty() {
            return Ok(CommentTable::default());
        }
        serde_json::from_str(&content).map_err(MarginaliaError::Serialization)
    }

    fn write_table(&self, table: &CommentTable) -> Result<()> {
        self.ensure_dir(&self.root)?;
        let content =
            serde_json::to_string_pretty(table).map_err(MarginaliaError::Serialization)?;

        let tmp_file = self.root.join(format!(".comments-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(MarginaliaError::Io)?;
        fs::rename(&tmp_file, self.path()).map_err(MarginaliaError::Io)?;
        Ok(())
    }
}

impl Gateway for FsGateway {
    fn query(&self, request: &str) -> Result<GatewayResponse> {
        let parsed = Request::parse(request)?;
        let mut table = self
            .read_table()
            .map_err(|e| MarginaliaError::Transport(e.to_string()))?;

        let (response, changed) = table.serve(&parsed)?;
        if changed {
            self.write_table(&table)
                .map_err(|e| MarginaliaError::Transport(e.to_string()))?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;
    use crate::store::CommentStore;
    use crate::test_utils::TestEnv;

    #[test]
    fn missing_file_loads_empty_table() {
        let env = TestEnv::new();
        let response = env.gateway().query("getAllComments/").unwrap();
        let value: serde_json::Value = response.json().unwrap();
        assert!(value["comments"].as_object().unwrap().is_empty());
        assert!(!env.gateway().path().exists());
    }

    #[test]
    fn store_roundtrip_through_file() {
        let env = TestEnv::new();
        let mut store = env.store();
        let id = store
            .create_thread("a.py", "fix this".into(), Person::named("Ann"), None)
            .unwrap();
        store.try_save_comments("a.py").unwrap();

        let reloaded = env.store();
        let thread = reloaded.thread("a.py", &id).unwrap();
        assert_eq!(thread.body()[0].value, "fix this");
        assert_eq!(reloaded.latest_thread_id().as_str(), "anno/1");
    }

    #[test]
    fn custom_file_name() {
        let env = TestEnv::new();
        let gateway = env.gateway().with_file_name("notes.json");
        let save = Request::SaveComments {
            target: "a.py".into(),
            comments: r#"{"comments":[]}"#.into(),
        };
        gateway.query(&save.to_path()).unwrap();
        assert!(env.root.join("notes.json").exists());
    }

    #[test]
    fn configured_store_file_lands_on_disk() {
        let env = TestEnv::new();
        let config = MarginaliaConfig {
            store_file: "review-notes.json".to_string(),
            ..Default::default()
        };
        let gateway = FsGateway::from_config(env.root.clone(), &config);
        assert_eq!(gateway.path(), env.root.join("review-notes.json"));

        let mut store = CommentStore::new(&gateway);
        store
            .create_thread("a.py", "x".into(), Person::named("Ann"), None)
            .unwrap();
        store.try_save_comments("a.py").unwrap();

        assert!(env.root.join("review-notes.json").exists());
        assert!(!env.root.join("comments.json").exists());
    }

    #[test]
    fn corrupt_file_is_a_transport_error() {
        let env = TestEnv::new();
        fs::write(env.gateway().path(), "{broken").unwrap();
        assert!(matches!(
            env.gateway().query("getAllComments/"),
            Err(MarginaliaError::Transport(_))
        ));
    }
}
