//! Builder for the host side of WASI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use wasmbed_common::{DEFAULT_CAPTURE_CAPACITY, OutputPolicy, WasiError, WasiSettings};

use crate::version::WasiVersion;

/// Where the guest's stdin comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StdinSource {
    /// Read the host process stdin.
    #[default]
    Inherit,
    /// Behave as an empty, closed stream.
    Ignore,
    /// Serve a fixed byte sequence, then end of file.
    Bytes(Vec<u8>),
}

/// A host directory the guest may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRequest {
    /// Path as seen by the guest.
    pub guest_path: String,
    /// Directory on the host.
    pub host_path: PathBuf,
}

/// WASI host configuration.
///
/// Consumed by [`WasiEnvironment::new`](crate::WasiEnvironment::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WasiHostConfig {
    program_name: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    dirs: Vec<DirRequest>,
    stdin: StdinSource,
    stdout: OutputPolicy,
    stderr: OutputPolicy,
    version: Option<WasiVersion>,
    capture_capacity: usize,
}

impl WasiHostConfig {
    /// Start a configuration for `program_name`, which becomes `argv[0]`.
    ///
    /// Every stream inherits the host's by default.
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            dirs: Vec::new(),
            stdin: StdinSource::Inherit,
            stdout: OutputPolicy::Inherit,
            stderr: OutputPolicy::Inherit,
            version: None,
            capture_capacity: DEFAULT_CAPTURE_CAPACITY,
        }
    }

    /// Append an argument.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable, replacing an earlier value.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Expose `host_path` to the guest under the same path.
    ///
    /// Returns `false`, recording nothing, if the path is not an existing
    /// directory.
    pub fn preopen_dir(&mut self, host_path: impl AsRef<Path>) -> bool {
        let host_path = host_path.as_ref();
        let guest_path = host_path.to_string_lossy().into_owned();
        self.request_dir(guest_path, host_path)
    }

    /// Expose `host_path` to the guest as `alias`.
    ///
    /// Returns `false`, recording nothing, if the path is not an existing
    /// directory.
    pub fn map_dir(&mut self, alias: impl Into<String>, host_path: impl AsRef<Path>) -> bool {
        self.request_dir(alias.into(), host_path.as_ref())
    }

    fn request_dir(&mut self, guest_path: String, host_path: &Path) -> bool {
        if !host_path.is_dir() {
            warn!(path = %host_path.display(), "directory request rejected: not a directory");
            return false;
        }
        self.dirs.push(DirRequest {
            guest_path,
            host_path: host_path.to_path_buf(),
        });
        true
    }

    pub fn inherit_stdin(&mut self) -> &mut Self {
        self.stdin = StdinSource::Inherit;
        self
    }

    pub fn ignore_stdin(&mut self) -> &mut Self {
        self.stdin = StdinSource::Ignore;
        self
    }

    /// Serve `bytes` as the guest's stdin.
    pub fn stdin_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.stdin = StdinSource::Bytes(bytes.into());
        self
    }

    pub fn inherit_stdout(&mut self) -> &mut Self {
        self.stdout = OutputPolicy::Inherit;
        self
    }

    /// Collect stdout for [`WasiEnvironment::read_stdout`](crate::WasiEnvironment::read_stdout).
    pub fn capture_stdout(&mut self) -> &mut Self {
        self.stdout = OutputPolicy::Capture;
        self
    }

    pub fn ignore_stdout(&mut self) -> &mut Self {
        self.stdout = OutputPolicy::Ignore;
        self
    }

    pub fn inherit_stderr(&mut self) -> &mut Self {
        self.stderr = OutputPolicy::Inherit;
        self
    }

    /// Collect stderr for [`WasiEnvironment::read_stderr`](crate::WasiEnvironment::read_stderr).
    pub fn capture_stderr(&mut self) -> &mut Self {
        self.stderr = OutputPolicy::Capture;
        self
    }

    pub fn ignore_stderr(&mut self) -> &mut Self {
        self.stderr = OutputPolicy::Ignore;
        self
    }

    /// Resolve imports for `version` instead of the version detected from
    /// each module.
    pub fn version(&mut self, version: WasiVersion) -> &mut Self {
        self.version = Some(version);
        self
    }

    /// Upper bound in bytes of each capture buffer.
    pub fn capture_capacity(&mut self, bytes: usize) -> &mut Self {
        self.capture_capacity = bytes;
        self
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn dirs(&self) -> &[DirRequest] {
        &self.dirs
    }

    pub fn stdin(&self) -> &StdinSource {
        &self.stdin
    }

    pub fn stdout(&self) -> OutputPolicy {
        self.stdout
    }

    pub fn stderr(&self) -> OutputPolicy {
        self.stderr
    }

    pub fn pinned_version(&self) -> Option<WasiVersion> {
        self.version
    }

    pub fn get_capture_capacity(&self) -> usize {
        self.capture_capacity
    }

    /// Build a configuration from its serializable form.
    ///
    /// # Errors
    ///
    /// A directory that does not exist is an error here rather than a
    /// `false` return.
    pub fn from_settings(settings: &WasiSettings) -> Result<Self, WasiError> {
        let mut config = Self::new(settings.program_name.clone());
        config
            .args(settings.args.iter().cloned())
            .capture_capacity(settings.capture_capacity);
        for (key, value) in &settings.env {
            config.env(key.clone(), value.clone());
        }

        for path in &settings.preopen_dirs {
            if !config.preopen_dir(path) {
                return Err(WasiError::preopen_failed(path.clone(), "not a directory"));
            }
        }
        for mapped in &settings.map_dirs {
            if !config.map_dir(mapped.alias.clone(), &mapped.host_path) {
                return Err(WasiError::preopen_failed(
                    mapped.host_path.clone(),
                    "not a directory",
                ));
            }
        }

        if !settings.inherit_stdin {
            config.ignore_stdin();
        }
        config.stdout = settings.stdout;
        config.stderr = settings.stderr;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmbed_common::MappedDir;

    #[test]
    fn test_defaults() {
        let config = WasiHostConfig::new("prog");

        assert_eq!(config.program_name(), "prog");
        assert_eq!(config.stdin(), &StdinSource::Inherit);
        assert_eq!(config.stdout(), OutputPolicy::Inherit);
        assert_eq!(config.stderr(), OutputPolicy::Inherit);
        assert_eq!(config.get_capture_capacity(), DEFAULT_CAPTURE_CAPACITY);
        assert!(config.pinned_version().is_none());
    }

    #[test]
    fn test_env_last_write_wins() {
        let mut config = WasiHostConfig::new("prog");
        config.env("A", "1").env("B", "2").env("A", "3");

        assert_eq!(config.get_env().len(), 2);
        assert_eq!(config.get_env()["A"], "3");
    }

    #[test]
    fn test_args_keep_order() {
        let mut config = WasiHostConfig::new("prog");
        config.arg("--flag").args(["a", "b"]);

        assert_eq!(config.get_args(), ["--flag", "a", "b"]);
    }

    #[test]
    fn test_stream_policy_last_call_wins() {
        let mut config = WasiHostConfig::new("prog");
        config.capture_stdout().inherit_stdout();
        config.inherit_stderr().capture_stderr();

        assert_eq!(config.stdout(), OutputPolicy::Inherit);
        assert_eq!(config.stderr(), OutputPolicy::Capture);

        config.stdin_bytes(b"input".to_vec());
        assert_eq!(config.stdin(), &StdinSource::Bytes(b"input".to_vec()));
    }

    #[test]
    fn test_preopen_missing_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let mut config = WasiHostConfig::new("prog");
        assert!(!config.preopen_dir(&missing));
        assert!(!config.map_dir("/data", &missing));
        assert!(config.dirs().is_empty());
    }

    #[test]
    fn test_preopen_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let mut config = WasiHostConfig::new("prog");
        assert!(!config.preopen_dir(file.path()));
    }

    #[test]
    fn test_preopen_and_map_dir() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = WasiHostConfig::new("prog");
        assert!(config.preopen_dir(dir.path()));
        assert!(config.map_dir("/data", dir.path()));

        let dirs = config.dirs();
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0].guest_path, dir.path().to_string_lossy());
        assert_eq!(dirs[1].guest_path, "/data");
        assert_eq!(dirs[1].host_path, dir.path());
    }

    #[test]
    fn test_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WasiSettings {
            program_name: "tool".into(),
            args: vec!["--flag".into()],
            env: BTreeMap::from([("A".into(), "1".into())]),
            map_dirs: vec![MappedDir {
                alias: "/data".into(),
                host_path: dir.path().to_string_lossy().into_owned(),
            }],
            inherit_stdin: false,
            stdout: OutputPolicy::Capture,
            ..Default::default()
        };

        let config = WasiHostConfig::from_settings(&settings).unwrap();
        assert_eq!(config.program_name(), "tool");
        assert_eq!(config.get_args(), ["--flag"]);
        assert_eq!(config.get_env()["A"], "1");
        assert_eq!(config.dirs().len(), 1);
        assert_eq!(config.stdin(), &StdinSource::Ignore);
        assert_eq!(config.stdout(), OutputPolicy::Capture);
    }

    #[test]
    fn test_from_settings_missing_dir() {
        let settings = WasiSettings {
            preopen_dirs: vec!["/definitely/not/here".into()],
            ..Default::default()
        };

        let err = WasiHostConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, WasiError::PreopenFailed { .. }));
    }
}
