//! Realized WASI host state.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use wasmtime_wasi::pipe::MemoryInputPipe;
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::{
    DirPerms, FilePerms, HostOutputStream, StdoutStream, StreamError, StreamResult, Subscribe,
    WasiCtxBuilder,
};

use wasmbed_common::{OutputPolicy, WasiError};

use crate::config::{StdinSource, WasiHostConfig};
use crate::version::WasiVersion;

/// A validated, immutable WASI environment.
///
/// The environment is a template: each store gets its own WASI context from
/// [`realize`](Self::realize). Captured output from every such store lands in
/// the same buffers, which only the owner of the environment can read.
#[derive(Debug)]
pub struct WasiEnvironment {
    program_name: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    dirs: Vec<Preopen>,
    stdin: StdinSource,
    stdout: OutputSink,
    stderr: OutputSink,
    version: Option<WasiVersion>,
}

#[derive(Debug)]
struct Preopen {
    guest_path: String,
    host_path: PathBuf,
}

#[derive(Debug)]
enum OutputSink {
    Inherit,
    Ignore,
    Capture(CapturePipe),
}

/// In-memory output shared by every store realized from one environment.
///
/// `capacity` bounds the bytes written but not read yet; draining frees
/// room for later writes. A write that does not fit traps the guest and is
/// reported on the next read that finds nothing pending.
#[derive(Debug, Clone)]
struct CapturePipe {
    capacity: usize,
    state: Arc<Mutex<CaptureState>>,
}

#[derive(Debug, Default)]
struct CaptureState {
    pending: VecDeque<u8>,
    overflowed: bool,
}

impl CapturePipe {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Arc::new(Mutex::new(CaptureState::default())),
        }
    }

    fn drain_into(&self, stream: &'static str, buf: &mut [u8]) -> Result<usize, WasiError> {
        let mut state = self.state.lock();
        let len = state.pending.len().min(buf.len());
        if len == 0 && !buf.is_empty() && std::mem::take(&mut state.overflowed) {
            return Err(self.overflow(stream));
        }
        for (dst, byte) in buf.iter_mut().zip(state.pending.drain(..len)) {
            *dst = byte;
        }
        Ok(len)
    }

    fn drain_all(&self, stream: &'static str) -> Result<Vec<u8>, WasiError> {
        let mut state = self.state.lock();
        if state.pending.is_empty() && std::mem::take(&mut state.overflowed) {
            return Err(self.overflow(stream));
        }
        Ok(state.pending.drain(..).collect())
    }

    fn overflow(&self, stream: &'static str) -> WasiError {
        WasiError::CaptureOverflow {
            stream,
            capacity: self.capacity,
        }
    }

    fn full(&self, state: &mut CaptureState, wanted: usize) -> StreamError {
        state.overflowed = true;
        warn!(
            capacity = self.capacity,
            pending = state.pending.len(),
            wanted,
            "capture buffer full"
        );
        StreamError::Trap(anyhow!(
            "captured output exceeds {} unread bytes",
            self.capacity
        ))
    }
}

impl HostOutputStream for CapturePipe {
    fn write(&mut self, bytes: Bytes) -> StreamResult<()> {
        let mut state = self.state.lock();
        let free = self.capacity.saturating_sub(state.pending.len());
        if bytes.len() > free {
            return Err(self.full(&mut state, bytes.len()));
        }
        state.pending.extend(bytes.iter());
        Ok(())
    }

    fn flush(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn check_write(&mut self) -> StreamResult<usize> {
        let mut state = self.state.lock();
        match self.capacity.saturating_sub(state.pending.len()) {
            0 => Err(self.full(&mut state, 1)),
            free => Ok(free),
        }
    }
}

#[async_trait]
impl Subscribe for CapturePipe {
    async fn ready(&mut self) {}
}

impl StdoutStream for CapturePipe {
    fn stream(&self) -> Box<dyn HostOutputStream> {
        Box::new(self.clone())
    }

    fn isatty(&self) -> bool {
        false
    }
}

impl OutputSink {
    fn new(policy: OutputPolicy, capacity: usize) -> Self {
        match policy {
            OutputPolicy::Inherit => Self::Inherit,
            OutputPolicy::Ignore => Self::Ignore,
            OutputPolicy::Capture => Self::Capture(CapturePipe::new(capacity)),
        }
    }

    fn capture(&self, stream: &'static str) -> Result<&CapturePipe, WasiError> {
        match self {
            Self::Capture(pipe) => Ok(pipe),
            _ => Err(WasiError::NotCaptured { stream }),
        }
    }
}

impl WasiEnvironment {
    /// Validate and realize `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a requested directory disappeared or cannot be
    /// read since it was requested, or if capture is requested with a zero
    /// capacity.
    #[instrument(skip_all, fields(program = %config.program_name()))]
    pub fn new(config: WasiHostConfig) -> Result<Self, WasiError> {
        let capacity = config.get_capture_capacity();
        let captures = [config.stdout(), config.stderr()]
            .iter()
            .any(|policy| *policy == OutputPolicy::Capture);
        if captures && capacity == 0 {
            return Err(WasiError::initialization_failed(
                "capture buffers need a non-zero capacity",
            ));
        }

        let mut dirs = Vec::with_capacity(config.dirs().len());
        for request in config.dirs() {
            std::fs::read_dir(&request.host_path).map_err(|e| {
                WasiError::preopen_failed(request.host_path.display().to_string(), e.to_string())
            })?;
            dirs.push(Preopen {
                guest_path: request.guest_path.clone(),
                host_path: request.host_path.clone(),
            });
        }

        let environment = Self {
            program_name: config.program_name().to_string(),
            args: config.get_args().to_vec(),
            env: config
                .get_env()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            dirs,
            stdin: config.stdin().clone(),
            stdout: OutputSink::new(config.stdout(), capacity),
            stderr: OutputSink::new(config.stderr(), capacity),
            version: config.pinned_version(),
        };

        info!(
            args = environment.args.len(),
            env = environment.env.len(),
            dirs = environment.dirs.len(),
            "WASI environment created"
        );
        Ok(environment)
    }

    /// Create a WASI context for one store.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory can no longer be opened.
    pub fn realize(&self) -> Result<WasiP1Ctx, WasiError> {
        let mut builder = WasiCtxBuilder::new();
        builder.arg(&self.program_name);
        for arg in &self.args {
            builder.arg(arg);
        }
        for (key, value) in &self.env {
            builder.env(key, value);
        }

        match &self.stdin {
            StdinSource::Inherit => {
                builder.inherit_stdin();
            }
            // The builder's default stdin is already closed.
            StdinSource::Ignore => {}
            StdinSource::Bytes(bytes) => {
                builder.stdin(MemoryInputPipe::new(bytes.clone()));
            }
        }
        match &self.stdout {
            OutputSink::Inherit => {
                builder.inherit_stdout();
            }
            // The builder's default output streams discard everything.
            OutputSink::Ignore => {}
            OutputSink::Capture(pipe) => {
                builder.stdout(pipe.clone());
            }
        }
        match &self.stderr {
            OutputSink::Inherit => {
                builder.inherit_stderr();
            }
            OutputSink::Ignore => {}
            OutputSink::Capture(pipe) => {
                builder.stderr(pipe.clone());
            }
        }

        for dir in &self.dirs {
            builder
                .preopened_dir(
                    &dir.host_path,
                    &dir.guest_path,
                    DirPerms::all(),
                    FilePerms::all(),
                )
                .map_err(|e| {
                    WasiError::preopen_failed(dir.host_path.display().to_string(), format!("{e:#}"))
                })?;
        }

        debug!("WASI context realized");
        Ok(builder.build_p1())
    }

    /// Move captured stdout not read yet into `buf`.
    ///
    /// Returns the number of bytes copied, 0 once everything was read.
    /// Copied bytes no longer count against the capture capacity.
    ///
    /// # Errors
    ///
    /// Fails if stdout is not captured, or with
    /// [`WasiError::CaptureOverflow`] once the pending output is drained if a
    /// guest write was refused for lack of room since the last such report.
    pub fn read_stdout(&mut self, buf: &mut [u8]) -> Result<usize, WasiError> {
        self.stdout.capture("stdout")?.drain_into("stdout", buf)
    }

    /// Stderr counterpart of [`read_stdout`](Self::read_stdout).
    pub fn read_stderr(&mut self, buf: &mut [u8]) -> Result<usize, WasiError> {
        self.stderr.capture("stderr")?.drain_into("stderr", buf)
    }

    /// Drain all pending captured stdout.
    ///
    /// An empty result means nothing was pending. Overflow is reported the
    /// same way as by [`read_stdout`](Self::read_stdout).
    pub fn take_stdout(&mut self) -> Result<Vec<u8>, WasiError> {
        self.stdout.capture("stdout")?.drain_all("stdout")
    }

    /// Drain all pending captured stderr.
    pub fn take_stderr(&mut self) -> Result<Vec<u8>, WasiError> {
        self.stderr.capture("stderr")?.drain_all("stderr")
    }

    /// The pinned WASI version, if any.
    pub fn version(&self) -> Option<WasiVersion> {
        self.version
    }

    /// Guest paths of the exposed directories, in request order.
    pub fn guest_dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(|d| d.guest_path.as_str())
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_to(pipe: &CapturePipe, bytes: &[u8]) -> StreamResult<()> {
        let mut stream = pipe.stream();
        stream.write(Bytes::copy_from_slice(bytes))
    }

    fn stdout_pipe(env: &WasiEnvironment) -> CapturePipe {
        let OutputSink::Capture(pipe) = &env.stdout else {
            panic!("stdout should be captured");
        };
        pipe.clone()
    }

    #[test]
    fn test_zero_capacity_capture_fails() {
        let mut config = WasiHostConfig::new("prog");
        config.capture_stdout().capture_capacity(0);

        let err = WasiEnvironment::new(config).unwrap_err();
        assert!(matches!(err, WasiError::InitializationFailed { .. }));
    }

    #[test]
    fn test_zero_capacity_without_capture_is_fine() {
        let mut config = WasiHostConfig::new("prog");
        config.capture_capacity(0);

        assert!(WasiEnvironment::new(config).is_ok());
    }

    #[test]
    fn test_read_uncaptured_stream() {
        let mut env = WasiEnvironment::new(WasiHostConfig::new("prog")).unwrap();
        let mut buf = [0u8; 8];

        let err = env.read_stdout(&mut buf).unwrap_err();
        assert!(matches!(err, WasiError::NotCaptured { stream: "stdout" }));
        assert!(env.read_stderr(&mut buf).is_err());
    }

    #[test]
    fn test_read_advances_cursor() {
        let mut config = WasiHostConfig::new("prog");
        config.capture_stdout();
        let mut env = WasiEnvironment::new(config).unwrap();

        let pipe = stdout_pipe(&env);
        write_to(&pipe, b"hello world").unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(env.read_stdout(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(env.take_stdout().unwrap(), b" world");
        assert_eq!(env.read_stdout(&mut buf).unwrap(), 0);

        write_to(&pipe, b"!").unwrap();
        assert_eq!(env.read_stdout(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'!');
    }

    #[test]
    fn test_capacity_bounds_unread_bytes() {
        let mut config = WasiHostConfig::new("prog");
        config.capture_stdout().capture_capacity(12);
        let mut env = WasiEnvironment::new(config).unwrap();
        let pipe = stdout_pipe(&env);

        // Far more than the capacity passes through as long as it is drained.
        for _ in 0..10 {
            write_to(&pipe, b"hello\n").unwrap();
            write_to(&pipe, b"world\n").unwrap();
            assert_eq!(env.take_stdout().unwrap(), b"hello\nworld\n");
        }

        let mut stream = pipe.stream();
        write_to(&pipe, b"0123456789").unwrap();
        assert_eq!(stream.check_write().unwrap(), 2);
        let mut buf = [0u8; 4];
        assert_eq!(env.read_stdout(&mut buf).unwrap(), 4);
        assert_eq!(stream.check_write().unwrap(), 6);
    }

    #[test]
    fn test_overflow_is_reported_after_pending_output() {
        let mut config = WasiHostConfig::new("prog");
        config.capture_stdout().capture_capacity(12);
        let mut env = WasiEnvironment::new(config).unwrap();
        let pipe = stdout_pipe(&env);

        write_to(&pipe, b"0123456789").unwrap();
        assert!(matches!(write_to(&pipe, b"abc"), Err(StreamError::Trap(_))));

        // What fit is still delivered, then the loss is reported once.
        assert_eq!(env.take_stdout().unwrap(), b"0123456789");
        let err = env.take_stdout().unwrap_err();
        assert!(matches!(
            err,
            WasiError::CaptureOverflow {
                stream: "stdout",
                capacity: 12
            }
        ));
        assert!(err.is_fatal());
        assert_eq!(env.take_stdout().unwrap(), b"");

        write_to(&pipe, b"0123456789ab").unwrap();
        assert!(matches!(pipe.stream().check_write(), Err(StreamError::Trap(_))));
        let mut buf = [0u8; 16];
        assert_eq!(env.read_stdout(&mut buf).unwrap(), 12);
        assert!(env.read_stdout(&mut buf).is_err());
        assert_eq!(env.read_stdout(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_directory_removed_before_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::create_dir(&path).unwrap();

        let mut config = WasiHostConfig::new("prog");
        assert!(config.map_dir("/data", &path));
        std::fs::remove_dir(&path).unwrap();

        let err = WasiEnvironment::new(config).unwrap_err();
        assert!(matches!(err, WasiError::PreopenFailed { .. }));
    }

    #[test]
    fn test_realize_each_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WasiHostConfig::new("prog");
        config.arg("--flag").env("A", "1").stdin_bytes(b"in".to_vec());
        assert!(config.map_dir("/data", dir.path()));

        let env = WasiEnvironment::new(config).unwrap();
        assert!(env.realize().is_ok());
        assert!(env.realize().is_ok());
        assert_eq!(env.guest_dirs().collect::<Vec<_>>(), ["/data"]);
        assert_eq!(env.args(), ["--flag"]);
    }
}
