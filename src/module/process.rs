//! Modules that run as external programs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use uuid::Uuid;

use super::traits::{CollectionModule, ModuleContext, ModuleError};
use crate::config::{ModuleSpec, RuntimeConfig};
use crate::platform::PlatformDescriptor;

/// Environment variable carrying the execution unit id.
pub const UNIT_ID_ENV: &str = "BITCOLLECTOR_UNIT_ID";
/// Environment variable carrying the framework root directory.
pub const ROOT_ENV: &str = "BITCOLLECTOR_ROOT";
/// Environment variable carrying the module name.
pub const MODULE_ENV: &str = "BITCOLLECTOR_MODULE";

/// JSON document written to the program's stdin.
#[derive(Debug, Serialize)]
struct ProcessContext<'a> {
    unit_id: Uuid,
    framework_root: &'a Path,
    runtime_config: &'a RuntimeConfig,
    platform: &'a PlatformDescriptor,
    module: &'a ModuleSpec,
}

/// A module implemented by an executable found on a search path.
///
/// The program receives its context as JSON on stdin. Each line it prints
/// is logged under the module's name: stdout at info, stderr at warning.
/// Its exit status is the result code.
#[derive(Debug, Clone)]
pub struct ProcessModule {
    name: String,
    program: PathBuf,
}

impl ProcessModule {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    /// Path of the executable.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait::async_trait]
impl CollectionModule for ProcessModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ModuleContext) -> Result<i32, ModuleError> {
        let payload = serde_json::to_vec(&ProcessContext {
            unit_id: ctx.unit_id,
            framework_root: &ctx.framework_root,
            runtime_config: &ctx.config,
            platform: &ctx.platform,
            module: &ctx.spec,
        })
        .map_err(|e| ModuleError::Context {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        let mut child = Command::new(&self.program)
            .env(UNIT_ID_ENV, ctx.unit_id.to_string())
            .env(ROOT_ENV, &ctx.framework_root)
            .env(MODULE_ENV, &ctx.spec.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ModuleError::Launch {
                name: self.name.clone(),
                source,
            })?;

        tracing::debug!(
            module = %self.name,
            program = %self.program.display(),
            pid = child.id(),
            "Module process spawned"
        );

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log = &ctx.logger;

        let (input, (), (), status) = tokio::join!(
            write_context(stdin, &payload),
            forward_lines(stdout, |line| log.info(line)),
            forward_lines(stderr, |line| log.warning(line)),
            child.wait(),
        );

        if let Err(e) = input {
            tracing::warn!(module = %self.name, error = %e, "Failed to write module context");
        }

        let status = status.map_err(|source| ModuleError::Launch {
            name: self.name.clone(),
            source,
        })?;
        status
            .code()
            .ok_or_else(|| ModuleError::Terminated(self.name.clone()))
    }
}

/// Write the context and close stdin. A program that exits without
/// reading its input is not an error.
async fn write_context(stdin: Option<ChildStdin>, payload: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(payload).await {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

/// Emit each output line, decoding invalid UTF-8 lossily.
///
/// The pipe is drained to EOF even when reading fails, so the program never
/// sees a closed stdout while it is still running.
async fn forward_lines<R>(reader: Option<R>, emit: impl Fn(&str))
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                emit(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                tracing::debug!(error = %e, "Module output unreadable, discarding the rest");
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                break;
            }
        }
    }
}
