use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not answer within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("invalid response JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request failed with result code {code}: {message}")]
    Remote { code: i64, message: String },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FetchResponse {
    pub result_code: i64,
    #[serde(default)]
    pub result: Value,
}

impl FetchResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            result_code: 0,
            result,
        }
    }

    /// Non-zero result codes are failures carrying `result` as the message.
    pub fn into_result(self) -> Result<Value, FetchError> {
        if self.result_code == 0 {
            return Ok(self.result);
        }
        let message = match self.result {
            Value::String(message) => message,
            other => other.to_string(),
        };
        Err(FetchError::Remote {
            code: self.result_code,
            message,
        })
    }
}

/// Request/response seam to whatever serves the node/link payloads.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str, params: &Value) -> Result<FetchResponse, FetchError>;
}

/// Accepts either a full `{result_code, result}` envelope or a bare payload.
fn response_from_json(text: &str) -> Result<FetchResponse, FetchError> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("result_code").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    Ok(FetchResponse::ok(value))
}

/// Serves `<dir>/<url stem>.json`, e.g. `ajax_fetch_topology.py` reads
/// `ajax_fetch_topology.json`.
pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        let stem = Path::new(url)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(url);
        self.dir.join(format!("{stem}.json"))
    }
}

impl Transport for FileTransport {
    fn fetch(&self, url: &str, _params: &Value) -> Result<FetchResponse, FetchError> {
        let path = self.path_for(url);
        let text = fs::read_to_string(&path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        response_from_json(&text)
    }
}

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `<program> <url> <params as JSON>` and reads the response from stdout.
/// A program still running after the timeout is killed.
pub struct CommandTransport {
    program: String,
    timeout: Duration,
}

impl CommandTransport {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

impl Transport for CommandTransport {
    fn fetch(&self, url: &str, params: &Value) -> Result<FetchResponse, FetchError> {
        let mut child = Command::new(&self.program)
            .arg(url)
            .arg(params.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::warn!("killed {} after {:?}", self.program, self.timeout);
                    return Err(FetchError::Timeout {
                        program: self.program.clone(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(FetchError::Wait {
                        program: self.program.clone(),
                        source,
                    });
                }
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            return Err(FetchError::Command {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&collect(stderr)).trim().to_owned(),
            });
        }
        response_from_json(&String::from_utf8_lossy(&stdout))
    }
}
