use super::engine::{CorrectionEngine, CorrectionOutput};
use super::units::PixelParameters;
use crate::error::{OdynError, Result};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// Engine backed by a worker process that speaks line-delimited JSON.
///
/// The worker is started with `--processes N`, receives one request per line
/// on stdin and answers each with one line on stdout. Closing stdin asks it to
/// shut its pool down and exit.
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
    worker: Option<Worker>,
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Debug, Serialize)]
struct CorrectionRequest<'a> {
    files: &'a [PathBuf],
    params: &'a PixelParameters,
    output_dir: &'a Path,
}

#[derive(Debug, Deserialize)]
struct CorrectionResponse {
    ok: bool,
    #[serde(default)]
    mmap_files: Vec<PathBuf>,
    #[serde(default)]
    error: Option<String>,
}

impl ProcessEngine {
    pub fn new<P: Into<PathBuf>>(program: String, args: Vec<String>, output_dir: P) -> Self {
        Self {
            program,
            args,
            output_dir: output_dir.into(),
            worker: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.engine.program.clone(),
            settings.engine.args.clone(),
            settings.paths.scratch_dir.clone(),
        )
    }

    fn worker(&mut self) -> Result<&mut Worker> {
        self.worker
            .as_mut()
            .ok_or_else(|| OdynError::engine("worker pool is not running"))
    }
}

impl CorrectionEngine for ProcessEngine {
    fn start_pool(&mut self, processes: usize) -> Result<()> {
        if self.worker.is_some() {
            return Err(OdynError::engine("worker pool is already running"));
        }

        info!(
            "Starting engine worker {} with {} process(es)",
            self.program, processes
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--processes")
            .arg(processes.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| OdynError::engine(format!("failed to start {}: {}", self.program, e)))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => {
                self.worker = Some(Worker {
                    child,
                    stdin,
                    stdout: BufReader::new(stdout),
                });
                Ok(())
            }
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(OdynError::engine("worker pipes are unavailable"))
            }
        }
    }

    fn correct(&mut self, files: &[PathBuf], params: &PixelParameters) -> Result<CorrectionOutput> {
        let request = CorrectionRequest {
            files,
            params,
            output_dir: &self.output_dir,
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        let worker = self.worker()?;
        worker.stdin.write_all(line.as_bytes())?;
        worker.stdin.flush()?;
        debug!("Sent correction request for {} file(s)", files.len());

        let mut reply = String::new();
        if worker.stdout.read_line(&mut reply)? == 0 {
            return Err(OdynError::engine("worker exited without answering"));
        }

        let response: CorrectionResponse = serde_json::from_str(reply.trim())?;
        if !response.ok {
            return Err(OdynError::engine(
                response
                    .error
                    .unwrap_or_else(|| "correction failed without a message".to_string()),
            ));
        }

        Ok(CorrectionOutput {
            mmap_files: response.mmap_files,
        })
    }

    fn stop_pool(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let Worker {
            mut child, stdin, ..
        } = worker;
        drop(stdin);

        let status = child.wait()?;
        info!("Engine worker exited with {}", status);

        if status.success() {
            Ok(())
        } else {
            Err(OdynError::engine(format!("worker exited with {}", status)))
        }
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            warn!("Engine worker still running on drop, killing it");
            let _ = worker.child.kill();
            let _ = worker.child.wait();
        }
    }
}
