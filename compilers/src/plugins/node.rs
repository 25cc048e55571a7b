//! Shared Node.js host for plugins whose compiler ships as an npm package.
//!
//! Each compile runs a small driver script under `node`. The driver reads
//! one JSON job from stdin and writes one JSON reply to stdout, so the sync
//! and async paths exchange exactly the same bytes.

use crate::errors::CompilerError;
use crate::plugin::{CompileDiagnostic, CompileOutcome};
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tokio::io::AsyncWriteExt;

/// Explicit path to the `node` binary.
pub const NODE_ENV: &str = "DIALECTC_NODE";
/// Explicit `node_modules` directory holding the compiler packages.
pub const NODE_MODULES_ENV: &str = "DIALECTC_NODE_MODULES";

/// A located `node` binary plus the `node_modules` directory providing one
/// compiler package.
#[derive(Debug, Clone)]
pub struct NodeHost {
    node: PathBuf,
    modules_dir: PathBuf,
    package: &'static str,
}

impl NodeHost {
    /// Locate `node` and `package`.
    ///
    /// Search order for `node`:
    /// 1. `DIALECTC_NODE`
    /// 2. `node` on `PATH`
    ///
    /// Search order for the package: see [`module_search_roots`].
    pub fn locate(package: &'static str) -> Result<Self, CompilerError> {
        let node = find_node().ok_or_else(|| {
            CompilerError::Initialization(format!(
                "node not found. Install Node.js or set {} to the node binary",
                NODE_ENV
            ))
        })?;
        let modules_dir = find_package_root(&module_search_roots(), package)
            .ok_or_else(|| package_not_found(package))?;
        tracing::debug!(
            package,
            node = %node.display(),
            modules = %modules_dir.display(),
            "located node compiler host"
        );
        Ok(Self {
            node,
            modules_dir,
            package,
        })
    }

    fn command(&self, driver: &str) -> Command {
        let mut command = Command::new(&self.node);
        command
            .arg("-e")
            .arg(driver)
            .env("NODE_PATH", &self.modules_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Run `driver` on `job`, blocking until the reply arrives.
    pub fn run_sync(
        &self,
        driver: &str,
        job: &Value,
    ) -> Result<CompileOutcome, CompilerError> {
        let payload = serde_json::to_vec(job)?;
        let mut child = self.command(driver).spawn().map_err(|e| self.spawn_error(e))?;
        if let Some(mut stdin) = child.stdin.take() {
            tolerate_closed_pipe(stdin.write_all(&payload))?;
        }
        let output = child.wait_with_output()?;
        parse_reply(output)
    }

    /// Run `driver` on `job`, suspending while the child process works.
    pub async fn run(
        &self,
        driver: &str,
        job: &Value,
    ) -> Result<CompileOutcome, CompilerError> {
        let payload = serde_json::to_vec(job)?;
        let mut child = tokio::process::Command::from(self.command(driver))
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        if let Some(mut stdin) = child.stdin.take() {
            tolerate_closed_pipe(stdin.write_all(&payload).await)?;
        }
        let output = child.wait_with_output().await?;
        parse_reply(output)
    }

    fn spawn_error(&self, e: std::io::Error) -> CompilerError {
        CompilerError::Driver(format!(
            "failed to start {} for {}: {}",
            self.node.display(),
            self.package,
            e
        ))
    }
}

/// A driver that exits before reading its whole job closes stdin early. Its
/// exit status and stderr say why, so the broken pipe itself is dropped and
/// the reply is still collected.
fn tolerate_closed_pipe(written: std::io::Result<()>) -> std::io::Result<()> {
    match written {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::debug!("driver closed stdin before reading the whole job");
            Ok(())
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum DriverReply {
    Success { code: String },
    Failure { diagnostic: CompileDiagnostic },
}

fn parse_reply(output: Output) -> Result<CompileOutcome, CompilerError> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.stdout.is_empty() {
        return Err(CompilerError::Driver(format!(
            "driver failed ({}) without a reply: {}",
            output.status,
            stderr.trim()
        )));
    }
    let reply: DriverReply = serde_json::from_slice(&output.stdout).map_err(|e| {
        CompilerError::Driver(format!("unreadable driver reply: {}: {}", e, stderr.trim()))
    })?;
    Ok(match reply {
        DriverReply::Success { code } => Ok(code),
        DriverReply::Failure { diagnostic } => Err(diagnostic),
    })
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    version: String,
}

/// Installed version of `package`, read from its `package.json`.
pub fn package_version(package: &str) -> Result<String, CompilerError> {
    let root = find_package_root(&module_search_roots(), package)
        .ok_or_else(|| package_not_found(package))?;
    let manifest_path = root.join(package).join("package.json");
    let content = std::fs::read_to_string(&manifest_path)?;
    let manifest: PackageManifest = serde_json::from_str(&content)?;
    Ok(manifest.version)
}

fn package_not_found(package: &str) -> CompilerError {
    CompilerError::Initialization(format!(
        "npm package '{}' not found. Run `npm install {}` in the project, \
         or set {} to a node_modules directory containing it",
        package, package, NODE_MODULES_ENV
    ))
}

fn find_node() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(NODE_ENV) {
        let path = PathBuf::from(expand_tilde(&path));
        if path.exists() {
            return Some(path);
        }
    }
    check_tool("node").then(|| PathBuf::from("node"))
}

/// Directories that may hold a compiler package, in search order:
/// 1. `DIALECTC_NODE_MODULES`
/// 2. `node_modules` in the current directory and each ancestor
/// 3. Common global npm prefixes
pub fn module_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(path) = std::env::var(NODE_MODULES_ENV) {
        roots.push(PathBuf::from(expand_tilde(&path)));
    }

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().map(|dir| dir.join("node_modules")));
    }

    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".npm-global/lib/node_modules"));
        roots.push(home.join(".node_modules"));
    }
    roots.push(PathBuf::from("/usr/local/lib/node_modules"));
    roots.push(PathBuf::from("/usr/lib/node_modules"));
    roots.push(PathBuf::from("/opt/homebrew/lib/node_modules"));

    roots
}

/// First root containing `<root>/<package>/package.json`.
pub fn find_package_root(roots: &[PathBuf], package: &str) -> Option<PathBuf> {
    roots
        .iter()
        .find(|root| root.join(package).join("package.json").is_file())
        .cloned()
}

/// Check if a CLI tool answers `--version`.
pub fn check_tool(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Expand ~ to home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
