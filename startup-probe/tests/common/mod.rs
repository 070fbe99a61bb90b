/// Common utilities for startup probe integration tests
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of one probe invocation
#[allow(dead_code)]
pub struct ProbeRun {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Write a probe config file into a per-test temp directory
pub fn write_config(test_name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "startup-probe-{}-{}",
        std::process::id(),
        test_name
    ));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");

    let path = dir.join("startup-probe.toml");
    std::fs::write(&path, contents).expect("Failed to write config");
    path
}

/// Run the probe binary with the given config file
///
/// PROBE_* variables from the caller's environment are cleared so the file
/// is the only source of settings.
pub fn run_probe(config: &Path) -> ProbeRun {
    run_binary_with_env(config, &[])
}

/// Run the probe binary with the given config file and extra environment
/// variables, applied after the defaults so they can override `RUST_LOG`
pub fn run_binary_with_env(config: &Path, vars: &[(&str, &str)]) -> ProbeRun {
    let mut command = Command::new(env!("CARGO_BIN_EXE_startup-probe"));
    command
        .env("STARTUP_PROBE_CONFIG", config)
        .env("RUST_LOG", "error");

    for (name, _) in std::env::vars() {
        if name.starts_with("PROBE_") {
            command.env_remove(name);
        }
    }

    command.envs(vars.iter().copied());

    let output = command.output().expect("Failed to run startup-probe");

    ProbeRun {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}
