#![allow(dead_code)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory holding a scripted vmware-rpctool, a cloud.cfg and
/// the files the datasource reads or writes.
pub struct TestEnv {
    _tmp: TempDir,
    pub bin: PathBuf,
    pub config: PathBuf,
    pub interfaces: PathBuf,
    pub product_uuid: PathBuf,
    answers: Vec<(String, i32, String)>,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&bin).expect("create bin dir");
        let config = tmp.path().join("cloud.cfg");
        let interfaces = tmp.path().join("interfaces");
        let product_uuid = tmp.path().join("product_uuid");

        let env = Self {
            _tmp: tmp,
            bin,
            config,
            interfaces,
            product_uuid,
            answers: Vec::new(),
        };
        env.write_config(&[]);
        env
    }

    pub fn root(&self) -> &Path {
        self._tmp.path()
    }

    /// Make `guestinfo.<key>` answer with `output` and exit `code`.
    pub fn answer(mut self, key: &str, code: i32, output: &str) -> Self {
        self.answers.push((key.to_string(), code, output.to_string()));
        self
    }

    pub fn value(self, key: &str, output: &str) -> Self {
        self.answer(key, 0, output)
    }

    /// Write the scripted helper. Unlisted keys exit 1, as for unset keys.
    pub fn install_rpctool(&self) -> PathBuf {
        let mut script = String::from("#!/bin/sh\ncase \"$1\" in\n");
        for (key, code, output) in &self.answers {
            script.push_str(&format!(
                "  \"info-get guestinfo.{}\") printf '%s' '{}'; exit {} ;;\n",
                key,
                output.replace('\'', "'\\''"),
                code
            ));
        }
        script.push_str("  *) exit 1 ;;\nesac\n");

        let path = self.bin.join("vmware-rpctool");
        fs::write(&path, script).expect("write rpctool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod rpctool");
        path
    }

    pub fn write_config(&self, extra: &[(&str, &str)]) {
        let mut yaml = format!(
            "datasource:\n  VmwareGuestinfo:\n    identity_file: {}\n    interfaces_file: {}\n    bringup_command: [\"true\"]\n",
            self.product_uuid.display(),
            self.interfaces.display()
        );
        for (key, value) in extra {
            yaml.push_str(&format!("    {}: {}\n", key, value));
        }
        fs::write(&self.config, yaml).expect("write config");
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("guestinfo-datasource");
        cmd.env("PATH", "/usr/bin:/bin")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .arg("--path")
            .arg(&self.bin);
        cmd
    }
}
