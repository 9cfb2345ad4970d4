//! A stand-in for the `go` binary: a shell script whose behaviour is
//! steered by files in its own temp directory.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sentinel::exec::ToolCommand;
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
dir='@DIR@'
sub="$1"
shift
echo "$sub $*" >> "$dir/invocations.log"
case "$sub" in
  list)
    if [ -f "$dir/list.txt" ]; then
      cat "$dir/list.txt"
      exit 0
    fi
    echo "no packages match $*" 1>&2
    exit 1
    ;;
  test)
    if [ -f "$dir/hang" ]; then
      sleep 300 &
      echo $! > "$dir/grandchild.pid"
      wait
    fi
    if [ -f "$dir/orphan" ]; then
      sleep 300 &
      echo $! > "$dir/grandchild.pid"
    fi
    if [ -f "$dir/output.txt" ]; then
      cat "$dir/output.txt"
    fi
    code=0
    if [ -f "$dir/exit_code" ]; then
      code=$(cat "$dir/exit_code")
    fi
    exit "$code"
    ;;
esac
echo "unknown subcommand $sub" 1>&2
exit 2
"#;

pub struct FakeGoTool {
    dir: TempDir,
    program: PathBuf,
}

impl FakeGoTool {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fake tool dir");
        let program = dir.path().join("go");
        let script = SCRIPT.replace("@DIR@", &dir.path().display().to_string());
        fs::write(&program, script).expect("write fake tool script");
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
        Self { dir, program }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn tool(&self) -> ToolCommand {
        ToolCommand::new(self.program.display().to_string())
    }

    /// What `test` prints on stdout.
    pub fn set_output(&self, output: &str) {
        self.write("output.txt", output);
    }

    pub fn set_exit_code(&self, code: i32) {
        self.write("exit_code", &code.to_string());
    }

    /// What `list` prints; without this `list` fails.
    pub fn set_list(&self, packages: &[&str]) {
        self.write("list.txt", &format!("{}\n", packages.join("\n")));
    }

    /// `test` forks a long sleep and waits for it.
    pub fn hang(&self) {
        self.write("hang", "");
    }

    /// `test` forks a long sleep and exits without waiting for it.
    pub fn leave_orphan(&self) {
        self.write("orphan", "");
    }

    pub fn grandchild_pid_file(&self) -> PathBuf {
        self.dir.path().join("grandchild.pid")
    }

    pub fn grandchild_pid(&self) -> Option<u32> {
        fs::read_to_string(self.grandchild_pid_file())
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// One line per invocation: the subcommand followed by its arguments.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("invocations.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.dir.path().join(name), contents).expect("write fake tool control file");
    }
}

impl Default for FakeGoTool {
    fn default() -> Self {
        Self::new()
    }
}
