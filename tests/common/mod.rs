#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Answers `-version`, records its arguments next to the output, and copies stdin to the
/// output path (always the last argument).
const FAKE_ENCODER: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "fake encoder 1.0"
  exit 0
fi
for last; do :; done
printf '%s\n' "$@" > "$last.args"
cat > "$last"
echo "fake encoder: done" >&2
"#;

/// Answers `-version`, then exits without reading any input.
const DYING_ENCODER: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  exit 0
fi
echo "fake encoder: crashed" >&2
exit 3
"#;

struct Scripts {
    fake: PathBuf,
    dying: PathBuf,
}

fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = PathBuf::from("target")
            .join("framecap_tests")
            .join(format!("bin_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Scripts {
            fake: write_script(&dir, "fake-encoder", FAKE_ENCODER),
            dying: write_script(&dir, "dying-encoder", DYING_ENCODER),
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn fake_encoder() -> PathBuf {
    scripts().fake.clone()
}

pub fn dying_encoder() -> PathBuf {
    scripts().dying.clone()
}

/// A fresh, empty output directory for one test.
pub fn out_dir(test: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("framecap_tests").join(test);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Arguments the fake encoder was started with for `output`.
pub fn recorded_args(output: &Path) -> Vec<String> {
    let mut p = output.as_os_str().to_owned();
    p.push(".args");
    std::fs::read_to_string(PathBuf::from(p))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Value following `flag` in `args`.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> &'a str {
    let i = args
        .iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("missing {flag} in {args:?}"));
    &args[i + 1]
}
