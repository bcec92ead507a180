//! A shell script standing in for `emcc`
//!
//! The script is invoked as `/bin/sh <script> <source> -o <artifact>`. It
//! reacts to markers in the C source:
//!
//! - `SYNTAX_ERROR` on line N: prints `main.c:N:5: error: ...` to stderr, exits 1
//! - `HANG`: sleeps in a child process until killed
//! - `fixture: NAME`: copies the prebuilt `NAME.wasm` fixture to the artifact path
//!
//! Anything else exits 0 without producing an artifact.

use cforge_common::AppConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Largest `retN` fixture; `ret0..=ret{MAX_EXIT_FIXTURE}` exist
pub const MAX_EXIT_FIXTURE: i32 = 15;

const SCRIPT: &str = r#"#!/bin/sh
src="$1"
out="$3"
fixtures='@FIXTURES@'

echo "fake-emcc: compiling $(basename "$src")"

line=$(grep -n 'SYNTAX_ERROR' "$src" | head -n 1 | cut -d: -f1)
if [ -n "$line" ]; then
    echo "main.c:$line:5: error: expected ';' before '}' token" >&2
    exit 1
fi

if grep -q 'HANG' "$src"; then
    sleep 30 &
    wait
    exit 0
fi

name=$(sed -n 's/.*fixture: \([a-z0-9_]*\).*/\1/p' "$src" | head -n 1)
if [ -n "$name" ]; then
    cp "$fixtures/$name.wasm" "$out" || exit 2
fi
exit 0
"#;

/// Installed fake toolchain with its fixture modules
pub struct FakeToolchain {
    dir: TempDir,
    script: PathBuf,
}

impl FakeToolchain {
    pub fn install() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create toolchain dir");
        let fixtures = dir.path().join("fixtures");
        std::fs::create_dir(&fixtures).expect("Failed to create fixtures dir");

        for code in 0..=MAX_EXIT_FIXTURE {
            write_fixture(
                &fixtures,
                &format!("ret{code}"),
                &format!(r#"(module (func (export "_main") (result i32) (i32.const {code})))"#),
            );
        }
        write_fixture(&fixtures, "hello", HELLO_WAT);
        write_fixture(
            &fixtures,
            "trap",
            r#"(module (func (export "_main") (result i32) unreachable))"#,
        );
        write_fixture(
            &fixtures,
            "spin",
            r#"(module (func (export "_main") (result i32) (loop $l (br $l)) (i32.const 0)))"#,
        );
        write_fixture(&fixtures, "emscripten", EMSCRIPTEN_LIKE_WAT);

        let script = dir.path().join("fake-emcc.sh");
        let body = SCRIPT.replace("@FIXTURES@", &fixtures.to_string_lossy());
        std::fs::write(&script, body).expect("Failed to write toolchain script");

        Self { dir, script }
    }

    /// A fresh workspace root owned by this toolchain's temp dir
    pub fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("workspaces")
    }

    /// Configuration running the fake toolchain with a short timeout
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.toolchain.program = "/bin/sh".to_string();
        config.toolchain.launcher_args = vec![self.script.to_string_lossy().into_owned()];
        config.toolchain.extra_args = Vec::new();
        config.toolchain.timeout = Duration::from_secs(2);
        config.toolchain.pass_env = vec!["PATH".to_string()];
        config.toolchain.memory_limit_bytes = None;
        config.toolchain.cpu_limit_secs = None;
        config.workspace.root = self.workspace_root();
        config.server.bind = "127.0.0.1:0".to_string();
        config
    }

    /// Raw bytes of a fixture, for comparing against compiled artifacts
    pub fn fixture_bytes(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.dir.path().join("fixtures").join(format!("{name}.wasm")))
            .expect("Unknown fixture")
    }
}

/// C source that makes the fake toolchain emit the named fixture
pub fn source_for(fixture: &str) -> String {
    format!("/* fixture: {fixture} */\n#include <stdio.h>\n\nint main(void) {{\n    return 0;\n}}\n")
}

fn write_fixture(dir: &Path, name: &str, wat_source: &str) {
    let bytes = wat::parse_str(wat_source).expect("Invalid fixture");
    std::fs::write(dir.join(format!("{name}.wasm")), bytes).expect("Failed to write fixture");
}

const HELLO_WAT: &str = r#"(module
    (import "wasi_snapshot_preview1" "fd_write"
        (func $fd_write (param i32 i32 i32 i32) (result i32)))
    (memory (export "memory") 1)
    (data (i32.const 16) "hello\n")
    (func (export "_main") (result i32)
        (i32.store (i32.const 0) (i32.const 16))
        (i32.store (i32.const 4) (i32.const 6))
        (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
        (i32.const 0)))"#;

const EMSCRIPTEN_LIKE_WAT: &str = r#"(module
    (import "env" "memory" (memory 256))
    (import "env" "table" (table 0 funcref))
    (func (export "_main") (param i32 i32) (result i32)
        (i32.store (i32.const 1024) (i32.const 5))
        (i32.load (i32.const 1024))))"#;
