//! Build script: embeds the git hash and checks GPU toolkits for whisper.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool("nvcc", &["--version"], "CUDA toolkit", "cuda");
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "vulkan");
    }
}

/// Fail early with a readable message instead of deep inside whisper-rs-sys.
fn require_tool(program: &str, args: &[&str], toolkit: &str, feature: &str) {
    match Command::new(program).args(args).output() {
        Ok(out) if out.status.success() => {
            println!("cargo::warning={toolkit} detected ({program})");
        }
        _ => panic!(
            "\n\n`{program}` not found: the {toolkit} is not installed.\n\
             Install it, or build without the `{feature}` feature.\n"
        ),
    }
}
