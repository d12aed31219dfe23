use std::process::Command;
use vergen::EmitBuilder;

fn main() {
    // Git metadata is optional: source tarballs and container builds have no .git
    let in_git_checkout = Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);

    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();
    if in_git_checkout {
        builder.git_sha(true);
    }

    if let Err(e) = builder.emit() {
        println!("cargo:warning=Unable to generate build metadata: {e}");
    }
}
