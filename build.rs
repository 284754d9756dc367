use std::process::Command;

fn main() {
    let now = time::OffsetDateTime::now_utc();
    let date_fmt = time::format_description::parse("[month repr:short] [day padding:space] [year]")
        .expect("valid date format");

    let date = std::env::var("T2_BUILD_DATE")
        .unwrap_or_else(|_| now.format(&date_fmt).unwrap_or_else(|_| "unknown".to_string()));

    // Short commit hash when building from a git checkout
    let commit = std::env::var("T2_COMMIT").ok().or_else(|| {
        Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()
            .filter(|out| out.status.success())
            .and_then(|out| String::from_utf8(out.stdout).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    });

    println!("cargo:rerun-if-env-changed=T2_BUILD_DATE");
    println!("cargo:rerun-if-env-changed=T2_COMMIT");
    println!("cargo:rustc-env=T2_BUILD_DATE={}", date);
    println!("cargo:rustc-env=T2_COMMIT={}", commit.unwrap_or_else(|| "unknown".to_string()));
}
