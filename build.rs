fn main() {
    // Reported by GET /health so operators can tell which build is serving.
    println!("cargo:rustc-env=MP_BUILD_TIME={}", build_time_utc());
    println!("cargo:rerun-if-changed=build.rs");
}

/// UTC timestamp from `date`, or "unknown" on hosts without it.
fn build_time_utc() -> String {
    std::process::Command::new("date")
        .args(["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
