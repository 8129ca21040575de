fn main() {
    // Inject compile timestamp as version
    let version = get_version();
    println!("cargo:rustc-env=BUILD_VERSION={}", version);
    println!("cargo:rerun-if-changed=build.rs");
}

fn get_version() -> String {
    // Format: YYYY-MM-DDTHH:MM:SSZ
    let now = chrono::Utc::now();
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
