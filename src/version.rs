/// Build timestamp from build.rs in RFC 3339 form (e.g. "2025-02-09T15:30:45Z"),
/// or the package version when built without it.
pub fn current_version() -> &'static str {
    option_env!("BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

pub fn log_startup() {
    tracing::info!("snmp-poller build {}", current_version());
}
