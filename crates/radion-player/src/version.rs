pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_string() -> String {
    format!(
        "radion v{} ({}/{})",
        VERSION,
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}
