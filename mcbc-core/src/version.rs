pub const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
pub const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
pub const VERSION_EXTRA: &str = env!("CARGO_PKG_VERSION_PRE");

/// `MAJOR.MINOR.PATCH[-EXTRA]`
pub fn version() -> String {
    with_extra(format!("{VERSION_MAJOR}.{VERSION_MINOR}.{VERSION_PATCH}"))
}

/// `MAJOR.MINOR[-EXTRA]`, used in the reply footer.
pub fn loose_version() -> String {
    with_extra(format!("{VERSION_MAJOR}.{VERSION_MINOR}"))
}

fn with_extra(base: String) -> String {
    if VERSION_EXTRA.is_empty() {
        base
    } else {
        format!("{base}-{VERSION_EXTRA}")
    }
}
