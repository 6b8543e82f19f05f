use std::path::PathBuf;

/// Environment-driven settings shared by all three binaries.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub cookie: Option<String>,
    pub impersonate: String,
    pub cache_root: PathBuf,
}

impl WorkflowConfig {
    pub fn from_env() -> Self {
        // Real browser cookies help against the portal's anti-bot pages.
        let cookie = std::env::var("EDISCLOSURE_COOKIE")
            .ok()
            .filter(|c| !c.trim().is_empty());

        let impersonate = std::env::var("EDISCLOSURE_IMPERSONATE")
            .unwrap_or_else(|_| "chrome124".to_string());

        let cache_root = std::env::var("EDISCLOSURE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("alfred-e-disclosure"));

        Self {
            cookie,
            impersonate,
            cache_root,
        }
    }
}
