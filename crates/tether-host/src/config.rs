use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Bridge configuration, loadable from a TOML file placed next to the host
/// module. Every field has a default so an absent file is not an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Embedded runtime version string requested from the meta host.
    pub runtime_version: String,
    /// Namespace-qualified class on the embedded side holding the bootstrap
    /// function.
    pub entry_class: String,
    /// Static bootstrap function of the form `(string) -> i32`.
    pub bootstrap_function: String,
    /// File name of the embedded-side bootstrap assembly, expected in the
    /// same directory as the host module.
    pub assembly_file_name: String,
    /// What happens after the first setup attempt fails.
    pub setup_retry: SetupRetry,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            runtime_version: "v4.0.30319".into(),
            entry_class: "Tether.Hosting.Bridge".into(),
            bootstrap_function: "LocateCallback".into(),
            assembly_file_name: "TetherHost.dll".into(),
            setup_retry: SetupRetry::default(),
        }
    }
}

/// Policy for setup failure: the reference behavior caches the first failed
/// attempt until process restart; `PerRequest` re-attempts on each request
/// instead (cached handles make the retry cheap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SetupRetry {
    #[default]
    #[serde(rename = "one-shot")]
    OneShot,
    #[serde(rename = "per-request")]
    PerRequest,
}

impl BridgeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("cannot parse config {}", path.display()))
    }

    /// Derive the expected bootstrap assembly location from the host
    /// module's own path: same directory, fixed file name.
    ///
    /// This is a pure string transform on the final path separator; no
    /// filesystem probing happens here. A path without a separator is
    /// treated as a bare file name in the current directory.
    pub fn bootstrap_assembly_path(&self, module_path: &str) -> PathBuf {
        let module_path = strip_verbatim_prefix(module_path);
        match module_path.rfind(['/', '\\']) {
            Some(pos) => {
                let mut derived = String::with_capacity(pos + 1 + self.assembly_file_name.len());
                derived.push_str(&module_path[..=pos]);
                derived.push_str(&self.assembly_file_name);
                PathBuf::from(derived)
            }
            None => PathBuf::from(&self.assembly_file_name),
        }
    }
}

/// Knock the `\\?\` verbatim prefix off a module path, as reported by some
/// hosts for long-path safety. Everything downstream wants the plain form.
pub fn strip_verbatim_prefix(path: &str) -> &str {
    path.strip_prefix(r"\\?\").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = BridgeConfig::default();
        assert_eq!(config.runtime_version, "v4.0.30319");
        assert_eq!(config.setup_retry, SetupRetry::OneShot);
    }

    #[test]
    fn parses_partial_config() {
        let toml_str = r#"
runtime_version = "v2.0.50727"
setup_retry = "per-request"
"#;
        let config: BridgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runtime_version, "v2.0.50727");
        assert_eq!(config.setup_retry, SetupRetry::PerRequest);
        // Unmentioned fields keep their defaults
        assert_eq!(config.assembly_file_name, "TetherHost.dll");
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "entry_class = \"Custom.Entry\"\n").unwrap();

        let config = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(config.entry_class, "Custom.Entry");
    }

    #[test]
    fn derives_sibling_assembly_path() {
        let config = BridgeConfig::default();
        assert_eq!(
            config.bootstrap_assembly_path(r"C:\inetsrv\ext\tether.dll"),
            PathBuf::from(r"C:\inetsrv\ext\TetherHost.dll")
        );
        assert_eq!(
            config.bootstrap_assembly_path("/srv/host/tether.so"),
            PathBuf::from("/srv/host/TetherHost.dll")
        );
    }

    #[test]
    fn strips_verbatim_prefix_before_deriving() {
        let config = BridgeConfig::default();
        assert_eq!(
            config.bootstrap_assembly_path(r"\\?\C:\ext\tether.dll"),
            PathBuf::from(r"C:\ext\TetherHost.dll")
        );
        assert_eq!(strip_verbatim_prefix(r"\\?\C:\x"), r"C:\x");
        assert_eq!(strip_verbatim_prefix("/plain/path"), "/plain/path");
    }

    #[test]
    fn bare_module_name_stays_in_current_directory() {
        let config = BridgeConfig::default();
        assert_eq!(
            config.bootstrap_assembly_path("tether.dll"),
            PathBuf::from("TetherHost.dll")
        );
    }
}
