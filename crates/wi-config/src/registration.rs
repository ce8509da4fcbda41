//! Desktop-client registration entries
//!
//! Models the `mcpServers` registry consumed by MCP desktop clients
//! (Claude Desktop and compatibles): a named entry describing how to launch
//! a bridge process that relays the client's stdio transport to this
//! server's HTTP endpoint.
//!
//! The entry we generate launches `mcp-remote` via npx, pointed at the
//! running server's `/mcp/mcp` endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use wi_types::{AppError, AppResult};

/// Name of the bridge package launched by the generated registration
pub const BRIDGE_PACKAGE: &str = "mcp-remote";

/// Default entry name under `mcpServers`
pub const DEFAULT_ENTRY_NAME: &str = "web-interact";

/// A single named entry in the client's server registry
///
/// `command` + `args` must resolve, at launch time, to a runnable bridge
/// process capable of reaching the configured HTTP endpoint. The entry is
/// created and edited here, read once by the desktop client at its own
/// startup, and never touched by the server process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerRegistration {
    /// Executable name or path the client launches
    pub command: String,

    /// Ordered arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the launched process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Environment variable overlay for the launched process
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Fields we don't model (kept intact across read-modify-write)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ServerRegistration {
    /// Build the standard registration for a given MCP endpoint URL
    ///
    /// Launches `npx -y mcp-remote <url>` from the system temp directory
    /// with the bridge's debug logging enabled.
    pub fn for_endpoint(endpoint_url: &str) -> Self {
        let mut env = BTreeMap::new();
        env.insert("MCP_REMOTE_DEBUG".to_string(), "true".to_string());
        env.insert("DEBUG".to_string(), format!("{}*", BRIDGE_PACKAGE));

        Self {
            command: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                BRIDGE_PACKAGE.to_string(),
                endpoint_url.to_string(),
            ],
            cwd: Some(std::env::temp_dir()),
            env,
            extra: BTreeMap::new(),
        }
    }

    /// The endpoint URL this registration points its bridge at, if any
    pub fn endpoint_url(&self) -> Option<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .find(|arg| arg.starts_with("http://") || arg.starts_with("https://"))
    }

    /// Validate that this entry can plausibly launch a bridge
    ///
    /// Checks that the command resolves to an executable on PATH (or is an
    /// existing path), that no argument is an empty string, that some
    /// argument carries an http(s) endpoint URL, and that `cwd`, when
    /// present, is an existing directory. This is best-effort launch-time
    /// validation; a resolvable command can still fail to reach the server.
    pub fn validate(&self) -> AppResult<()> {
        if self.command.trim().is_empty() {
            return Err(AppError::Registration(
                "command must not be empty".to_string(),
            ));
        }

        which::which(&self.command).map_err(|_| {
            AppError::Registration(format!(
                "command '{}' does not resolve to an executable on PATH",
                self.command
            ))
        })?;

        if self.args.iter().any(|arg| arg.trim().is_empty()) {
            return Err(AppError::Registration(
                "args must not contain empty strings".to_string(),
            ));
        }

        if self.endpoint_url().is_none() {
            return Err(AppError::Registration(
                "args must include an http(s) endpoint URL for the bridge to connect to"
                    .to_string(),
            ));
        }

        if let Some(cwd) = &self.cwd {
            if !cwd.is_dir() {
                return Err(AppError::Registration(format!(
                    "cwd '{}' is not an existing directory",
                    cwd.display()
                )));
            }
        }

        Ok(())
    }
}

/// The desktop client's configuration file
///
/// Only the `mcpServers` registry is modeled; every other top-level key is
/// carried through untouched so an install never clobbers unrelated client
/// settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfigFile {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, ServerRegistration>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ClientConfigFile {
    /// Load a client configuration file, or start from empty if missing
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("Client config {:?} not found, starting from empty", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Registration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            AppError::Registration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Save the client configuration file as pretty-printed JSON
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir_exists(&parent.to_path_buf())?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            AppError::Registration(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Validate every entry in the registry
    ///
    /// Returns per-entry results so a caller can report all problems at
    /// once instead of stopping at the first.
    pub fn validate_all(&self) -> Vec<(String, AppResult<()>)> {
        self.mcp_servers
            .iter()
            .map(|(name, reg)| (name.clone(), reg.validate()))
            .collect()
    }
}

/// Render the JSON snippet for a single registration
///
/// This is what a user pastes into their client config by hand.
pub fn render_snippet(name: &str, registration: &ServerRegistration) -> AppResult<String> {
    let mut servers = BTreeMap::new();
    servers.insert(name.to_string(), registration.clone());
    let file = ClientConfigFile {
        mcp_servers: servers,
        extra: BTreeMap::new(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Merge a registration into an existing client config file
///
/// Read-modify-write: existing entries under other names are preserved, an
/// existing entry under the same name is replaced. The registration is
/// validated before anything is written.
pub fn install_registration(
    path: &Path,
    name: &str,
    registration: ServerRegistration,
) -> AppResult<()> {
    registration.validate()?;

    let mut file = ClientConfigFile::load(path)?;
    file.mcp_servers.insert(name.to_string(), registration);
    file.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn resolvable_registration() -> ServerRegistration {
        // `ls` resolves on any unix PATH; keeps validation honest without
        // depending on npx being installed in CI.
        ServerRegistration {
            command: "ls".to_string(),
            args: vec!["http://127.0.0.1:8000/mcp/mcp".to_string()],
            cwd: None,
            env: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_for_endpoint_shape() {
        let reg = ServerRegistration::for_endpoint("http://127.0.0.1:8000/mcp/mcp");
        assert_eq!(reg.command, "npx");
        assert_eq!(
            reg.args,
            vec!["-y", "mcp-remote", "http://127.0.0.1:8000/mcp/mcp"]
        );
        assert_eq!(reg.endpoint_url(), Some("http://127.0.0.1:8000/mcp/mcp"));
        assert_eq!(reg.env.get("MCP_REMOTE_DEBUG").map(String::as_str), Some("true"));
        assert!(reg.cwd.is_some());
    }

    #[test]
    fn test_validate_accepts_resolvable_command() {
        assert!(resolvable_registration().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unresolvable_command() {
        let mut reg = resolvable_registration();
        reg.command = "definitely-not-a-real-binary-xyz".to_string();
        let err = reg.validate().unwrap_err();
        assert!(err.to_string().contains("does not resolve"));
    }

    #[test]
    fn test_validate_rejects_empty_arg() {
        let mut reg = resolvable_registration();
        reg.args.push("  ".to_string());
        assert!(reg.validate().is_err());
    }

    #[test]
    fn test_validate_requires_endpoint_url() {
        let mut reg = resolvable_registration();
        reg.args = vec!["-y".to_string()];
        let err = reg.validate().unwrap_err();
        assert!(err.to_string().contains("endpoint URL"));
    }

    #[test]
    fn test_validate_rejects_missing_cwd() {
        let mut reg = resolvable_registration();
        reg.cwd = Some(PathBuf::from("/definitely/not/a/real/dir"));
        assert!(reg.validate().is_err());
    }

    #[test]
    fn test_render_snippet() {
        let reg = ServerRegistration::for_endpoint("http://127.0.0.1:8000/mcp/mcp");
        let snippet = render_snippet("web-interact", &reg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&snippet).unwrap();
        assert_eq!(
            value["mcpServers"]["web-interact"]["command"],
            json!("npx")
        );
        assert_eq!(
            value["mcpServers"]["web-interact"]["args"][2],
            json!("http://127.0.0.1:8000/mcp/mcp")
        );
    }

    #[test]
    fn test_install_preserves_existing_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");

        // Pre-existing config with another server and an unrelated key
        let existing = json!({
            "mcpServers": {
                "filesystem": {
                    "command": "ls",
                    "args": ["http://localhost:9999/"]
                }
            },
            "theme": "dark"
        });
        std::fs::write(&path, serde_json::to_string_pretty(&existing).unwrap()).unwrap();

        install_registration(&path, "web-interact", resolvable_registration()).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written["mcpServers"]["filesystem"].is_object());
        assert!(written["mcpServers"]["web-interact"].is_object());
        assert_eq!(written["theme"], json!("dark"));
    }

    #[test]
    fn test_install_into_missing_file_creates_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        install_registration(&path, "web-interact", resolvable_registration()).unwrap();

        let file = ClientConfigFile::load(&path).unwrap();
        assert_eq!(file.mcp_servers.len(), 1);
        assert!(file.mcp_servers.contains_key("web-interact"));
    }

    #[test]
    fn test_install_rejects_invalid_registration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut reg = resolvable_registration();
        reg.command = "definitely-not-a-real-binary-xyz".to_string();

        assert!(install_registration(&path, "web-interact", reg).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_validate_all_reports_each_entry() {
        let mut servers = BTreeMap::new();
        servers.insert("good".to_string(), resolvable_registration());
        let mut bad = resolvable_registration();
        bad.command = "definitely-not-a-real-binary-xyz".to_string();
        servers.insert("bad".to_string(), bad);

        let file = ClientConfigFile {
            mcp_servers: servers,
            extra: BTreeMap::new(),
        };

        let results = file.validate_all();
        assert_eq!(results.len(), 2);
        assert!(results.iter().find(|(n, _)| n == "good").unwrap().1.is_ok());
        assert!(results.iter().find(|(n, _)| n == "bad").unwrap().1.is_err());
    }
}
