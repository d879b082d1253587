//! 🔧 Client configuration: one immutable value, decided before the first request.
//!
//! 📡 Node URL, read-only gate, debug mode, timeouts, CA bundle, headers, credentials.
//! That's the whole list. If you need more knobs, you probably need a different client. 🦆
//!
//! 🏗️ Two ways in:
//! - build a [`ClientConfig`] in code with [`ClientConfig::new`] and the `with_*` setters;
//! - or [`load_config`] it from `ESDOC_*` environment variables plus an optional TOML file,
//!   powered by Figment.
//!
//! Either way, the value is handed to the client once and never mutated again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

/// 📦 Everything a client needs to know before it says hello to a node.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// 📡 Base URL of the node, scheme and port included. Trailing slashes are trimmed by
    /// [`ClientConfig::normalized_node`].
    pub node: String,
    /// 🔒 When true, every mutating operation is a no-op that never touches the network.
    #[serde(default)]
    pub read_only: bool,
    /// 🐛 Attach request snapshots to errors and route failures to the tracing sink.
    #[serde(default)]
    pub debug: bool,
    /// ⏱️ Whole-exchange timeout in seconds. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// ⏱️ TCP/TLS handshake timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 🔒 Optional PEM bundle to trust for https nodes.
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
    /// 📎 Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 🔒 Static basic-auth credential, `user:password`.
    #[serde(default)]
    pub user_passwd: Option<String>,
}

// ⏱️ 120 seconds: the curl-era default. patient, but not a saint.
fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl ClientConfig {
    /// 🚀 A config pointing at `node`, everything else at its default.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            read_only: false,
            debug: false,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ca_path: None,
            headers: BTreeMap::new(),
            user_passwd: None,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_connect_timeout_secs(mut self, connect_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self
    }

    pub fn with_ca_path(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// 🔒 `user:password`, exactly like curl's `-u`.
    pub fn with_credentials(mut self, user_passwd: impl Into<String>) -> Self {
        self.user_passwd = Some(user_passwd.into());
        self
    }

    /// 📡 The node URL minus any trailing slashes.
    /// Without it: `https://host//my-index`. With it: `https://host/my-index`.
    pub fn normalized_node(&self) -> &str {
        self.node.trim_end_matches('/')
    }
}

/// 🚀 Load the config from `ESDOC_*` env vars, optionally layered with a TOML file.
///
/// - `config_file_name` is None → env vars only.
/// - `config_file_name` is Some → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns an error if the merged result does not deserialize (most often: no `node`).
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let from_env = Figment::new().merge(Env::prefixed("ESDOC_"));

    let (figment, source) = match config_file_name {
        Some(path) => (
            from_env.merge(Toml::file(path)),
            format!("'{}' layered over ESDOC_* env vars", path.display()),
        ),
        None => (from_env, "ESDOC_* env vars alone".to_owned()),
    };
    info!("🔧 Loading client configuration from {}", source);

    figment.extract().with_context(|| {
        format!(
            "💀 No usable client configuration in {}. Is `node` set somewhere? It has no default.",
            source
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;

    #[test]
    fn the_one_where_a_toml_file_fills_in_every_knob() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create a temp file. The filesystem said 'new phone who dis'.");
        writeln!(
            file,
            r#"
            node = "https://es.internal:9200/"
            read_only = true
            debug = true
            timeout_secs = 30
            ca_path = "/etc/ssl/es-ca.pem"
            user_passwd = "elastic:changeme"

            [headers]
            x-tenant = "blue"
            "#
        )
        .expect("💀 Failed to write test config.");

        let config = load_config(Some(file.path()))
            .expect("💀 A complete config file should parse. The schema drift goblin does not get this win.");

        assert_eq!(config.normalized_node(), "https://es.internal:9200");
        assert!(config.read_only);
        assert!(config.debug);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.ca_path, Some(PathBuf::from("/etc/ssl/es-ca.pem")));
        assert_eq!(config.user_passwd.as_deref(), Some("elastic:changeme"));
        assert_eq!(config.headers.get("x-tenant").map(String::as_str), Some("blue"));
    }

    #[test]
    fn the_one_where_env_vars_do_the_heavy_lifting() {
        Jail::expect_with(|jail| {
            jail.set_env("ESDOC_NODE", "http://localhost:9200");
            jail.set_env("ESDOC_READ_ONLY", "true");

            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.node, "http://localhost:9200");
            assert!(config.read_only);
            assert!(!config.debug);
            assert_eq!(config.timeout_secs, 120);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_toml_outranks_the_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("ESDOC_NODE", "http://from-env:9200");
            jail.set_env("ESDOC_DEBUG", "true");
            jail.create_file("esdoc.toml", r#"node = "http://from-file:9200""#)?;

            let config = load_config(Some(Path::new("esdoc.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.node, "http://from-file:9200");
            assert!(config.debug, "env still fills what the file leaves alone");
            Ok(())
        });
    }

    #[test]
    fn the_one_where_nobody_said_which_node() {
        Jail::expect_with(|_jail| {
            let err = load_config(None).expect_err("💀 no node, no config");
            assert!(err.to_string().contains("ESDOC_"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_builder_setters_stack_up() {
        let config = ClientConfig::new("http://es:9200///")
            .with_read_only(true)
            .with_debug(true)
            .with_timeout_secs(0)
            .with_header("x-a", "1")
            .with_credentials("u:p");

        assert_eq!(config.normalized_node(), "http://es:9200");
        assert!(config.read_only && config.debug);
        assert_eq!(config.timeout_secs, 0);
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.user_passwd.as_deref(), Some("u:p"));
    }
}
