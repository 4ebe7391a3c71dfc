//! Port-to-service-name lookups from an `/etc/services` style file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

pub const DEFAULT_SERVICES_PATH: &str = "/etc/services";

/// Service names keyed by `(port, protocol)`.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    names: HashMap<(u16, String), String>,
}

impl ServiceRegistry {
    /// Parse lines of the form `name port/proto [aliases...] [# comment]`.
    ///
    /// Malformed lines are skipped. The first entry for a `(port, proto)`
    /// pair wins.
    pub fn parse(content: &str) -> Self {
        let mut names = HashMap::new();
        for raw_line in content.lines() {
            let line = raw_line.split('#').next().unwrap_or("");
            let mut fields = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                continue;
            };
            names
                .entry((port, proto.to_ascii_lowercase()))
                .or_insert_with(|| name.to_string());
        }
        Self { names }
    }

    /// Load from `path`; an unreadable file gives an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "service names unavailable");
                Self::default()
            }
        }
    }

    pub fn lookup(&self, port: u16, protocol: &str) -> Option<&str> {
        self.names
            .get(&(port, protocol.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// `name/tcp` for a TCP port, when known.
    pub fn describe_tcp(&self, port: u16) -> Option<String> {
        self.lookup(port, "tcp").map(|name| format!("{name}/tcp"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
