/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! YAML-backed server configuration.

use serde::Deserialize;

use crate::error::{HttpError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub cert_path: String,
    #[serde(default)]
    pub key_path: String,
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CachingConfig {
    pub enabled: bool,
    pub ttl: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub caching: CachingConfig,
    #[serde(default)]
    pub blacklist: Vec<String>,
    pub logger: LoggerConfig,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: 60,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| HttpError::Config(format!("reading {}: {}", path, e)))?;
        serde_yaml::from_str(&data).map_err(|e| HttpError::Config(format!("parsing {}: {}", path, e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(HttpError::Config("server port is not set".into()));
        }
        if self.server.cert_path.is_empty() {
            return Err(HttpError::Config("server cert_path is not set".into()));
        }
        if self.server.key_path.is_empty() {
            return Err(HttpError::Config("server key_path is not set".into()));
        }
        if self.server.routes.is_empty() {
            return Err(HttpError::Config("no server routes are defined".into()));
        }
        for route in &self.server.routes {
            if !route.path.starts_with('/') {
                return Err(HttpError::Config(format!(
                    "route path {:?} must start with '/'",
                    route.path
                )));
            }
            if route.target.is_empty() {
                return Err(HttpError::Config("route target is not set".into()));
            }
        }
        if self.caching.enabled && self.caching.ttl == 0 {
            return Err(HttpError::Config("caching ttl must be nonzero when caching is enabled".into()));
        }
        if self.logger.level.is_empty() {
            return Err(HttpError::Config("logger level is not set".into()));
        }
        if self.logger.file.is_empty() {
            return Err(HttpError::Config("logger file is not set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        serde_yaml::from_str(
            r#"
server:
  port: 8443
  cert_path: cert.pem
  key_path: key.pem
  routes:
    - path: /notes
      target: local
caching:
  enabled: true
  ttl: 30
blacklist:
  - 10.0.0.1
logger:
  level: info
  file: server.log
"#,
        )
        .unwrap()
    }

    #[test]
    fn valid_config_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn missing_port_fails() {
        let mut c = sample();
        c.server.port = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn missing_cert_path_fails() {
        let mut c = sample();
        c.server.cert_path.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn missing_key_path_fails() {
        let mut c = sample();
        c.server.key_path.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn missing_routes_fails() {
        let mut c = sample();
        c.server.routes.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn route_path_without_leading_slash_fails() {
        let mut c = sample();
        c.server.routes[0].path = "notes".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn route_missing_target_fails() {
        let mut c = sample();
        c.server.routes[0].target.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn caching_enabled_with_zero_ttl_fails() {
        let mut c = sample();
        c.caching.enabled = true;
        c.caching.ttl = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn missing_logger_file_fails() {
        let mut c = sample();
        c.logger.file.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn caching_defaults_when_absent() {
        let c: Config = serde_yaml::from_str(
            r#"
server:
  port: 8443
  cert_path: cert.pem
  key_path: key.pem
  routes:
    - path: /notes
      target: local
logger:
  level: info
  file: server.log
"#,
        )
        .unwrap();
        assert!(!c.caching.enabled);
        assert_eq!(c.caching.ttl, 60);
    }

    #[test]
    fn load_reads_yaml_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(
            file,
            r#"
server:
  port: 8443
  cert_path: cert.pem
  key_path: key.pem
  routes:
    - path: /notes
      target: local
logger:
  level: info
  file: server.log
"#
        )
        .unwrap();
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8443);
        assert!(config.validate().is_ok());
    }
}
