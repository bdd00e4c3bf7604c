// Configuration module entry point
// Loads application configuration and builds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, DeliveryConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; `SERVER_*` environment variables override it
    /// (e.g. `SERVER_DELIVERY__GENERATE_ETAGS=false`).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("delivery.pages_dir", "pages")?
            .set_default("delivery.generate_etags", true)?
            .set_default("delivery.weak_etags", false)?
            .set_default("delivery.powered_by_header", true)?
            .set_default("delivery.stream_threshold", 65_536)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send::{PayloadOptions, Revalidate};

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("does-not-exist/render-relay").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.delivery.pages_dir, "pages");
        assert_eq!(cfg.delivery.index_files, vec!["index.html", "index.htm"]);
        assert!(cfg.delivery.generate_etags);
        assert!(cfg.delivery.powered_by_header);
        assert_eq!(cfg.delivery.stream_threshold, 65_536);
        assert!(cfg.delivery.cache.is_none());
        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn test_cache_policy_from_file() {
        let path = std::env::temp_dir().join(format!("render-relay-cfg-{}", std::process::id()));
        let file = path.with_extension("toml");
        std::fs::write(
            &file,
            "[delivery]\ncache = { type = \"private_stateless\", revalidate = 60 }\n",
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&file).unwrap();

        assert_eq!(
            cfg.delivery.cache,
            Some(PayloadOptions::PrivateStateless {
                revalidate: Revalidate::After(60)
            })
        );
    }
}
