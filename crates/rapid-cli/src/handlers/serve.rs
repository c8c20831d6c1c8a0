//! `rapid serve`: run the HTTP adapter.

use anyhow::Result;
use rapid_axum::{CorsConfig, ServerConfig, start_server};

use crate::bootstrap::CliConfig;

/// Build the server configuration from CLI settings.
pub fn server_config(config: CliConfig, port: u16, allow_origins: Vec<String>) -> ServerConfig {
    let cors = if allow_origins.is_empty() {
        CorsConfig::AllowAll
    } else {
        CorsConfig::AllowOrigins(allow_origins)
    };
    ServerConfig {
        port,
        cors,
        database_path: config.database_path,
        engine: config.engine,
    }
}

/// Serve until Ctrl-C.
pub async fn execute(config: CliConfig, port: u16, allow_origins: Vec<String>) -> Result<()> {
    start_server(server_config(config, port, allow_origins)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapid_core::EngineConfig;

    #[test]
    fn test_origins_restrict_cors() {
        let config = CliConfig {
            database_path: "/tmp/r.db".into(),
            engine: EngineConfig::new("/tmp/dl"),
        };
        let server = server_config(config.clone(), 8080, vec![]);
        assert!(matches!(server.cors, CorsConfig::AllowAll));
        assert_eq!(server.port, 8080);

        let server = server_config(config, 8080, vec!["http://localhost:3000".into()]);
        assert!(matches!(server.cors, CorsConfig::AllowOrigins(ref o) if o.len() == 1));
    }
}
