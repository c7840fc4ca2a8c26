//! Relay server configuration

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Relay server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Address advertised in URLs and the script (None = discover)
    pub advertised_ip: Option<IpAddr>,

    /// Maximum concurrent websocket clients (0 = unlimited)
    pub max_connections: usize,

    /// Frame rate substituted into the client script
    pub fps: u32,

    /// Directory holding `index.js` and `static/`
    pub web_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            advertised_ip: None,
            max_connections: 0, // Unlimited
            fps: 30,
            web_root: PathBuf::from("web"),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set only the port, keeping the bind IP
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the advertised address
    pub fn advertised_ip(mut self, ip: IpAddr) -> Self {
        self.advertised_ip = Some(ip);
        self
    }

    /// Set maximum websocket clients
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the frame rate reported to clients
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the web asset directory
    pub fn web_root(mut self, web_root: impl Into<PathBuf>) -> Self {
        self.web_root = web_root.into();
        self
    }

    /// Path of the client script template
    pub fn script_path(&self) -> PathBuf {
        self.web_root.join("index.js")
    }

    /// Directory served for every other path
    pub fn static_dir(&self) -> PathBuf {
        self.web_root.join("static")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.fps, 30);
        assert!(config.advertised_ip.is_none());
        assert_eq!(config.script_path(), PathBuf::from("web/index.js"));
        assert_eq!(config.static_dir(), PathBuf::from("web/static"));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_port_keeps_ip() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr).port(9000);

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_builder_chaining() {
        let ip: IpAddr = "192.168.1.20".parse().unwrap();
        let config = ServerConfig::default()
            .advertised_ip(ip)
            .max_connections(4)
            .fps(25)
            .web_root("/srv/web");

        assert_eq!(config.advertised_ip, Some(ip));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.fps, 25);
        assert_eq!(config.script_path(), PathBuf::from("/srv/web/index.js"));
    }
}
