use crate::error::ServerError;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

/// Planning poker room server
#[derive(Parser, Debug, Clone)]
#[command(name = "planning-poker-server")]
#[command(about = "Real-time planning poker room over WebSocket")]
#[command(version)]
pub struct Args {
    /// Interface to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn listen_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ServerError::Addr(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["planning-poker-server"]).unwrap();
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn listen_addr_from_flags() {
        let args =
            Args::try_parse_from(["planning-poker-server", "--host", "127.0.0.1", "--port", "4100"])
                .unwrap();
        assert_eq!(args.listen_addr().unwrap(), "127.0.0.1:4100".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bad_host_is_rejected() {
        let args = Args::try_parse_from(["planning-poker-server", "--host", "not-an-ip"]).unwrap();
        assert!(matches!(args.listen_addr(), Err(ServerError::Addr(_))));
    }
}
