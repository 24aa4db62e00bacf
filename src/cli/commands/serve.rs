//! Web server command.

use embedsniff::Config;

use crate::cli::icons::{dim_arrow, info};

/// Start the web server.
pub async fn cmd_serve(config: Config, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, config.server.port)?,
        None => (config.server.host.clone(), config.server.port),
    };

    println!(
        "{} Starting embedsniff server at http://{}:{}",
        info(),
        host,
        port
    );
    if let Some(ref path) = config.source_path {
        println!("  {} Config: {}", dim_arrow(), path.display());
    }
    println!("  Press Ctrl+C to stop");

    embedsniff::server::serve(config, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3001" -> 0.0.0.0:3001
/// - Just a host: "127.0.0.1" -> 127.0.0.1:<default_port>
/// - Host and port: "127.0.0.1:8080" -> 127.0.0.1:8080
fn parse_bind_address(bind: &str, default_port: u16) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("Empty bind address");
    }

    // Try parsing as just a port number
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("0.0.0.0".to_string(), port));
    }

    // Try parsing as host:port
    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
        anyhow::bail!("Invalid port in bind address: {}", bind);
    }

    // Must be just a host, use default port
    Ok((bind.to_string(), default_port))
}
