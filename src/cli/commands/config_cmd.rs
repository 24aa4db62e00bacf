//! Configuration command.

use console::style;

use embedsniff::Config;

/// Print the effective configuration as TOML.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => eprintln!("{} Loaded from {}", style("→").dim(), path.display()),
        None => eprintln!("{} No config file found, using defaults", style("!").yellow()),
    }

    let toml = toml::to_string_pretty(config)?;
    print!("{}", toml);
    Ok(())
}
