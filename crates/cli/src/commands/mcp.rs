//! `forgehand mcp` — Inspect external tool providers.

use forgehand_config::AppConfig;
use forgehand_mcp::McpManager;

/// List the providers in the config file.
pub async fn status() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.mcp_servers.is_empty() {
        println!("No external tool providers configured.");
        println!(
            "Add [[mcp_servers]] entries to {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        return Ok(());
    }

    println!("{:<20} {:<12} COMMAND", "NAME", "AUTO-START");
    for server in &config.mcp_servers {
        println!(
            "{:<20} {:<12} {} {}",
            server.name,
            if server.auto_start { "yes" } else { "no" },
            server.command,
            server.args.join(" "),
        );
    }

    Ok(())
}

/// Start one provider and print the tools it declares.
pub async fn tools(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let spec = config
        .mcp_servers
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| format!("No provider named '{name}' in the config file"))?
        .clone();

    let manager = McpManager::new();
    manager.start(spec).await?;

    let result = manager.list_tools(name).await;
    manager.shutdown_all().await;

    let tools = result?;
    if tools.is_empty() {
        println!("Provider '{name}' declares no tools.");
        return Ok(());
    }

    for tool in tools {
        println!("{:<24} {}", tool.name, tool.description);
    }

    Ok(())
}
