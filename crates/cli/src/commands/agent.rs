//! `forgehand agent` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use forgehand_agent::AgentLoop;
use forgehand_config::AppConfig;
use forgehand_core::event::{DomainEvent, EventBus};
use forgehand_core::message::{Conversation, Message};
use forgehand_core::tool::{RemoteToolTransport, ToolHandler, ToolRegistry};
use forgehand_mcp::McpManager;
use forgehand_providers::OpenAiCompatProvider;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    FORGEHAND_API_KEY");
        eprintln!("    ZAI_API_KEY");
        eprintln!("    OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let provider = match &config.base_url {
        Some(url) => OpenAiCompatProvider::new("custom", url, &api_key),
        None => OpenAiCompatProvider::zai(&api_key),
    }
    .with_cancellation(cancel.clone());

    // Built-in tools plus anything external providers declare
    let mut registry = forgehand_tools::default_registry(config.tools.allowed_commands.clone())
        .with_local_timeout(
            std::time::Duration::from_secs(config.tools.timeout_secs),
            std::time::Duration::from_secs(config.tools.max_timeout_secs),
        );

    let event_bus = Arc::new(EventBus::default());
    let manager = Arc::new(McpManager::new());
    manager.start_configured(&config.mcp_servers).await;
    attach_provider_tools(&mut registry, &manager, &event_bus).await;

    spawn_activity_printer(&event_bus);

    let mut agent = AgentLoop::new(
        Arc::new(provider),
        &config.default_model,
        config.default_temperature,
        Arc::new(registry),
        event_bus,
    )
    .with_max_tokens(config.default_max_tokens)
    .with_max_iterations(config.agent.max_iterations)
    .with_cancellation(cancel.clone());

    if let Some(prompt) = &config.system_prompt {
        agent = agent.with_system_prompt(prompt);
    }

    let result = if let Some(msg) = message {
        run_single(&agent, &msg).await
    } else {
        run_interactive(&agent, &config).await
    };

    manager.shutdown_all().await;
    result
}

async fn run_single(
    agent: &AgentLoop,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = Conversation::new();
    conv.push(Message::user(message));

    // Chunks print as they stream; the return value is already on screen
    agent
        .process(&mut conv, |chunk| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        })
        .await?;

    println!();
    Ok(())
}

async fn run_interactive(
    agent: &AgentLoop,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  forgehand — interactive mode");
    println!("  Model: {}", config.default_model);
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let stdin = std::io::stdin();
    let mut conv = Conversation::new();

    loop {
        print!("  you > ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        conv.push(Message::user(line));
        println!();

        match agent
            .process(&mut conv, |chunk| {
                print!("{chunk}");
                let _ = std::io::stdout().flush();
            })
            .await
        {
            Ok(_) => {
                println!();
                println!();
            }
            Err(e) => {
                eprintln!();
                eprintln!("  error: {e}");
                eprintln!();
            }
        }
    }

    Ok(())
}

/// Register every tool the running external providers declare.
async fn attach_provider_tools(
    registry: &mut ToolRegistry,
    manager: &Arc<McpManager>,
    event_bus: &EventBus,
) {
    for (name, running) in manager.status().await {
        if !running {
            continue;
        }
        match manager.list_tools(&name).await {
            Ok(definitions) => {
                let tool_count = definitions.len();
                for definition in definitions {
                    registry.register(
                        definition,
                        ToolHandler::Remote {
                            transport: manager.clone() as Arc<dyn RemoteToolTransport>,
                            provider: name.clone(),
                        },
                    );
                }
                event_bus.publish(DomainEvent::ToolProviderStarted {
                    name,
                    tool_count,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "Failed to list provider tools");
            }
        }
    }
}

/// Print tool activity while the model is working.
fn spawn_activity_printer(event_bus: &Arc<EventBus>) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let DomainEvent::ToolExecuted {
                tool_name,
                success,
                duration_ms,
                ..
            } = event.as_ref()
            {
                let marker = if *success { "·" } else { "!" };
                eprintln!("  {marker} {tool_name} ({duration_ms}ms)");
            }
        }
    });
}
