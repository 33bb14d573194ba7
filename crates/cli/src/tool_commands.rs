use {
    anyhow::{Result, bail},
    clap::Subcommand,
    toolbay_sandbox::PolicyComposer,
    toolbay_service_traits::SettingsService,
};

use crate::Services;

#[derive(Subcommand)]
pub enum ToolsAction {
    /// List discovered tools.
    List {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_tools(services: &Services, action: ToolsAction) -> Result<()> {
    match action {
        ToolsAction::List { json } => {
            let tools = services.catalog.tools();
            if json {
                println!("{}", serde_json::to_string_pretty(tools)?);
                return Ok(());
            }
            if tools.is_empty() {
                println!("No tools found.");
            }
            for tool in tools {
                println!(
                    "  {} {} — {} [{}] {}",
                    tool.id,
                    tool.version,
                    tool.name,
                    tool.asset_root.label(),
                    tool.content_base().display()
                );
            }
            Ok(())
        },
    }
}

pub async fn print_policy(services: &Services, tool_id: &str) -> Result<()> {
    let Some(tool) = services.catalog.tools().iter().find(|t| t.id == tool_id) else {
        bail!("unknown tool: {tool_id}");
    };
    let consent = services.consent.has_consent(tool_id).await;
    let composer = PolicyComposer::new(services.config.content.scheme.clone());
    println!(
        "{}",
        composer.build_policy(tool, consent, &tool.policy_exceptions)
    );
    if !consent && !tool.policy_exceptions.is_empty() {
        eprintln!(
            "note: {tool_id} declares {} policy exception(s); they apply once consent is granted",
            tool.policy_exceptions.len()
        );
    }
    Ok(())
}
