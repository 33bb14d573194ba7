use {
    anyhow::{Result, bail},
    clap::Subcommand,
    toolbay_service_traits::SettingsService,
};

use crate::Services;

#[derive(Subcommand)]
pub enum ConsentAction {
    /// Show consent for one tool, or for every tool with a recorded decision.
    Status { tool: Option<String> },
    /// Allow a tool's declared policy exceptions.
    Grant { tool: String },
    /// Withdraw consent; the tool falls back to the baseline policy.
    Revoke { tool: String },
}

pub async fn handle_consent(services: &Services, action: ConsentAction) -> Result<()> {
    match action {
        ConsentAction::Status { tool: Some(tool) } => {
            let granted = services.consent.has_consent(&tool).await;
            println!("{tool}: {}", label(granted));
        },
        ConsentAction::Status { tool: None } => {
            let records = services.consent.records().await;
            if records.is_empty() {
                println!("No consent decisions recorded.");
            }
            for (tool, record) in records {
                println!("  {tool}: {}", label(record.granted));
            }
        },
        ConsentAction::Grant { tool } => {
            ensure_known(services, &tool)?;
            services.consent.grant_consent(&tool).await?;
            println!("Consent granted for {tool}.");
        },
        ConsentAction::Revoke { tool } => {
            services.consent.revoke_consent(&tool).await?;
            println!("Consent revoked for {tool}.");
        },
    }
    Ok(())
}

fn label(granted: bool) -> &'static str {
    if granted { "granted" } else { "not granted" }
}

/// Consent is only recorded for installed tools; revoking stays allowed so
/// stale entries can be cleared after an uninstall.
fn ensure_known(services: &Services, tool_id: &str) -> Result<()> {
    if services.catalog.tools().iter().any(|t| t.id == tool_id) {
        Ok(())
    } else {
        bail!("unknown tool: {tool_id}")
    }
}
