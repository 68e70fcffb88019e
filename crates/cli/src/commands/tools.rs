use serde::Serialize;
use sneakerdesk_agent::ToolCatalog;
use sneakerdesk_core::config::{AppConfig, CatalogProfile, LoadOptions};
use sneakerdesk_core::ToolDescriptor;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ToolListing<'a> {
    command: &'static str,
    status: &'static str,
    profile: &'static str,
    tools: Vec<ToolEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ToolEntry<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: serde_json::Value,
}

impl<'a> From<&'a ToolDescriptor> for ToolEntry<'a> {
    fn from(descriptor: &'a ToolDescriptor) -> Self {
        Self {
            name: &descriptor.name,
            description: &descriptor.description,
            input_schema: descriptor.input_schema(),
        }
    }
}

pub fn run(profile: Option<CatalogProfile>) -> CommandResult {
    let profile = match profile {
        Some(profile) => profile,
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => config.tools.catalog,
            Err(error) => {
                return CommandResult::failure("tools", "config_validation", error.to_string(), 2)
            }
        },
    };

    let catalog = ToolCatalog::for_profile(profile);
    CommandResult::document(
        "tools",
        &ToolListing {
            command: "tools",
            status: "ok",
            profile: profile.as_str(),
            tools: catalog.descriptors().iter().map(ToolEntry::from).collect(),
        },
    )
}
