//! Per-server settings commands

use anyhow::Result;
use clap::Subcommand;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use amoeboid_core::{Actor, CardService};

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show or change a server's command prefix
    Prefix {
        #[clap(long)]
        server: String,

        /// New prefix; omit to show the current one
        value: Option<String>,

        /// Act as a server administrator
        #[clap(long)]
        admin: bool,
    },

    /// Show or change a server's mention wrapping, e.g. "[[*]]"
    Wrapping {
        #[clap(long)]
        server: String,

        /// New wrapping; omit to show the current one
        value: Option<String>,

        #[clap(long)]
        admin: bool,
    },

    /// Show the effective settings for a server
    Show {
        #[clap(long)]
        server: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

#[derive(Tabled)]
struct SettingsRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Wrapping")]
    wrapping: String,
}

impl SettingsCommand {
    pub fn execute(self, service: &CardService) -> Result<()> {
        match self {
            SettingsCommand::Prefix {
                server,
                value,
                admin,
            } => report(service.prefix(&actor(admin), &server, value.as_deref())),
            SettingsCommand::Wrapping {
                server,
                value,
                admin,
            } => report(service.wrapping(&actor(admin), &server, value.as_deref())),
            SettingsCommand::Show { server, json } => {
                let settings = service.settings().get(&server)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                    return Ok(());
                }

                let rows = vec![SettingsRow {
                    server: settings.server_id,
                    prefix: settings.command_prefix,
                    wrapping: settings.wrapping_pattern,
                }];
                let table = Table::new(&rows)
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()))
                    .to_string();
                println!("{table}");
                Ok(())
            }
        }
    }
}

fn actor(admin: bool) -> Actor {
    if admin {
        Actor::admin()
    } else {
        Actor::member()
    }
}

/// Print the command's reply; refusals are replies too
fn report(result: amoeboid_core::Result<String>) -> Result<()> {
    match result {
        Ok(text) => println!("{text}"),
        Err(e) if e.is_user_facing() => println!("{e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
