pub mod handlers;

use crate::presentation::cli::{Cli, Commands, RunCommands, TemplateCommands};
use clap::Parser;
use handlers::SplitOptions;
use parcel_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Split {
            path,
            threshold,
            format,
            compression,
            level,
            config,
        } => handlers::handle_split(
            path,
            SplitOptions {
                threshold,
                format,
                compression,
                level,
                config,
            },
        ),
        Commands::Merge { path, format } => handlers::handle_merge(path, format),
        Commands::Status { path, format, json } => handlers::handle_status(path, format, json),
        Commands::Run(cmd) => match cmd {
            RunCommands::Render { config, json } => handlers::handle_run_render(config, json),
            RunCommands::Launch { config, dry_run } => handlers::handle_run_launch(config, dry_run),
            RunCommands::Preset {
                stage,
                model,
                output,
                template,
                datasets,
            } => handlers::handle_run_preset(stage, model, output, template, datasets),
        },
        Commands::Template(cmd) => match cmd {
            TemplateCommands::List => handlers::handle_template_list(),
            TemplateCommands::Show { name } => handlers::handle_template_show(name),
            TemplateCommands::Render {
                name,
                conversation,
                bos,
                eos,
            } => handlers::handle_template_render(name, conversation, bos, eos),
        },
    }
}
