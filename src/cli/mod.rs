use std::fs;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use crate::models::ENTITY_RESULT_VERSION;
use crate::resolver;
use crate::server;

mod args;
mod config;
mod format;
mod http_backend;

pub use args::{
    BackendsArgs, Cli, CleanArgs, Commands, CursorArgs, DocstringArgs, OutputFormat, ResolveArgs,
    ScopeArg, ServeArgs,
};

use config::{
    apply_backends_config_defaults, apply_clean_config_defaults, apply_docstring_config_defaults,
    apply_resolve_config_defaults, apply_serve_config_defaults, load_cli_config,
};
use http_backend::HttpResolverBackend;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.schema_version {
        println!("Entity result JSON schema version: {}", ENTITY_RESULT_VERSION);
        return Ok(());
    }

    let cli_config = load_cli_config()?;

    match cli.command {
        Some(Commands::Resolve(mut resolve_args)) => {
            if let Some(ref config) = cli_config {
                apply_resolve_config_defaults(config, &mut resolve_args);
            }

            let request = args::resolve_request_from_args(&resolve_args)?;
            let response = if let Some(server_url) =
                effective_server_url(resolve_args.server.as_deref(), resolve_args.no_server)
            {
                let backend = HttpResolverBackend::new(server_url)?;
                backend.resolve(&request)?
            } else {
                resolver::run_resolve(request)?
            };

            match resolve_args.format {
                OutputFormat::Text => format::print_resolve_text(&response),
                OutputFormat::Json => print_json(&response),
            }
        }
        Some(Commands::Clean(mut clean_args)) => {
            if let Some(ref config) = cli_config {
                apply_clean_config_defaults(config, &mut clean_args);
            }

            let request = args::clean_request_from_args(&clean_args)?;
            let response = if let Some(server_url) =
                effective_server_url(clean_args.server.as_deref(), clean_args.no_server)
            {
                let backend = HttpResolverBackend::new(server_url)?;
                backend.clean(&request)?
            } else {
                resolver::run_clean(request)?
            };

            match clean_args.format {
                OutputFormat::Text => format::print_clean_text(&response),
                OutputFormat::Json => print_json(&response),
            }
        }
        Some(Commands::Docstring(mut docstring_args)) => {
            if let Some(ref config) = cli_config {
                apply_docstring_config_defaults(config, &mut docstring_args);
            }

            let request = args::docstring_request_from_args(&docstring_args)?;
            let response = if let Some(server_url) =
                effective_server_url(docstring_args.server.as_deref(), docstring_args.no_server)
            {
                let backend = HttpResolverBackend::new(server_url)?;
                backend.docstring_edit(&request)?
            } else {
                resolver::run_docstring_edit(request)?
            };

            if docstring_args.write {
                let path = &docstring_args.cursor.file;
                fs::write(path, &response.patched)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), entity = %response.name, "wrote docstring");
            }

            match docstring_args.format {
                OutputFormat::Json => print_json(&response),
                OutputFormat::Text if docstring_args.write => {
                    println!(
                        "Updated docstring of {} in {}",
                        response.name,
                        docstring_args.cursor.file.display()
                    );
                    Ok(())
                }
                OutputFormat::Text => {
                    print!("{}", response.patched);
                    Ok(())
                }
            }
        }
        Some(Commands::Backends(mut backends_args)) => {
            if let Some(ref config) = cli_config {
                apply_backends_config_defaults(config, &mut backends_args);
            }

            let response = if let Some(server_url) =
                effective_server_url(backends_args.server.as_deref(), backends_args.no_server)
            {
                let backend = HttpResolverBackend::new(server_url)?;
                backend.backends()?
            } else {
                resolver::list_backends()
            };

            match backends_args.format {
                OutputFormat::Text => format::print_backends_text(&response),
                OutputFormat::Json => print_json(&response),
            }
        }
        Some(Commands::Serve(mut serve_args)) => {
            if let Some(ref config) = cli_config {
                apply_serve_config_defaults(config, &mut serve_args);
            }

            let addr: SocketAddr = serve_args
                .addr
                .parse()
                .with_context(|| format!("invalid listen address {}", serve_args.addr))?;
            println!("Starting docres HTTP server on http://{addr}");

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(server::run(addr))?;
            Ok(())
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    serde_json::to_writer(std::io::stdout(), value)?;
    println!();
    Ok(())
}

fn effective_server_url(server_flag: Option<&str>, no_server: bool) -> Option<String> {
    if no_server {
        None
    } else {
        server_flag.map(|s| s.to_string())
    }
}
