use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::args::{OutputFormat, ScopeArg, DEFAULT_SERVE_ADDR};
use crate::cli::{BackendsArgs, CleanArgs, CursorArgs, DocstringArgs, ResolveArgs, ServeArgs};

/// Top-level representation of `.docres/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub resolve: Option<ResolveSection>,

    #[serde(default)]
    pub clean: Option<CleanSection>,

    #[serde(default)]
    pub docstring: Option<DocstringSection>,

    #[serde(default)]
    pub serve: Option<ServeSection>,

    #[serde(default)]
    pub http: Option<HttpSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveSection {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub scope: Option<ScopeArg>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanSection {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DocstringSection {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub on_new_line: Option<bool>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    #[serde(default)]
    pub addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    #[serde(default)]
    pub server_url: Option<String>,
}

/// Discover and load a project-local `.docres/config.toml` (or
/// `.docres/docres.toml`) starting from the current working
/// directory and walking up parent directories.
pub fn load_cli_config() -> Result<Option<CliConfig>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let config_path = find_project_config(&cwd);

    let Some(path) = config_path else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse TOML config at {}", path.display()))?;

    tracing::debug!(path = %path.display(), "loaded project config");
    Ok(Some(config))
}

fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);

    while let Some(current) = dir {
        let docres_dir = current.join(".docres");
        let config_toml = docres_dir.join("config.toml");
        if config_toml.is_file() {
            return Some(config_toml);
        }

        let docres_toml = docres_dir.join("docres.toml");
        if docres_toml.is_file() {
            return Some(docres_toml);
        }

        dir = current.parent();
    }

    None
}

fn apply_backend_default(cursor: &mut CursorArgs, backend: &Option<String>) {
    if cursor.backend.is_none() {
        if let Some(backend) = backend {
            cursor.backend = Some(backend.clone());
        }
    }
}

/// Fill `server` from the section value, falling back to the global
/// `[http] server_url`.
fn apply_server_default(
    config: &CliConfig,
    server: &mut Option<String>,
    section_server: Option<&String>,
) {
    if server.is_some() {
        return;
    }
    if let Some(url) = section_server {
        *server = Some(url.clone());
    } else if let Some(http) = &config.http {
        if let Some(url) = &http.server_url {
            *server = Some(url.clone());
        }
    }
}

pub fn apply_resolve_config_defaults(config: &CliConfig, args: &mut ResolveArgs) {
    if let Some(resolve) = &config.resolve {
        apply_backend_default(&mut args.cursor, &resolve.backend);

        if matches!(args.cursor.scope, ScopeArg::Context) {
            if let Some(scope) = resolve.scope {
                args.cursor.scope = scope;
            }
        }

        if matches!(args.format, OutputFormat::Text) {
            if let Some(format) = resolve.format {
                args.format = format;
            }
        }

        apply_server_default(config, &mut args.server, resolve.server.as_ref());

        if !args.no_server {
            if let Some(true) = resolve.no_server {
                args.no_server = true;
            }
        }
    } else {
        apply_server_default(config, &mut args.server, None);
    }
}

pub fn apply_clean_config_defaults(config: &CliConfig, args: &mut CleanArgs) {
    if let Some(clean) = &config.clean {
        apply_backend_default(&mut args.cursor, &clean.backend);

        if args.skip.is_empty() && !clean.skip.is_empty() {
            args.skip = clean.skip.clone();
        }

        if matches!(args.format, OutputFormat::Text) {
            if let Some(format) = clean.format {
                args.format = format;
            }
        }

        apply_server_default(config, &mut args.server, clean.server.as_ref());

        if !args.no_server {
            if let Some(true) = clean.no_server {
                args.no_server = true;
            }
        }
    } else {
        apply_server_default(config, &mut args.server, None);
    }
}

pub fn apply_docstring_config_defaults(config: &CliConfig, args: &mut DocstringArgs) {
    if let Some(docstring) = &config.docstring {
        apply_backend_default(&mut args.cursor, &docstring.backend);

        if !args.on_new_line {
            if let Some(true) = docstring.on_new_line {
                args.on_new_line = true;
            }
        }

        apply_server_default(config, &mut args.server, docstring.server.as_ref());

        if !args.no_server {
            if let Some(true) = docstring.no_server {
                args.no_server = true;
            }
        }
    } else {
        apply_server_default(config, &mut args.server, None);
    }
}

pub fn apply_backends_config_defaults(config: &CliConfig, args: &mut BackendsArgs) {
    apply_server_default(config, &mut args.server, None);
}

pub fn apply_serve_config_defaults(config: &CliConfig, args: &mut ServeArgs) {
    if let Some(serve) = &config.serve {
        if args.addr == DEFAULT_SERVE_ADDR {
            if let Some(addr) = &serve.addr {
                args.addr = addr.clone();
            }
        }
    }
}
