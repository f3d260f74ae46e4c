use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::models::{
    CleanRequest, DocstringEditRequest, EntityQuery, EntityScope, ProtocolPosition,
    ResolveRequest,
};

/// Top-level CLI entrypoint for `docres`.
#[derive(Parser, Debug)]
#[command(
    name = "docres",
    about = "Resolve Python code entities for docstring generation",
    author = "docres developers",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    /// Print the JSON schema version used for `--format=json` output
    /// and exit.
    #[arg(long = "schema-version")]
    pub schema_version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the entity enclosing a cursor.
    Resolve(ResolveArgs),
    /// Print the cleaned code of the entity enclosing a cursor.
    Clean(CleanArgs),
    /// Insert or replace the docstring of the entity at a cursor.
    Docstring(DocstringArgs),
    /// List the available analyzer backends.
    Backends(BackendsArgs),
    /// Run a long-lived HTTP+JSON daemon.
    Serve(ServeArgs),
}

/// Source file and cursor shared by the entity subcommands.
#[derive(Args, Debug)]
pub struct CursorArgs {
    /// Python source file to analyze.
    pub file: PathBuf,

    /// Cursor line (0-based, as editors report it).
    #[arg(short = 'l', long = "line")]
    pub line: u32,

    /// Cursor column (0-based byte offset within the line).
    #[arg(short = 'c', long = "character", default_value_t = 0)]
    pub character: u32,

    /// Analyzer backend name or alias (e.g. "structural", "symbols").
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Which enclosing entity to resolve.
    #[arg(long = "scope", value_enum, default_value_t = ScopeArg::Context)]
    pub scope: ScopeArg,
}

/// Arguments specific to the `resolve` subcommand.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub cursor: CursorArgs,

    /// Output format.
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating resolution to a daemon.
    ///
    /// When set (or when `DOCRES_SERVER_URL` is defined), requests are
    /// sent to the HTTP server instead of running locally. Use
    /// `--no-server` to override this and force local execution.
    #[arg(long = "server", env = "DOCRES_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local execution.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `clean` subcommand.
#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub cursor: CursorArgs,

    /// Cleaning methods to skip: `docstring`, `comments`, `blank_lines`,
    /// `indentation`. Multiple methods can be combined via commas or
    /// repeated flags.
    #[arg(long = "skip", value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Output format.
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating cleaning to a daemon.
    #[arg(long = "server", env = "DOCRES_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local execution.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `docstring` subcommand.
#[derive(Args, Debug)]
pub struct DocstringArgs {
    #[command(flatten)]
    pub cursor: CursorArgs,

    /// Generated docstring text.
    #[arg(long = "text", conflicts_with = "text_file")]
    pub text: Option<String>,

    /// Read the generated docstring from a file.
    #[arg(long = "text-file")]
    pub text_file: Option<PathBuf>,

    /// Put multi-line docstrings on the line after the opening quotes.
    #[arg(long = "on-new-line")]
    pub on_new_line: bool,

    /// Write the patched source back to FILE instead of printing it.
    #[arg(long = "write")]
    pub write: bool,

    /// Output format.
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating edit planning to a daemon.
    #[arg(long = "server", env = "DOCRES_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local execution.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `backends` subcommand.
#[derive(Args, Debug)]
pub struct BackendsArgs {
    /// Output format.
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for querying a daemon's backends.
    #[arg(long = "server", env = "DOCRES_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local execution.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to, e.g. "127.0.0.1:7979".
    #[arg(long = "addr", default_value = DEFAULT_SERVE_ADDR)]
    pub addr: String,
}

pub const DEFAULT_SERVE_ADDR: &str = "127.0.0.1:7979";

/// Output format for CLI results.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Entity scope for the CLI.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeArg {
    Context,
    Function,
    Class,
    Module,
}

impl ScopeArg {
    pub fn to_model(self) -> EntityScope {
        match self {
            ScopeArg::Context => EntityScope::Context,
            ScopeArg::Function => EntityScope::Function,
            ScopeArg::Class => EntityScope::Class,
            ScopeArg::Module => EntityScope::Module,
        }
    }
}

/// Read the source file and build the query shared by every request.
pub fn entity_query_from_args(args: &CursorArgs) -> Result<EntityQuery> {
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read source file {}", args.file.display()))?;

    Ok(EntityQuery {
        source,
        position: ProtocolPosition::new(args.line, args.character),
        backend: args.backend.clone(),
        scope: args.scope.to_model(),
    })
}

pub fn resolve_request_from_args(args: &ResolveArgs) -> Result<ResolveRequest> {
    Ok(ResolveRequest {
        query: entity_query_from_args(&args.cursor)?,
    })
}

pub fn clean_request_from_args(args: &CleanArgs) -> Result<CleanRequest> {
    let skip = args
        .skip
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    Ok(CleanRequest {
        query: entity_query_from_args(&args.cursor)?,
        skip,
    })
}

pub fn docstring_request_from_args(args: &DocstringArgs) -> Result<DocstringEditRequest> {
    let docstring = match (&args.text, &args.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read docstring file {}", path.display()))?,
        (None, None) => anyhow::bail!("either --text or --text-file is required"),
    };

    Ok(DocstringEditRequest {
        query: entity_query_from_args(&args.cursor)?,
        docstring,
        on_new_line: args.on_new_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cursor_args(file: PathBuf) -> CursorArgs {
        CursorArgs {
            file,
            line: 1,
            character: 4,
            backend: Some("symbols".to_string()),
            scope: ScopeArg::Function,
        }
    }

    #[test]
    fn query_reads_source_and_keeps_protocol_position() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("sample.py");
        fs::write(&path, "def f():\n    pass\n").expect("write");

        let query = entity_query_from_args(&cursor_args(path)).expect("query");
        assert_eq!(query.source, "def f():\n    pass\n");
        assert_eq!(query.position, ProtocolPosition::new(1, 4));
        assert_eq!(query.backend.as_deref(), Some("symbols"));
        assert_eq!(query.scope, EntityScope::Function);
    }

    #[test]
    fn missing_source_file_is_reported() {
        let err = entity_query_from_args(&cursor_args(PathBuf::from("does/not/exist.py")))
            .expect_err("missing file");
        assert!(err.to_string().contains("failed to read source file"));
    }

    #[test]
    fn clean_request_trims_skip_names() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("sample.py");
        fs::write(&path, "x = 1\n").expect("write");

        let args = CleanArgs {
            cursor: cursor_args(path),
            skip: vec![" comments".to_string(), "".to_string(), "blank_lines ".to_string()],
            format: OutputFormat::Json,
            server: None,
            no_server: false,
        };
        let request = clean_request_from_args(&args).expect("request");
        assert_eq!(request.skip, vec!["comments".to_string(), "blank_lines".to_string()]);
    }

    #[test]
    fn docstring_request_requires_text() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("sample.py");
        fs::write(&path, "def f():\n    pass\n").expect("write");

        let mut args = DocstringArgs {
            cursor: cursor_args(path),
            text: None,
            text_file: None,
            on_new_line: false,
            write: false,
            format: OutputFormat::Text,
            server: None,
            no_server: false,
        };
        assert!(docstring_request_from_args(&args).is_err());

        args.text = Some("Do nothing.".to_string());
        let request = docstring_request_from_args(&args).expect("request");
        assert_eq!(request.docstring, "Do nothing.");
    }
}
