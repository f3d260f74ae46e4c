//! Request-level resolver engine.
//!
//! Translates protocol positions to document positions, picks the
//! backend, and runs one analyzer operation per request. Used by the
//! CLI for local execution and by the HTTP daemon.

use crate::analyzer::{self, AnalyzerError, AnalyzerResult};
use crate::cleaner::CleanError;
use crate::docstring::{plan_docstring_edit, EditError};
use crate::entity::CodeEntity;
use crate::models::{
    BackendsResponse, CleanRequest, CleanResponse, DocstringEditRequest, DocstringEditResponse,
    DocumentPosition, EntityQuery, EntityScope, ProtocolPosition, ResolveRequest, ResolveResponse,
    ENTITY_RESULT_VERSION,
};

/// Backend used when a request does not name one.
pub const DEFAULT_BACKEND: &str = "structural";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("no enclosing {scope} at line {line}, character {character}")]
    NoEntity {
        scope: &'static str,
        line: u32,
        character: u32,
    },
}

impl ResolveError {
    /// Whether the error is a defect rather than a problem with the
    /// request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ResolveError::Analyzer(AnalyzerError::Internal(_) | AnalyzerError::Language(_))
        )
    }
}

/// Innermost function, class or module around `position`.
pub fn resolve_entity(
    source: &str,
    position: ProtocolPosition,
    backend: &str,
) -> AnalyzerResult<CodeEntity> {
    let cursor = DocumentPosition::from_protocol(position)?;
    let analyzer = analyzer::create_analyzer(backend, source)?;
    analyzer.get_context(cursor)
}

/// Resolve the entity a query asks for. Returns the canonical backend
/// name along with the entity.
fn resolve_query(query: &EntityQuery) -> AnalyzerResult<(String, Option<CodeEntity>)> {
    let requested = query.backend.as_deref().unwrap_or(DEFAULT_BACKEND);
    let cursor = DocumentPosition::from_protocol(query.position)?;
    let analyzer = analyzer::create_analyzer(requested, &query.source)?;

    let entity = match query.scope {
        EntityScope::Context => Some(analyzer.get_context(cursor)?),
        EntityScope::Function => analyzer.get_function(cursor)?,
        EntityScope::Class => analyzer.get_class(cursor)?,
        EntityScope::Module => Some(analyzer.get_module(cursor)?),
    };
    tracing::debug!(
        backend = analyzer.name(),
        scope = ?query.scope,
        found = entity.is_some(),
        "resolved query"
    );
    Ok((analyzer.name().to_string(), entity))
}

fn require_entity(
    query: &EntityQuery,
    entity: Option<CodeEntity>,
) -> Result<CodeEntity, ResolveError> {
    entity.ok_or(ResolveError::NoEntity {
        scope: scope_name(query.scope),
        line: query.position.line,
        character: query.position.character,
    })
}

fn scope_name(scope: EntityScope) -> &'static str {
    match scope {
        EntityScope::Context => "entity",
        EntityScope::Function => "function",
        EntityScope::Class => "class",
        EntityScope::Module => "module",
    }
}

pub fn run_resolve(request: ResolveRequest) -> Result<ResolveResponse, ResolveError> {
    let (backend, entity) = resolve_query(&request.query)?;
    Ok(ResolveResponse {
        version: ENTITY_RESULT_VERSION.to_string(),
        backend,
        entity,
    })
}

pub fn run_clean(request: CleanRequest) -> Result<CleanResponse, ResolveError> {
    let (backend, entity) = resolve_query(&request.query)?;
    let entity = require_entity(&request.query, entity)?;
    let code = entity.clean(&request.skip)?;
    Ok(CleanResponse {
        version: ENTITY_RESULT_VERSION.to_string(),
        backend,
        kind: entity.kind(),
        name: entity.name().map(str::to_string),
        code,
    })
}

pub fn run_docstring_edit(
    request: DocstringEditRequest,
) -> Result<DocstringEditResponse, ResolveError> {
    let (backend, entity) = resolve_query(&request.query)?;
    let entity = require_entity(&request.query, entity)?;
    let edit = plan_docstring_edit(
        &entity,
        &request.docstring,
        request.on_new_line,
        &request.query.source,
    )?;
    let patched = edit.apply(&request.query.source)?;
    Ok(DocstringEditResponse {
        version: ENTITY_RESULT_VERSION.to_string(),
        backend,
        name: entity.name().unwrap_or_default().to_string(),
        edit,
        patched,
    })
}

pub fn list_backends() -> BackendsResponse {
    BackendsResponse {
        default: DEFAULT_BACKEND.to_string(),
        backends: analyzer::registry().available_names(),
    }
}
