//! Shared data models for resolver requests, responses and positions.
//!
//! These types form the stable JSON API surface used by the CLI
//! and the HTTP daemon.

use serde::{Deserialize, Serialize};

use crate::docstring::DocstringEdit;
use crate::entity::{CodeEntity, EntityKind};

pub mod position;

pub use position::{
    DocumentPosition, DocumentRange, InvalidPosition, InvalidRange, LocalPosition,
    ProtocolPosition, ProtocolRange,
};

/// Schema version for resolver JSON payloads.
///
/// This version follows semver semantics (MAJOR.MINOR.PATCH):
/// - MAJOR: Breaking changes to required fields or field semantics.
/// - MINOR: Backward-compatible additions (new optional fields).
/// - PATCH: Documentation or internal changes only.
pub const ENTITY_RESULT_VERSION: &str = "1.0.0";

/// Which entity a request asks for at the cursor.
///
/// `Context` is the innermost function, class or module; the other
/// scopes look for the nearest enclosing entity of one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityScope {
    #[default]
    Context,
    Function,
    Class,
    Module,
}

/// Source text plus a cursor, shared by every resolver request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Full source text of the document.
    pub source: String,
    /// Cursor in protocol coordinates (0-based line).
    pub position: ProtocolPosition,
    /// Backend name or alias. The default backend is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default)]
    pub scope: EntityScope,
}

/// Request for `POST /v1/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    #[serde(flatten)]
    pub query: EntityQuery,
}

/// Resolved entity, or `None` when no entity of the requested scope
/// encloses the cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub version: String,
    /// Canonical name of the backend that resolved the entity.
    pub backend: String,
    pub entity: Option<CodeEntity>,
}

/// Request for `POST /v1/clean`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanRequest {
    #[serde(flatten)]
    pub query: EntityQuery,
    /// Cleaning methods to leave out.
    #[serde(default)]
    pub skip: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanResponse {
    pub version: String,
    pub backend: String,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Cleaned code of the resolved entity.
    pub code: String,
}

/// Request for `POST /v1/docstring/edit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocstringEditRequest {
    #[serde(flatten)]
    pub query: EntityQuery,
    /// Generated docstring, in any shape the generator produced.
    pub docstring: String,
    #[serde(default)]
    pub on_new_line: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocstringEditResponse {
    pub version: String,
    pub backend: String,
    /// Name of the class or function receiving the docstring.
    pub name: String,
    pub edit: DocstringEdit,
    /// The source with the edit applied.
    pub patched: String,
}

/// Response for `GET /v1/backends`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendsResponse {
    pub default: String,
    pub backends: Vec<String>,
}
