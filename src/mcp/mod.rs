//! MCP server for safe, surgical documentation writes.

mod client;
mod remote;
mod types;

use std::collections::HashMap;
use std::path::PathBuf;

pub use client::{ClientError, ScribeClient};
pub use remote::{run_remote_stdio_server, RemoteMcpServer};
pub use types::*;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use uuid::Uuid;

use crate::doc::SectionedDocument;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::*;

#[derive(Clone)]
pub struct McpServer {
    engine: Engine,
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    fn parse_uuid(s: &str) -> Result<Uuid, McpError> {
        Uuid::parse_str(s)
            .map_err(|e| McpError::invalid_params(format!("Invalid UUID: {}", e), None))
    }

    /// Caller errors and state conflicts are parameter problems the agent can
    /// act on; backend and corruption failures are internal.
    fn engine_err(e: EngineError) -> McpError {
        use EngineError::*;
        match &e {
            RepositoryNotFound(_) | SessionNotFound(_) | BranchNotFound(_)
            | ProtectedBranchViolation(_) | InvalidInput(_) | DuplicateHeading(_)
            | AmbiguousTrunk(_) | SessionConflict { .. } | SessionBusy(_)
            | NothingToCommit(_) | MalformedMarker { .. } => {
                McpError::invalid_params(e.to_string(), None)
            }
            VcsTimeout { .. } | Vcs(_) | RoundTripMismatch(_) => {
                McpError::internal_error(e.to_string(), None)
            }
        }
    }

    fn parse_changes(changes: Vec<ChangeInput>) -> Result<ChangeDescriptor, McpError> {
        let mut parsed = Vec::with_capacity(changes.len());
        for change in changes {
            let kind = ChangeKind::from_str(&change.kind).ok_or_else(|| {
                McpError::invalid_params(
                    format!(
                        "Invalid kind '{}'. Must be: added, removed, or modified",
                        change.kind
                    ),
                    None,
                )
            })?;
            parsed.push(ArtifactChange {
                kind,
                target_name: change.target_name,
                before_signature: change.before_signature,
                after_signature: change.after_signature,
            });
        }
        Ok(ChangeDescriptor { changes: parsed })
    }

    fn document_view(file_path: &str, doc: &SectionedDocument) -> DocumentResponse {
        DocumentResponse {
            file_path: file_path.to_string(),
            sections: doc
                .sections
                .iter()
                .map(|s| SectionView {
                    id: s.id.clone(),
                    heading: s.heading.clone(),
                    machine_content: s.machine_text(),
                    has_human_content: s.has_human_span(),
                })
                .collect(),
        }
    }

    // ============================================================
    // Test helpers - expose tool logic for testing
    // ============================================================

    pub async fn test_start_session(
        &self,
        repo_path: &str,
        caller_id: &str,
    ) -> Result<SessionResponse, McpError> {
        let session = self
            .engine
            .start_session(StartSessionInput {
                repo_path: PathBuf::from(repo_path),
                caller_id: caller_id.to_string(),
            })
            .await
            .map_err(Self::engine_err)?;

        Ok(SessionResponse {
            session_id: session.id.to_string(),
            active_branch: session.active_branch,
            trunk_branch: session.context.trunk_branch,
            repo_root: session.context.root_path.display().to_string(),
        })
    }

    pub async fn test_select_branch(
        &self,
        session_id: &str,
        name: Option<&str>,
        create: bool,
    ) -> Result<BranchResponse, McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        let selection = self
            .engine
            .select_branch(session_id, name.map(|s| s.to_string()), create)
            .await
            .map_err(Self::engine_err)?;

        Ok(BranchResponse {
            active_branch: selection.active_branch,
            created: selection.created,
        })
    }

    pub async fn test_write_document(
        &self,
        session_id: &str,
        file_path: &str,
        title: Option<&str>,
        sections: Vec<(String, String)>,
        message: Option<String>,
    ) -> Result<WriteResponse, McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        let outcome = self
            .engine
            .write_document(
                session_id,
                &PathBuf::from(file_path),
                title,
                sections,
                message,
            )
            .await
            .map_err(Self::engine_err)?;

        Ok(WriteResponse {
            committed: outcome.committed,
            commit: outcome.commit,
            section_ids: outcome.section_ids,
        })
    }

    pub async fn test_read_document(
        &self,
        session_id: &str,
        file_path: &str,
    ) -> Result<DocumentResponse, McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        let doc = self
            .engine
            .read_document(session_id, &PathBuf::from(file_path))
            .await
            .map_err(Self::engine_err)?;
        Ok(Self::document_view(file_path, &doc))
    }

    pub async fn test_analyze_impact(
        &self,
        session_id: &str,
        file_path: &str,
        changes: Vec<ChangeInput>,
    ) -> Result<ImpactResponse, McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        let descriptor = Self::parse_changes(changes)?;
        let report = self
            .engine
            .analyze_impact(session_id, &PathBuf::from(file_path), &descriptor)
            .await
            .map_err(Self::engine_err)?;

        Ok(ImpactResponse {
            affected: report
                .affected
                .into_iter()
                .map(|a| AffectedSectionView {
                    section_id: a.section_id,
                    reason: a.reason,
                    confidence: a.confidence.as_str().to_string(),
                })
                .collect(),
        })
    }

    pub async fn test_update_sections(
        &self,
        session_id: &str,
        file_path: &str,
        updates: HashMap<String, String>,
        message: Option<String>,
    ) -> Result<WriteResponse, McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        let outcome = self
            .engine
            .update_sections(session_id, &PathBuf::from(file_path), updates, message)
            .await
            .map_err(Self::engine_err)?;

        Ok(WriteResponse {
            committed: outcome.committed,
            commit: outcome.commit,
            section_ids: outcome.section_ids,
        })
    }

    pub async fn test_open_review(
        &self,
        session_id: &str,
        title: &str,
        body: &str,
    ) -> Result<ReviewResponse, McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        let handle = self
            .engine
            .open_review(session_id, title, body)
            .await
            .map_err(Self::engine_err)?;
        Ok(ReviewResponse {
            review_url: handle.url,
        })
    }

    pub async fn test_end_session(&self, session_id: &str) -> Result<(), McpError> {
        let session_id = Self::parse_uuid(session_id)?;
        self.engine.end_session(session_id).map_err(Self::engine_err)
    }
}

#[tool_router]
impl McpServer {
    #[tool(
        description = "Open a documentation session on a repository. Call this FIRST. Returns the session id, the branch currently checked out, and the protected trunk branch. Only one session per caller and repository is allowed; end stale sessions or wait for them to expire. Writes are rejected while the active branch is the trunk - call select_branch before writing."
    )]
    async fn start_session(
        &self,
        params: Parameters<StartSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self.test_start_session(&req.repo_path, &req.caller_id).await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Select or create the branch this session writes on. With a name: switches to it, creating it from the trunk tip when it does not exist (set create=false to forbid creation). Without a name: derives one from the target file and date. Requesting the trunk branch itself is a hard error, never silently redirected. Side effect: checks the branch out in the working tree."
    )]
    async fn select_branch(
        &self,
        params: Parameters<SelectBranchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self
            .test_select_branch(&req.session_id, req.name.as_deref(), req.create)
            .await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Write a fresh machine-authored document and commit it on the session branch. Each section body is wrapped in machine markers so later updates can replace it surgically while human edits elsewhere survive. Fails when the session branch is the trunk (no file is written) or when the content is identical to what is already committed."
    )]
    async fn write_document(
        &self,
        params: Parameters<WriteDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let sections = req
            .sections
            .into_iter()
            .map(|s| (s.heading, s.content))
            .collect();
        let response = self
            .test_write_document(
                &req.session_id,
                &req.file_path,
                req.title.as_deref(),
                sections,
                req.message,
            )
            .await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Read a document as the engine sees it: sections with their ids, machine-authored content, and whether a human has written in them. Use the ids to address update_sections. Human-authored text is reported but can never be overwritten."
    )]
    async fn read_document(
        &self,
        params: Parameters<ReadDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self.test_read_document(&req.session_id, &req.file_path).await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Which sections does a change to the documented artifact invalidate? Supply the changed declarations (added/removed/modified with names); returns affected sections with confidence 'exact' or 'probable'. Removed names flag every section still mentioning them. Generate new content for the affected sections, then call update_sections."
    )]
    async fn analyze_impact(
        &self,
        params: Parameters<AnalyzeImpactRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self
            .test_analyze_impact(&req.session_id, &req.file_path, req.changes)
            .await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Surgically update the named sections and commit. Only machine-authored spans of the addressed sections are replaced; human-authored text in the same section and every other section stay byte-identical. A human-only section gets the new content appended after the human text. Ids must exist in the document (see read_document / analyze_impact)."
    )]
    async fn update_sections(
        &self,
        params: Parameters<UpdateSectionsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self
            .test_update_sections(&req.session_id, &req.file_path, req.updates, req.message)
            .await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Open a review (pull/merge request) from the session branch against the trunk. Idempotent: calling again with no new commits returns the same review. Call after the document writes are committed."
    )]
    async fn open_review(
        &self,
        params: Parameters<OpenReviewRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self
            .test_open_review(&req.session_id, &req.title, &req.body)
            .await?;
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "End a session, releasing the caller/repository lock. Call when the documentation work is done or abandoned. In-flight operations finish first; ending during one is rejected."
    )]
    async fn end_session(
        &self,
        params: Parameters<EndSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        self.test_end_session(&req.session_id).await?;
        Ok(CallToolResult::success(vec![Content::text(
            "Session ended",
        )]))
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "scribe".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(server_instructions().into()),
            ..Default::default()
        }
    }
}

fn server_instructions() -> &'static str {
    r#"Scribe writes and updates documentation files inside a source repository
without ever touching the trunk branch and without ever overwriting text a
human has written.

CORE RULES:
- Writes only happen on a feature branch. The trunk branch is protected;
  requesting it is always an error, never silently redirected.
- Sections are the unit of update. Machine-authored content lives between
  scribe markers; everything unmarked is human-authored and is preserved
  byte-for-byte across updates.
- One active session per caller and repository. One operation at a time per
  session.

WORKFLOW (documenting a change):
1. start_session with the repository path and your caller id
2. select_branch to get off the trunk (omit the name to derive one)
3. write_document for a new file, or read_document to see section ids
4. When the documented artifact changes: analyze_impact with the changed
   declarations to learn which sections are stale
5. update_sections with new content for exactly those section ids
6. open_review to request a merge into the trunk
7. end_session

ERRORS:
- 'refusing to write on protected trunk branch': call select_branch first.
- 'an active session already exists': end the stale session or wait for it
  to expire.
- 'nothing to commit': the content you wrote is identical to what is
  already committed; this is surfaced, not silently swallowed.
- 'malformed marker': the document's markers are corrupt; fix the file by
  hand rather than expecting the engine to guess."#
}

pub async fn run_stdio_server(engine: Engine) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(engine);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
