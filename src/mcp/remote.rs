//! Remote mode MCP server - the same tools, proxied to a running HTTP server.
//!
//! Lets an agent host connect over stdio while the engine (and the working
//! tree it manages) lives behind the HTTP API on another machine or in a
//! long-running daemon. Each tool call becomes one API request through
//! [`ScribeClient`].

use std::path::PathBuf;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use uuid::Uuid;

use crate::models::*;

use super::client::{ClientError, ScribeClient};
use super::types::*;

#[derive(Clone)]
pub struct RemoteMcpServer {
    client: ScribeClient,
    tool_router: ToolRouter<Self>,
}

impl RemoteMcpServer {
    pub fn new(client: ScribeClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ScribeClient::from_env())
    }

    fn parse_uuid(s: &str) -> Result<Uuid, McpError> {
        Uuid::parse_str(s)
            .map_err(|e| McpError::invalid_params(format!("Invalid UUID: {}", e), None))
    }

    fn client_err(e: ClientError) -> McpError {
        match e {
            ClientError::NotFound(msg) => McpError::invalid_params(msg, None),
            ClientError::BadRequest(msg) => McpError::invalid_params(msg, None),
            ClientError::Conflict(msg) => McpError::invalid_params(msg, None),
            ClientError::Unauthorized => {
                McpError::internal_error("Unauthorized: check SCRIBE_API_KEY", None)
            }
            ClientError::Http(e) => McpError::internal_error(e.to_string(), None),
            ClientError::Server(msg) => McpError::internal_error(msg, None),
        }
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_router]
impl RemoteMcpServer {
    #[tool(
        description = "Open a documentation session on a repository managed by the remote Scribe server. Call this FIRST. Only one session per caller and repository; writes are rejected until select_branch moves the session off the trunk."
    )]
    async fn start_session(
        &self,
        params: Parameters<StartSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let session = self
            .client
            .start_session(&StartSessionInput {
                repo_path: PathBuf::from(req.repo_path),
                caller_id: req.caller_id,
            })
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&SessionResponse {
            session_id: session.id.to_string(),
            active_branch: session.active_branch,
            trunk_branch: session.context.trunk_branch,
            repo_root: session.context.root_path.display().to_string(),
        })
    }

    #[tool(
        description = "Select or create the branch this session writes on. Requesting the trunk branch is a hard error. Omit the name to derive one from the target file and date."
    )]
    async fn select_branch(
        &self,
        params: Parameters<SelectBranchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        let selection = self
            .client
            .select_branch(
                id,
                &SelectBranchInput {
                    name: req.name,
                    create: req.create,
                },
            )
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&BranchResponse {
            active_branch: selection.active_branch,
            created: selection.created,
        })
    }

    #[tool(
        description = "Write a fresh machine-authored document and commit it on the session branch. Fails when the session branch is the trunk; no file is written in that case."
    )]
    async fn write_document(
        &self,
        params: Parameters<WriteDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        let outcome = self
            .client
            .write_document(
                id,
                &WriteDocumentInput {
                    file_path: PathBuf::from(req.file_path),
                    title: req.title,
                    sections: req
                        .sections
                        .into_iter()
                        .map(|s| SectionContentInput {
                            heading: s.heading,
                            content: s.content,
                        })
                        .collect(),
                    message: req.message,
                },
            )
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&WriteResponse {
            committed: outcome.committed,
            commit: outcome.commit,
            section_ids: outcome.section_ids,
        })
    }

    #[tool(
        description = "Read a document's sections (ids, machine content, human-content flags) from the remote engine. Use the ids to address update_sections."
    )]
    async fn read_document(
        &self,
        params: Parameters<ReadDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        let doc = self
            .client
            .read_document(id, &PathBuf::from(&req.file_path))
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&DocumentResponse {
            file_path: req.file_path,
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
        })
    }

    #[tool(
        description = "Which sections does a change to the documented artifact invalidate? Returns affected section ids with confidence 'exact' or 'probable'."
    )]
    async fn analyze_impact(
        &self,
        params: Parameters<AnalyzeImpactRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        let mut changes = Vec::with_capacity(req.changes.len());
        for change in req.changes {
            let kind = ChangeKind::from_str(&change.kind).ok_or_else(|| {
                McpError::invalid_params(
                    format!(
                        "Invalid kind '{}'. Must be: added, removed, or modified",
                        change.kind
                    ),
                    None,
                )
            })?;
            changes.push(ArtifactChange {
                kind,
                target_name: change.target_name,
                before_signature: change.before_signature,
                after_signature: change.after_signature,
            });
        }

        let report = self
            .client
            .analyze_impact(
                id,
                &AnalyzeImpactInput {
                    file_path: PathBuf::from(req.file_path),
                    changes,
                },
            )
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&ImpactResponse {
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

    #[tool(
        description = "Surgically update the named sections and commit. Only machine-authored spans are replaced; human text survives byte-for-byte."
    )]
    async fn update_sections(
        &self,
        params: Parameters<UpdateSectionsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        let outcome = self
            .client
            .update_sections(
                id,
                &UpdateSectionsInput {
                    file_path: PathBuf::from(req.file_path),
                    updates: req.updates,
                    message: req.message,
                },
            )
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&WriteResponse {
            committed: outcome.committed,
            commit: outcome.commit,
            section_ids: outcome.section_ids,
        })
    }

    #[tool(
        description = "Open a review from the session branch against the trunk. Idempotent per branch pair."
    )]
    async fn open_review(
        &self,
        params: Parameters<OpenReviewRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        let handle = self
            .client
            .open_review(
                id,
                &OpenReviewInput {
                    title: req.title,
                    body: req.body,
                },
            )
            .await
            .map_err(Self::client_err)?;

        Self::to_json(&ReviewResponse {
            review_url: handle.url,
        })
    }

    #[tool(description = "End a session, releasing the caller/repository lock.")]
    async fn end_session(
        &self,
        params: Parameters<EndSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let id = Self::parse_uuid(&req.session_id)?;
        self.client.end_session(id).await.map_err(Self::client_err)?;
        Ok(CallToolResult::success(vec![Content::text(
            "Session ended",
        )]))
    }
}

#[tool_handler]
impl ServerHandler for RemoteMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "scribe-remote".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                "Scribe remote mode: the same documentation tools, proxied to a \
                 running Scribe server (SCRIBE_URL, SCRIBE_API_KEY). See the \
                 local server instructions for the workflow."
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_remote_stdio_server(client: ScribeClient) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio (remote mode)");

    let service = RemoteMcpServer::new(client);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
