//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{UploadPolicySnapshot, json_resource_contents, serialize_json},
        handlers::{
            ask::handle_ask_question,
            metrics::handle_metrics,
            session::{handle_reset, handle_resync, handle_session_status},
            upload::{handle_upload_document, handle_upload_url},
        },
        registry, schemas,
    },
    session::{ResearchSession, SessionApi},
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};

const UPLOAD_POLICY_URI: &str = "mcp://research-buddy/upload-policy";
const USAGE_URI: &str = "mcp://research-buddy/usage";

/// MCP server implementation exposing the research session.
#[derive(Clone)]
pub struct ResearchBuddyMcpServer {
    session: Arc<ResearchSession>,
    registry: Arc<registry::Registry>,
}

impl ResearchBuddyMcpServer {
    /// Create a new MCP server over the supplied session.
    pub fn new(session: Arc<ResearchSession>) -> Self {
        let mut registry = registry::Registry::default();
        registry.register_resource(UPLOAD_POLICY_URI, resource_upload_policy);
        registry.register_resource(USAGE_URI, resource_usage);

        registry.register_tool("upload-document", tool_upload_document);
        registry.register_tool("upload-url", tool_upload_url);
        registry.register_tool("session-status", tool_session_status);
        registry.register_tool("resync-session", tool_resync_session);
        registry.register_tool("reset-session", tool_reset_session);
        registry.register_tool("ask-question", tool_ask_question);
        registry.register_tool("metrics", tool_metrics);

        Self {
            session,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        let empty = Arc::new(schemas::empty_object_schema());
        vec![
            Tool {
                name: Cow::Borrowed("upload-document"),
                title: Some("Upload Document".to_string()),
                description: Some(Cow::Borrowed(
                    "Upload a local document so questions can be grounded in it. Replaces the current document.",
                )),
                input_schema: Arc::new(schemas::upload_document_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Upload Document")
                        .destructive(true)
                        .idempotent(false)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("upload-url"),
                title: Some("Upload From URL".to_string()),
                description: Some(Cow::Borrowed(
                    "Have the document service fetch and index a remote document. Replaces the current document.",
                )),
                input_schema: Arc::new(schemas::upload_url_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Upload From URL")
                        .destructive(true)
                        .idempotent(false)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("session-status"),
                title: Some("Session Status".to_string()),
                description: Some(Cow::Borrowed(
                    "Check whether a document is ready before asking questions.",
                )),
                input_schema: empty.clone(),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Session Status")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("resync-session"),
                title: Some("Resync Session".to_string()),
                description: Some(Cow::Borrowed(
                    "Ask the document service whether it already holds a ready document.",
                )),
                input_schema: empty.clone(),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Resync Session")
                        .destructive(false)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("reset-session"),
                title: Some("Reset Session".to_string()),
                description: Some(Cow::Borrowed(
                    "Forget the current document and discard any upload still in flight.",
                )),
                input_schema: empty.clone(),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Reset Session")
                        .destructive(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("ask-question"),
                title: Some("Ask Question".to_string()),
                description: Some(Cow::Borrowed(
                    "Ask a question answered from the ready document only.",
                )),
                input_schema: Arc::new(schemas::ask_question_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Ask Question")
                        .read_only(true)
                        .idempotent(false)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("metrics"),
                title: Some("Metrics Snapshot".to_string()),
                description: Some(Cow::Borrowed(
                    "Check upload and question counters at a glance.",
                )),
                input_schema: empty,
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Metrics Snapshot")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut policy = RawResource::new(UPLOAD_POLICY_URI, "upload-policy");
        policy.description = Some("Size limit and accepted formats for uploads".into());

        let mut usage = RawResource::new(USAGE_URI, "usage");
        usage.description =
            Some("Recommended tool flow: upload, wait for ready, then ask.".into());

        vec![policy.no_annotation(), usage.no_annotation()]
    }
}

fn resource_upload_policy(
    server: &ResearchBuddyMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let session = server.session.clone();
    Box::pin(async move {
        let payload = UploadPolicySnapshot::from_policy(&session.upload_policy());
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                UPLOAD_POLICY_URI,
                serialize_json(&payload, UPLOAD_POLICY_URI),
            )],
        })
    })
}

fn resource_usage(
    _server: &ResearchBuddyMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    Box::pin(async move {
        let usage = serde_json::json!({
            "title": "Research Buddy MCP Usage",
            "policy": [
                "Upload one document at a time; a new upload replaces the previous one.",
                "Ask questions only after `session-status` reports `ready`.",
                "Answers come from the uploaded document only; rephrase if the service finds no relevant content.",
                "Transport errors are not retried automatically; call `ask-question` again when ready.",
            ],
            "flows": [
                {
                    "name": "Upload & Ask",
                    "steps": [
                        "upload-document({ path, name? }) or upload-url({ url })",
                        "session-status() until status is ready",
                        "ask-question({ question })"
                    ]
                },
                {
                    "name": "Reconnect",
                    "steps": [
                        "resync-session() to adopt a document the service already holds",
                        "ask-question({ question })"
                    ]
                }
            ]
        });
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                USAGE_URI,
                serialize_json(&usage, USAGE_URI),
            )],
        })
    })
}

fn tool_upload_document(
    server: &ResearchBuddyMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_upload_document(&session, request.arguments).await })
}

fn tool_upload_url(
    server: &ResearchBuddyMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_upload_url(&session, request.arguments).await })
}

fn tool_session_status(
    server: &ResearchBuddyMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_session_status(&session).await })
}

fn tool_resync_session(
    server: &ResearchBuddyMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_resync(&session).await })
}

fn tool_reset_session(
    server: &ResearchBuddyMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_reset(&session).await })
}

fn tool_ask_question(
    server: &ResearchBuddyMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_ask_question(&session, request.arguments).await })
}

fn tool_metrics(
    server: &ResearchBuddyMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let session = server.session.clone();
    Box::pin(async move { handle_metrics(&session).await })
}

impl ServerHandler for ResearchBuddyMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "research-buddy".to_string();
        implementation.title = Some("Research Buddy MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Use this server to ask questions grounded in one uploaded document. Upload a document, wait until the session is ready, then ask; questions are refused until the document is indexed.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resource(request.uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tool(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
