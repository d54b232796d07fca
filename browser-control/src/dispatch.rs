//! Executor-side dispatch: maps an incoming request to a browser capability,
//! applies the security gate and records the audit trail.
//!
//! Concrete browser automation lives behind [`BrowserCapabilities`]; the
//! dispatcher owns everything around it: policy, audit, and packaging the
//! outcome into the one resource kind the command is answered with.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audit::{AuditEntry, AuditSink};
use crate::errors::ControlError;
use crate::policy::SecurityGate;
use crate::protocol::{
    BookmarkItem, BookmarkOpenOutcome, BrowserTab, ClickOutcome, Command, CommandRequest,
    ErrorEnvelope, ExtensionMessage, GroupColor, HistoryItem, JsOutcome, PageChanges, Resource,
    ResourceMessage, TabContent,
};

/// The browser automation surface, one method per command kind plus the two
/// lookups the gate needs. Implementations must be callable concurrently.
#[async_trait]
pub trait BrowserCapabilities: Send + Sync {
    async fn open_tab(&self, url: &str) -> Result<Option<u32>, ControlError>;
    async fn close_tabs(&self, tab_ids: &[u32]) -> Result<(), ControlError>;
    async fn tab_list(&self) -> Result<Vec<BrowserTab>, ControlError>;
    async fn recent_history(
        &self,
        search_query: Option<&str>,
    ) -> Result<Vec<HistoryItem>, ControlError>;
    async fn tab_content(&self, tab_id: u32, offset: u32) -> Result<TabContent, ControlError>;
    async fn reorder_tabs(&self, tab_order: &[u32]) -> Result<(), ControlError>;
    async fn find_highlight(&self, tab_id: u32, query_phrase: &str) -> Result<u32, ControlError>;
    async fn group_tabs(
        &self,
        tab_ids: &[u32],
        is_collapsed: bool,
        group_color: GroupColor,
        group_title: &str,
    ) -> Result<u32, ControlError>;
    async fn click_element(
        &self,
        tab_id: u32,
        selector: Option<&str>,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<ClickOutcome, ControlError>;
    async fn fill_form_field(
        &self,
        tab_id: u32,
        selector: &str,
        value: &str,
        submit: bool,
    ) -> Result<bool, ControlError>;
    async fn execute_javascript(&self, tab_id: u32, code: &str) -> Result<JsOutcome, ControlError>;
    /// `timeout` in milliseconds; implementations apply their own default
    /// when `None`.
    async fn monitor_page_changes(
        &self,
        tab_id: u32,
        selector: Option<&str>,
        timeout: Option<u64>,
    ) -> Result<PageChanges, ControlError>;
    /// Returns the capture as a PNG data URL.
    async fn screenshot(&self, tab_id: u32, full_page: bool) -> Result<String, ControlError>;
    async fn search_bookmarks(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<BookmarkItem>, ControlError>;
    async fn open_bookmark(&self, bookmark_id: &str)
        -> Result<BookmarkOpenOutcome, ControlError>;

    /// URL the bookmark navigates to, `None` for folders and separators.
    /// Consulted by the gate before `open_bookmark`.
    async fn bookmark_url(&self, bookmark_id: &str) -> Result<Option<String>, ControlError>;
    /// Live URL of a tab, consulted by the gate and the audit recorder.
    /// Never trusted from the caller.
    async fn current_tab_url(&self, tab_id: u32) -> Result<String, ControlError>;
}

pub struct Dispatcher {
    capabilities: Arc<dyn BrowserCapabilities>,
    gate: Arc<SecurityGate>,
    audit: Arc<dyn AuditSink>,
}

impl Dispatcher {
    pub fn new(
        capabilities: Arc<dyn BrowserCapabilities>,
        gate: Arc<SecurityGate>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Dispatcher {
            capabilities,
            gate,
            audit,
        }
    }

    /// Handle one request end to end. Always produces a reply carrying the
    /// original correlation id: a resource on success, an error envelope on
    /// policy denial or capability failure.
    pub async fn dispatch(&self, request: CommandRequest) -> ExtensionMessage {
        let CommandRequest {
            command,
            correlation_id,
        } = request;

        // Every attempt is audited, denied ones included.
        self.audit_attempt(&command).await;

        if !self.gate.is_command_allowed(&command) {
            tracing::warn!(tool_id = command.tool_id(), "Refusing disabled command");
            return reject(
                correlation_id,
                format!("Command '{}' is disabled by policy", command.tool_id()),
            );
        }

        if let Err(denial) = self.check_destination(&command).await {
            tracing::warn!(cmd = command.name(), error = %denial, "Refusing denied destination");
            return reject(correlation_id, denial.to_string());
        }

        match self.invoke(&command).await {
            Ok(resource) => ExtensionMessage::Resource(ResourceMessage {
                resource,
                correlation_id,
            }),
            Err(e) => {
                tracing::warn!(cmd = command.name(), error = %e, "Command failed");
                reject(correlation_id, e.to_string())
            }
        }
    }

    /// Record the attempt with its URL context: the explicit target if the
    /// command carries one, otherwise the live URL of the targeted tab.
    /// Failures here never fail the command.
    async fn audit_attempt(&self, command: &Command) {
        let url = match (command.explicit_url(), command.tab_id()) {
            (Some(url), _) => Some(url.to_string()),
            (None, Some(tab_id)) => match self.capabilities.current_tab_url(tab_id).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::debug!(tab_id, error = %e, "No tab URL for audit entry");
                    None
                }
            },
            (None, None) => None,
        };
        self.audit
            .record(AuditEntry::now(command.tool_id(), command.name(), url));
    }

    /// Deny-list enforcement, fail closed: any failure resolving the
    /// destination refuses the command.
    async fn check_destination(&self, command: &Command) -> Result<(), ControlError> {
        if let Some(url) = command.explicit_url() {
            if !url.starts_with("https://") {
                return Err(ControlError::InvalidArgument(format!("Invalid URL: {url}")));
            }
            if self.gate.is_destination_denied(url) {
                return Err(ControlError::DestinationDenied(url.to_string()));
            }
            return Ok(());
        }

        if let Command::OpenBookmark { bookmark_id } = command {
            return match self.capabilities.bookmark_url(bookmark_id).await {
                Ok(Some(url)) if self.gate.is_destination_denied(&url) => {
                    Err(ControlError::DestinationDenied(url))
                }
                Ok(_) => Ok(()),
                Err(e) => {
                    tracing::warn!(bookmark_id = %bookmark_id, error = %e, "Bookmark lookup failed, denying");
                    Err(ControlError::DestinationDenied(format!(
                        "could not resolve bookmark '{bookmark_id}'"
                    )))
                }
            };
        }

        if let Some(tab_id) = command.tab_id() {
            return match self.capabilities.current_tab_url(tab_id).await {
                Ok(url) if self.gate.is_destination_denied(&url) => {
                    Err(ControlError::DestinationDenied(url))
                }
                Ok(_) => Ok(()),
                Err(e) => {
                    tracing::warn!(tab_id, error = %e, "Tab URL lookup failed, denying");
                    Err(ControlError::DestinationDenied(format!(
                        "could not resolve URL of tab {tab_id}"
                    )))
                }
            };
        }

        Ok(())
    }

    async fn invoke(&self, command: &Command) -> Result<Resource, ControlError> {
        let caps = &self.capabilities;
        match command {
            Command::OpenTab { url } => {
                let tab_id = caps.open_tab(url).await?;
                Ok(Resource::OpenedTabId { tab_id })
            }
            Command::CloseTabs { tab_ids } => {
                caps.close_tabs(tab_ids).await?;
                Ok(Resource::TabsClosed)
            }
            Command::GetTabList => {
                let tabs = caps.tab_list().await?;
                Ok(Resource::Tabs { tabs })
            }
            Command::GetBrowserRecentHistory { search_query } => {
                let history_items = caps.recent_history(search_query.as_deref()).await?;
                Ok(Resource::History { history_items })
            }
            Command::GetTabContent { tab_id, offset } => {
                let content = caps.tab_content(*tab_id, *offset).await?;
                Ok(Resource::TabContent {
                    tab_id: *tab_id,
                    full_text: content.full_text,
                    is_truncated: content.is_truncated,
                    total_length: content.total_length,
                    links: content.links,
                })
            }
            Command::ReorderTabs { tab_order } => {
                caps.reorder_tabs(tab_order).await?;
                Ok(Resource::TabsReordered {
                    tab_order: tab_order.clone(),
                })
            }
            Command::FindHighlight {
                tab_id,
                query_phrase,
            } => {
                let no_of_results = caps.find_highlight(*tab_id, query_phrase).await?;
                Ok(Resource::FindHighlightResult { no_of_results })
            }
            Command::GroupTabs {
                tab_ids,
                is_collapsed,
                group_color,
                group_title,
            } => {
                let group_id = caps
                    .group_tabs(tab_ids, *is_collapsed, *group_color, group_title)
                    .await?;
                Ok(Resource::NewTabGroup { group_id })
            }
            Command::ClickElement {
                tab_id,
                selector,
                x,
                y,
            } => {
                let outcome = caps
                    .click_element(*tab_id, selector.as_deref(), *x, *y)
                    .await?;
                Ok(Resource::ElementClicked {
                    success: outcome.success,
                    element_info: outcome.element_info,
                })
            }
            Command::FillFormField {
                tab_id,
                selector,
                value,
                submit,
            } => {
                let success = caps
                    .fill_form_field(*tab_id, selector, value, *submit)
                    .await?;
                Ok(Resource::FormFieldFilled { success })
            }
            Command::ExecuteJavascript { tab_id, code } => {
                let outcome = caps.execute_javascript(*tab_id, code).await?;
                Ok(Resource::JavascriptExecuted {
                    result: outcome.result,
                    error: outcome.error,
                })
            }
            Command::MonitorPageChanges {
                tab_id,
                selector,
                timeout,
            } => {
                let outcome = caps
                    .monitor_page_changes(*tab_id, selector.as_deref(), *timeout)
                    .await?;
                Ok(Resource::PageChangesDetected {
                    changes: outcome.changes,
                    timed_out: outcome.timed_out,
                })
            }
            Command::ScreenshotWebsite { tab_id, full_page } => {
                let data_url = caps.screenshot(*tab_id, *full_page).await?;
                Ok(Resource::ScreenshotSaved { data_url })
            }
            Command::SearchBookmarks { query } => {
                let bookmarks = caps.search_bookmarks(query.as_deref()).await?;
                Ok(Resource::BookmarksFound { bookmarks })
            }
            Command::OpenBookmark { bookmark_id } => {
                let outcome = caps.open_bookmark(bookmark_id).await?;
                Ok(Resource::BookmarkOpened {
                    tab_id: outcome.tab_id,
                    success: outcome.success,
                })
            }
        }
    }
}

fn reject(correlation_id: String, error_message: String) -> ExtensionMessage {
    ExtensionMessage::Error(ErrorEnvelope {
        correlation_id,
        error_message,
    })
}
