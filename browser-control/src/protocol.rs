//! Wire vocabulary shared by both sides of the bridge.
//!
//! One JSON object per WebSocket text frame. Requests are tagged by `cmd`,
//! responses by `resource`; an error envelope carries `errorMessage` and no
//! `resource` tag. Field names on the wire are camelCase.

use serde::{Deserialize, Serialize};

/// A command the broker can send to the extension. 15 kinds, each with a
/// fixed field set and exactly one legal response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Command {
    OpenTab {
        url: String,
    },
    CloseTabs {
        tab_ids: Vec<u32>,
    },
    GetTabList,
    GetBrowserRecentHistory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_query: Option<String>,
    },
    GetTabContent {
        tab_id: u32,
        #[serde(default)]
        offset: u32,
    },
    ReorderTabs {
        tab_order: Vec<u32>,
    },
    FindHighlight {
        tab_id: u32,
        query_phrase: String,
    },
    GroupTabs {
        tab_ids: Vec<u32>,
        #[serde(default)]
        is_collapsed: bool,
        #[serde(default)]
        group_color: GroupColor,
        group_title: String,
    },
    ClickElement {
        tab_id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },
    FillFormField {
        tab_id: u32,
        selector: String,
        value: String,
        #[serde(default)]
        submit: bool,
    },
    ExecuteJavascript {
        tab_id: u32,
        code: String,
    },
    MonitorPageChanges {
        tab_id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    ScreenshotWebsite {
        tab_id: u32,
        #[serde(default)]
        full_page: bool,
    },
    SearchBookmarks {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    OpenBookmark {
        bookmark_id: String,
    },
}

/// A response from the extension. One kind per command, 1:1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "resource",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Resource {
    OpenedTabId {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<u32>,
    },
    TabsClosed,
    Tabs {
        tabs: Vec<BrowserTab>,
    },
    History {
        history_items: Vec<HistoryItem>,
    },
    TabContent {
        tab_id: u32,
        full_text: String,
        is_truncated: bool,
        total_length: u64,
        links: Vec<PageLink>,
    },
    TabsReordered {
        tab_order: Vec<u32>,
    },
    FindHighlightResult {
        no_of_results: u32,
    },
    NewTabGroup {
        group_id: u32,
    },
    ElementClicked {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_info: Option<String>,
    },
    FormFieldFilled {
        success: bool,
    },
    JavascriptExecuted {
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    PageChangesDetected {
        changes: String,
        timed_out: bool,
    },
    ScreenshotSaved {
        data_url: String,
    },
    BookmarksFound {
        bookmarks: Vec<BookmarkItem>,
    },
    BookmarkOpened {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<u32>,
        success: bool,
    },
}

/// Discriminant of [`Resource`], used to verify that a response matches what
/// the pending request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    OpenedTabId,
    TabsClosed,
    Tabs,
    History,
    TabContent,
    TabsReordered,
    FindHighlightResult,
    NewTabGroup,
    ElementClicked,
    FormFieldFilled,
    JavascriptExecuted,
    PageChangesDetected,
    ScreenshotSaved,
    BookmarksFound,
    BookmarkOpened,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::OpenedTabId => "opened-tab-id",
            ResourceKind::TabsClosed => "tabs-closed",
            ResourceKind::Tabs => "tabs",
            ResourceKind::History => "history",
            ResourceKind::TabContent => "tab-content",
            ResourceKind::TabsReordered => "tabs-reordered",
            ResourceKind::FindHighlightResult => "find-highlight-result",
            ResourceKind::NewTabGroup => "new-tab-group",
            ResourceKind::ElementClicked => "element-clicked",
            ResourceKind::FormFieldFilled => "form-field-filled",
            ResourceKind::JavascriptExecuted => "javascript-executed",
            ResourceKind::PageChangesDetected => "page-changes-detected",
            ResourceKind::ScreenshotSaved => "screenshot-saved",
            ResourceKind::BookmarksFound => "bookmarks-found",
            ResourceKind::BookmarkOpened => "bookmark-opened",
        }
    }
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::OpenedTabId { .. } => ResourceKind::OpenedTabId,
            Resource::TabsClosed => ResourceKind::TabsClosed,
            Resource::Tabs { .. } => ResourceKind::Tabs,
            Resource::History { .. } => ResourceKind::History,
            Resource::TabContent { .. } => ResourceKind::TabContent,
            Resource::TabsReordered { .. } => ResourceKind::TabsReordered,
            Resource::FindHighlightResult { .. } => ResourceKind::FindHighlightResult,
            Resource::NewTabGroup { .. } => ResourceKind::NewTabGroup,
            Resource::ElementClicked { .. } => ResourceKind::ElementClicked,
            Resource::FormFieldFilled { .. } => ResourceKind::FormFieldFilled,
            Resource::JavascriptExecuted { .. } => ResourceKind::JavascriptExecuted,
            Resource::PageChangesDetected { .. } => ResourceKind::PageChangesDetected,
            Resource::ScreenshotSaved { .. } => ResourceKind::ScreenshotSaved,
            Resource::BookmarksFound { .. } => ResourceKind::BookmarksFound,
            Resource::BookmarkOpened { .. } => ResourceKind::BookmarkOpened,
        }
    }
}

impl Command {
    /// Wire name of the command tag.
    pub fn name(&self) -> &'static str {
        match self {
            Command::OpenTab { .. } => "open-tab",
            Command::CloseTabs { .. } => "close-tabs",
            Command::GetTabList => "get-tab-list",
            Command::GetBrowserRecentHistory { .. } => "get-browser-recent-history",
            Command::GetTabContent { .. } => "get-tab-content",
            Command::ReorderTabs { .. } => "reorder-tabs",
            Command::FindHighlight { .. } => "find-highlight",
            Command::GroupTabs { .. } => "group-tabs",
            Command::ClickElement { .. } => "click-element",
            Command::FillFormField { .. } => "fill-form-field",
            Command::ExecuteJavascript { .. } => "execute-javascript",
            Command::MonitorPageChanges { .. } => "monitor-page-changes",
            Command::ScreenshotWebsite { .. } => "screenshot-website",
            Command::SearchBookmarks { .. } => "search-bookmarks",
            Command::OpenBookmark { .. } => "open-bookmark",
        }
    }

    /// Stable tool identifier the allow-list is keyed by.
    pub fn tool_id(&self) -> &'static str {
        match self {
            Command::OpenTab { .. } => "open-browser-tab",
            Command::CloseTabs { .. } => "close-browser-tabs",
            Command::GetTabList => "get-list-of-open-tabs",
            Command::GetBrowserRecentHistory { .. } => "get-recent-browser-history",
            Command::GetTabContent { .. } => "get-tab-web-content",
            Command::ReorderTabs { .. } => "reorder-browser-tabs",
            Command::FindHighlight { .. } => "find-highlight-in-browser-tab",
            Command::GroupTabs { .. } => "group-browser-tabs",
            Command::ClickElement { .. } => "click-element-in-browser",
            Command::FillFormField { .. } => "fill-form-field-in-browser",
            Command::ExecuteJavascript { .. } => "execute-javascript-in-browser",
            Command::MonitorPageChanges { .. } => "monitor-page-changes-in-browser",
            Command::ScreenshotWebsite { .. } => "screenshot-website",
            Command::SearchBookmarks { .. } => "search-bookmarks",
            Command::OpenBookmark { .. } => "open-bookmark",
        }
    }

    /// The one response kind this command may legally be answered with.
    pub fn expected_resource(&self) -> ResourceKind {
        match self {
            Command::OpenTab { .. } => ResourceKind::OpenedTabId,
            Command::CloseTabs { .. } => ResourceKind::TabsClosed,
            Command::GetTabList => ResourceKind::Tabs,
            Command::GetBrowserRecentHistory { .. } => ResourceKind::History,
            Command::GetTabContent { .. } => ResourceKind::TabContent,
            Command::ReorderTabs { .. } => ResourceKind::TabsReordered,
            Command::FindHighlight { .. } => ResourceKind::FindHighlightResult,
            Command::GroupTabs { .. } => ResourceKind::NewTabGroup,
            Command::ClickElement { .. } => ResourceKind::ElementClicked,
            Command::FillFormField { .. } => ResourceKind::FormFieldFilled,
            Command::ExecuteJavascript { .. } => ResourceKind::JavascriptExecuted,
            Command::MonitorPageChanges { .. } => ResourceKind::PageChangesDetected,
            Command::ScreenshotWebsite { .. } => ResourceKind::ScreenshotSaved,
            Command::SearchBookmarks { .. } => ResourceKind::BookmarksFound,
            Command::OpenBookmark { .. } => ResourceKind::BookmarkOpened,
        }
    }

    /// URL the command navigates to, when it carries one explicitly.
    pub fn explicit_url(&self) -> Option<&str> {
        match self {
            Command::OpenTab { url } => Some(url),
            _ => None,
        }
    }

    /// The single tab this command acts on, for commands whose policy and
    /// audit context is the tab's current URL.
    pub fn tab_id(&self) -> Option<u32> {
        match self {
            Command::GetTabContent { tab_id, .. }
            | Command::FindHighlight { tab_id, .. }
            | Command::ClickElement { tab_id, .. }
            | Command::FillFormField { tab_id, .. }
            | Command::ExecuteJavascript { tab_id, .. }
            | Command::MonitorPageChanges { tab_id, .. }
            | Command::ScreenshotWebsite { tab_id, .. } => Some(*tab_id),
            _ => None,
        }
    }
}

/// Request frame: a command plus the correlation identifier the response
/// must echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(flatten)]
    pub command: Command,
    pub correlation_id: String,
}

/// Response frame: a resource plus the originating correlation identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMessage {
    #[serde(flatten)]
    pub resource: Resource,
    pub correlation_id: String,
}

/// Sent by the extension instead of a resource when handling a request
/// failed for any reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub correlation_id: String,
    pub error_message: String,
}

/// Anything the extension may send back over the socket. An error envelope
/// is recognized by its `errorMessage` field; everything else must carry a
/// `resource` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionMessage {
    Error(ErrorEnvelope),
    Resource(ResourceMessage),
}

/// Page text and links extracted from a tab.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabContent {
    pub full_text: String,
    pub is_truncated: bool,
    pub total_length: u64,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClickOutcome {
    pub success: bool,
    pub element_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsOutcome {
    pub result: serde_json::Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageChanges {
    pub changes: String,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookmarkOpenOutcome {
    pub tab_id: Option<u32>,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    #[default]
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

/// An open browser tab as reported by the extension. Timestamps are epoch
/// milliseconds; Firefox reports them fractional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserTab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkType {
    Bookmark,
    Folder,
    Separator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub bookmark_type: BookmarkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<f64>,
}
