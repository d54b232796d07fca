//! In-memory stand-in for the browser automation surface.

// Each test binary compiles this module and uses a different subset of it.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use browser_control::dispatch::BrowserCapabilities;
use browser_control::errors::ControlError;
use browser_control::protocol::{
    BookmarkItem, BookmarkOpenOutcome, BrowserTab, ClickOutcome, GroupColor, HistoryItem,
    JsOutcome, PageChanges, PageLink, TabContent,
};

#[derive(Default)]
pub struct FakeBrowserState {
    pub tabs: BTreeMap<u32, String>,
    pub next_tab_id: u32,
    pub bookmarks: Vec<BookmarkItem>,
    /// Command names whose capability actually ran.
    pub invocations: Vec<&'static str>,
    pub fail_clicks: bool,
    pub fail_tab_url_lookup: bool,
}

#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<FakeBrowserState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        FakeBrowser::default()
    }

    pub fn with_tab(self, tab_id: u32, url: &str) -> Self {
        self.lock().tabs.insert(tab_id, url.to_string());
        self
    }

    pub fn with_bookmark(self, bookmark: BookmarkItem) -> Self {
        self.lock().bookmarks.push(bookmark);
        self
    }

    pub fn failing_clicks(self) -> Self {
        self.lock().fail_clicks = true;
        self
    }

    pub fn failing_tab_url_lookup(self) -> Self {
        self.lock().fail_tab_url_lookup = true;
        self
    }

    pub fn invocations(&self) -> Vec<&'static str> {
        self.lock().invocations.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeBrowserState> {
        self.state.lock().expect("fake browser state")
    }

    fn record(&self, command: &'static str) {
        self.lock().invocations.push(command);
    }
}

#[async_trait]
impl BrowserCapabilities for FakeBrowser {
    async fn open_tab(&self, url: &str) -> Result<Option<u32>, ControlError> {
        self.record("open-tab");
        let mut state = self.lock();
        state.next_tab_id += 1;
        let tab_id = state.next_tab_id;
        state.tabs.insert(tab_id, url.to_string());
        Ok(Some(tab_id))
    }

    async fn close_tabs(&self, tab_ids: &[u32]) -> Result<(), ControlError> {
        self.record("close-tabs");
        let mut state = self.lock();
        for tab_id in tab_ids {
            state.tabs.remove(tab_id);
        }
        Ok(())
    }

    async fn tab_list(&self) -> Result<Vec<BrowserTab>, ControlError> {
        self.record("get-tab-list");
        Ok(self
            .lock()
            .tabs
            .iter()
            .map(|(id, url)| BrowserTab {
                id: Some(*id),
                url: Some(url.clone()),
                title: Some(format!("Tab {id}")),
                last_accessed: None,
            })
            .collect())
    }

    async fn recent_history(
        &self,
        search_query: Option<&str>,
    ) -> Result<Vec<HistoryItem>, ControlError> {
        self.record("get-browser-recent-history");
        let items = vec![HistoryItem {
            url: Some("https://example.com".into()),
            title: Some("Example".into()),
            last_visit_time: Some(1_717_171_717_000.0),
        }];
        Ok(match search_query {
            Some(query) => items
                .into_iter()
                .filter(|item| {
                    item.title
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&query.to_lowercase()))
                })
                .collect(),
            None => items,
        })
    }

    async fn tab_content(&self, tab_id: u32, offset: u32) -> Result<TabContent, ControlError> {
        self.record("get-tab-content");
        let text = format!("content of tab {tab_id} from offset {offset}");
        Ok(TabContent {
            total_length: text.len() as u64,
            full_text: text,
            is_truncated: false,
            links: vec![PageLink {
                url: "https://example.com/a".into(),
                text: "a".into(),
            }],
        })
    }

    async fn reorder_tabs(&self, _tab_order: &[u32]) -> Result<(), ControlError> {
        self.record("reorder-tabs");
        Ok(())
    }

    async fn find_highlight(&self, _tab_id: u32, query_phrase: &str) -> Result<u32, ControlError> {
        self.record("find-highlight");
        Ok(query_phrase.len() as u32 % 5)
    }

    async fn group_tabs(
        &self,
        _tab_ids: &[u32],
        _is_collapsed: bool,
        _group_color: GroupColor,
        _group_title: &str,
    ) -> Result<u32, ControlError> {
        self.record("group-tabs");
        Ok(42)
    }

    async fn click_element(
        &self,
        _tab_id: u32,
        selector: Option<&str>,
        _x: Option<f64>,
        _y: Option<f64>,
    ) -> Result<ClickOutcome, ControlError> {
        self.record("click-element");
        if self.lock().fail_clicks {
            return Err(ControlError::Internal("Element not found".into()));
        }
        Ok(ClickOutcome {
            success: true,
            element_info: selector.map(|s| format!("BUTTON{s}")),
        })
    }

    async fn fill_form_field(
        &self,
        _tab_id: u32,
        _selector: &str,
        _value: &str,
        _submit: bool,
    ) -> Result<bool, ControlError> {
        self.record("fill-form-field");
        Ok(true)
    }

    async fn execute_javascript(
        &self,
        _tab_id: u32,
        code: &str,
    ) -> Result<JsOutcome, ControlError> {
        self.record("execute-javascript");
        Ok(JsOutcome {
            result: serde_json::json!({ "echo": code }),
            error: None,
        })
    }

    async fn monitor_page_changes(
        &self,
        _tab_id: u32,
        _selector: Option<&str>,
        _timeout: Option<u64>,
    ) -> Result<PageChanges, ControlError> {
        self.record("monitor-page-changes");
        Ok(PageChanges {
            changes: "[]".into(),
            timed_out: true,
        })
    }

    async fn screenshot(&self, _tab_id: u32, _full_page: bool) -> Result<String, ControlError> {
        self.record("screenshot-website");
        Ok("data:image/png;base64,iVBORw0KGgo=".into())
    }

    async fn search_bookmarks(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<BookmarkItem>, ControlError> {
        self.record("search-bookmarks");
        let bookmarks = self.lock().bookmarks.clone();
        Ok(match query {
            Some(query) => bookmarks
                .into_iter()
                .filter(|b| b.title.contains(query))
                .collect(),
            None => bookmarks,
        })
    }

    async fn open_bookmark(
        &self,
        bookmark_id: &str,
    ) -> Result<BookmarkOpenOutcome, ControlError> {
        self.record("open-bookmark");
        let url = self
            .lock()
            .bookmarks
            .iter()
            .find(|b| b.id == bookmark_id)
            .and_then(|b| b.url.clone());
        match url {
            Some(url) => {
                let tab_id = self.open_tab(&url).await?;
                Ok(BookmarkOpenOutcome {
                    tab_id,
                    success: true,
                })
            }
            None => Ok(BookmarkOpenOutcome {
                tab_id: None,
                success: false,
            }),
        }
    }

    async fn bookmark_url(&self, bookmark_id: &str) -> Result<Option<String>, ControlError> {
        Ok(self
            .lock()
            .bookmarks
            .iter()
            .find(|b| b.id == bookmark_id)
            .and_then(|b| b.url.clone()))
    }

    async fn current_tab_url(&self, tab_id: u32) -> Result<String, ControlError> {
        let state = self.lock();
        if state.fail_tab_url_lookup {
            return Err(ControlError::Internal("tab lookup failed".into()));
        }
        state
            .tabs
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| ControlError::InvalidArgument(format!("no tab {tab_id}")))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}
