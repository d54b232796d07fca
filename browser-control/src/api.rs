//! Typed command facade for the tool front end.
//!
//! One method per command kind. Each sends the command through the broker
//! and unpacks the single resource kind that command is answered with. The
//! broker already guarantees the kinds line up, so the fallthrough arms are
//! protocol errors rather than panics.

use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};

use crate::broker::BrowserControlServer;
use crate::errors::ControlError;
use crate::protocol::{
    BookmarkItem, BookmarkOpenOutcome, BrowserTab, ClickOutcome, Command, GroupColor, HistoryItem,
    JsOutcome, PageChanges, Resource, TabContent,
};

const SCREENSHOT_DIR: &str = "Browser-Screenshots";

fn unexpected(expected: &str, got: Resource) -> ControlError {
    ControlError::Protocol(format!(
        "expected resource '{expected}', got '{}'",
        got.kind().as_str()
    ))
}

impl BrowserControlServer {
    /// Open a new tab. Returns the new tab id if the browser reported one.
    pub async fn open_tab(&self, url: &str) -> Result<Option<u32>, ControlError> {
        let msg = self
            .send(Command::OpenTab {
                url: url.to_string(),
            })
            .await?;
        match msg.resource {
            Resource::OpenedTabId { tab_id } => Ok(tab_id),
            other => Err(unexpected("opened-tab-id", other)),
        }
    }

    pub async fn close_tabs(&self, tab_ids: Vec<u32>) -> Result<(), ControlError> {
        let msg = self.send(Command::CloseTabs { tab_ids }).await?;
        match msg.resource {
            Resource::TabsClosed => Ok(()),
            other => Err(unexpected("tabs-closed", other)),
        }
    }

    pub async fn tab_list(&self) -> Result<Vec<BrowserTab>, ControlError> {
        let msg = self.send(Command::GetTabList).await?;
        match msg.resource {
            Resource::Tabs { tabs } => Ok(tabs),
            other => Err(unexpected("tabs", other)),
        }
    }

    pub async fn recent_history(
        &self,
        search_query: Option<String>,
    ) -> Result<Vec<HistoryItem>, ControlError> {
        let msg = self
            .send(Command::GetBrowserRecentHistory { search_query })
            .await?;
        match msg.resource {
            Resource::History { history_items } => Ok(history_items),
            other => Err(unexpected("history", other)),
        }
    }

    /// Fetch the text content of a tab. `offset` pages through documents the
    /// extension had to truncate.
    pub async fn tab_content(&self, tab_id: u32, offset: u32) -> Result<TabContent, ControlError> {
        let msg = self.send(Command::GetTabContent { tab_id, offset }).await?;
        match msg.resource {
            Resource::TabContent {
                full_text,
                is_truncated,
                total_length,
                links,
                ..
            } => Ok(TabContent {
                full_text,
                is_truncated,
                total_length,
                links,
            }),
            other => Err(unexpected("tab-content", other)),
        }
    }

    pub async fn reorder_tabs(&self, tab_order: Vec<u32>) -> Result<Vec<u32>, ControlError> {
        let msg = self.send(Command::ReorderTabs { tab_order }).await?;
        match msg.resource {
            Resource::TabsReordered { tab_order } => Ok(tab_order),
            other => Err(unexpected("tabs-reordered", other)),
        }
    }

    /// Find and highlight a phrase in a tab; returns the match count.
    pub async fn find_highlight(
        &self,
        tab_id: u32,
        query_phrase: &str,
    ) -> Result<u32, ControlError> {
        let msg = self
            .send(Command::FindHighlight {
                tab_id,
                query_phrase: query_phrase.to_string(),
            })
            .await?;
        match msg.resource {
            Resource::FindHighlightResult { no_of_results } => Ok(no_of_results),
            other => Err(unexpected("find-highlight-result", other)),
        }
    }

    /// Collect tabs into a new group; returns the group id.
    pub async fn group_tabs(
        &self,
        tab_ids: Vec<u32>,
        is_collapsed: bool,
        group_color: GroupColor,
        group_title: &str,
    ) -> Result<u32, ControlError> {
        let msg = self
            .send(Command::GroupTabs {
                tab_ids,
                is_collapsed,
                group_color,
                group_title: group_title.to_string(),
            })
            .await?;
        match msg.resource {
            Resource::NewTabGroup { group_id } => Ok(group_id),
            other => Err(unexpected("new-tab-group", other)),
        }
    }

    /// Click an element by CSS selector, or by viewport coordinates when no
    /// selector is given.
    pub async fn click_element(
        &self,
        tab_id: u32,
        selector: Option<String>,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<ClickOutcome, ControlError> {
        let msg = self
            .send(Command::ClickElement {
                tab_id,
                selector,
                x,
                y,
            })
            .await?;
        match msg.resource {
            Resource::ElementClicked {
                success,
                element_info,
            } => Ok(ClickOutcome {
                success,
                element_info,
            }),
            other => Err(unexpected("element-clicked", other)),
        }
    }

    pub async fn fill_form_field(
        &self,
        tab_id: u32,
        selector: &str,
        value: &str,
        submit: bool,
    ) -> Result<bool, ControlError> {
        let msg = self
            .send(Command::FillFormField {
                tab_id,
                selector: selector.to_string(),
                value: value.to_string(),
                submit,
            })
            .await?;
        match msg.resource {
            Resource::FormFieldFilled { success } => Ok(success),
            other => Err(unexpected("form-field-filled", other)),
        }
    }

    pub async fn execute_javascript(
        &self,
        tab_id: u32,
        code: &str,
    ) -> Result<JsOutcome, ControlError> {
        let msg = self
            .send(Command::ExecuteJavascript {
                tab_id,
                code: code.to_string(),
            })
            .await?;
        match msg.resource {
            Resource::JavascriptExecuted { result, error } => Ok(JsOutcome { result, error }),
            other => Err(unexpected("javascript-executed", other)),
        }
    }

    /// Watch a tab for DOM mutations for up to `timeout` milliseconds
    /// (extension default applies when `None`).
    pub async fn monitor_page_changes(
        &self,
        tab_id: u32,
        selector: Option<String>,
        timeout: Option<u64>,
    ) -> Result<PageChanges, ControlError> {
        let msg = self
            .send(Command::MonitorPageChanges {
                tab_id,
                selector,
                timeout,
            })
            .await?;
        match msg.resource {
            Resource::PageChangesDetected { changes, timed_out } => {
                Ok(PageChanges { changes, timed_out })
            }
            other => Err(unexpected("page-changes-detected", other)),
        }
    }

    /// Capture a tab as a PNG data URL.
    pub async fn screenshot_website(
        &self,
        tab_id: u32,
        full_page: bool,
    ) -> Result<String, ControlError> {
        let msg = self
            .send(Command::ScreenshotWebsite { tab_id, full_page })
            .await?;
        match msg.resource {
            Resource::ScreenshotSaved { data_url } => Ok(data_url),
            other => Err(unexpected("screenshot-saved", other)),
        }
    }

    /// Capture a tab and write the PNG under `Pictures/Browser-Screenshots`.
    /// Returns the path of the written file.
    pub async fn save_screenshot(
        &self,
        tab_id: u32,
        full_page: bool,
    ) -> Result<PathBuf, ControlError> {
        let data_url = self.screenshot_website(tab_id, full_page).await?;
        let encoded = data_url
            .strip_prefix("data:image/png;base64,")
            .ok_or_else(|| {
                ControlError::Protocol("screenshot payload is not a PNG data URL".into())
            })?;
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ControlError::Protocol(format!("screenshot payload: {e}")))?;

        let pictures = dirs::picture_dir()
            .ok_or_else(|| ControlError::Internal("no pictures directory for this user".into()))?;
        let dir = pictures.join(SCREENSHOT_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ControlError::Internal(format!("create {}: {e}", dir.display())))?;

        let filename = format!("{}.png", chrono::Local::now().format("%d%m%y%H%M%S%3f"));
        let path = dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ControlError::Internal(format!("write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Screenshot saved");
        Ok(path)
    }

    pub async fn search_bookmarks(
        &self,
        query: Option<String>,
    ) -> Result<Vec<BookmarkItem>, ControlError> {
        let msg = self.send(Command::SearchBookmarks { query }).await?;
        match msg.resource {
            Resource::BookmarksFound { bookmarks } => Ok(bookmarks),
            other => Err(unexpected("bookmarks-found", other)),
        }
    }

    /// Open a bookmark by id in a new tab. `success` is false for folders
    /// and separators.
    pub async fn open_bookmark(
        &self,
        bookmark_id: &str,
    ) -> Result<BookmarkOpenOutcome, ControlError> {
        let msg = self
            .send(Command::OpenBookmark {
                bookmark_id: bookmark_id.to_string(),
            })
            .await?;
        match msg.resource {
            Resource::BookmarkOpened { tab_id, success } => {
                Ok(BookmarkOpenOutcome { tab_id, success })
            }
            other => Err(unexpected("bookmark-opened", other)),
        }
    }
}
