use serde::{Deserialize, Serialize};

/// Per-session counters, snapshotted into the close log line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub pages_opened: u64,
    pub navigation_failures: u64,
    pub cookies_injected: u64,
    pub scripts_evaluated: u64,
    pub elements_clicked: u64,
    pub fields_filled: u64,
}

impl SessionMetrics {
    pub fn record_page_open(&mut self) {
        self.pages_opened = self.pages_opened.saturating_add(1);
    }

    pub fn record_navigation_failure(&mut self) {
        self.navigation_failures = self.navigation_failures.saturating_add(1);
    }

    pub fn record_cookies_injected(&mut self, count: u64) {
        self.cookies_injected = self.cookies_injected.saturating_add(count);
    }

    pub fn record_script_evaluated(&mut self) {
        self.scripts_evaluated = self.scripts_evaluated.saturating_add(1);
    }

    pub fn record_element_clicked(&mut self) {
        self.elements_clicked = self.elements_clicked.saturating_add(1);
    }

    pub fn record_field_filled(&mut self) {
        self.fields_filled = self.fields_filled.saturating_add(1);
    }
}
