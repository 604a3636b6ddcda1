use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;

use crate::config::StealthSection;

use super::error::{ScrapeError, ScrapeResult};
use super::session::Identity;

/// Injects new-document scripts that normalize the signals automation
/// detectors probe first: the webdriver flag, the plugin list, the language
/// list, and the missing `window.chrome` runtime in headless builds.
#[derive(Debug, Clone)]
pub struct StealthMasker {
    config: StealthSection,
}

impl StealthMasker {
    pub fn new(config: StealthSection) -> Self {
        Self { config }
    }

    pub async fn apply(&self, page: &Page, identity: &Identity) -> ScrapeResult<()> {
        if self.config.mask_webdriver {
            self.inject(page, Self::webdriver_script()).await?;
        }
        if self.config.normalize_plugins {
            self.inject(page, Self::plugins_script()).await?;
        }
        if self.config.normalize_languages {
            self.inject(page, &Self::languages_script(&identity.locale))
                .await?;
        }
        if self.config.chrome_runtime_stub {
            self.inject(page, Self::chrome_runtime_script()).await?;
        }
        Ok(())
    }

    async fn inject(&self, page: &Page, source: &str) -> ScrapeResult<()> {
        page.evaluate_on_new_document(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(source)
                .build()
                .map_err(ScrapeError::Configuration)?,
        )
        .await?;
        Ok(())
    }

    fn webdriver_script() -> &'static str {
        r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
    });
})();
"#
    }

    fn plugins_script() -> &'static str {
        r#"
(() => {
    const fakePlugins = [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
        { name: 'Native Client', filename: 'internal-nacl-plugin' },
    ];
    Object.defineProperty(navigator, 'plugins', {
        get: () => fakePlugins,
    });
})();
"#
    }

    fn languages_script(locale: &str) -> String {
        format!(
            r#"
(() => {{
    Object.defineProperty(navigator, 'language', {{ get: () => '{locale}' }});
    Object.defineProperty(navigator, 'languages', {{ get: () => ['{locale}', 'en'] }});
}})();
"#
        )
    }

    fn chrome_runtime_script() -> &'static str {
        r#"
(() => {
    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {};
    }
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );
})();
"#
    }
}
