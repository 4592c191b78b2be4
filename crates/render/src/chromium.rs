use crate::{
    error::{Error, Result},
    pool::{Engine, Launcher},
};
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::{
        browser::BrowserContextId,
        page::CaptureScreenshotFormat,
        target::{CreateBrowserContextParams, CreateTargetParams},
    },
    error::CdpError,
};
use futures_util::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;

/// Selector of the element that is screenshotted.
pub const ROOT_SELECTOR: &str = "#root";

/// Launches headless Chromium instances.
pub struct ChromiumLauncher {
    /// Explicit browser executable. Auto-detected when absent.
    pub executable: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

/// One browser process with one reusable browsing context.
pub struct Chromium {
    browser: Browser,
    context: BrowserContextId,
    /// Drives the DevTools connection. Dropping the browser without this task stalls every call.
    handler: JoinHandle<()>,
}

impl Launcher for ChromiumLauncher {
    type Engine = Chromium;

    async fn launch(&self) -> Result<Chromium> {
        let mut builder = BrowserConfig::builder().window_size(self.width, self.height).no_sandbox();
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(|err| {
            log::error!("invalid browser configuration: {err}");
            Error::Launch
        })?;

        let (mut browser, mut events) = Browser::launch(config).await.map_err(|err| {
            log::error!("failed to launch headless browser: {err}");
            Error::Launch
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    log::debug!("browser event error: {err}");
                }
            }
        });

        let context = match browser.create_browser_context(CreateBrowserContextParams::default()).await {
            Ok(context) => context,
            Err(err) => {
                log::error!("failed to create browser context: {err}");
                Chromium::close(&mut browser).await;
                handler.abort();
                return Err(Error::Launch);
            }
        };

        Ok(Chromium { browser, context, handler })
    }
}

impl Chromium {
    async fn close(browser: &mut Browser) {
        if let Err(err) = browser.close().await {
            log::warn!("failed to close headless browser: {err}");
        }
        if let Err(err) = browser.wait().await {
            log::warn!("failed to reap headless browser: {err}");
        }
    }
}

impl Engine for Chromium {
    async fn capture(&self, html: &str) -> Result<Vec<u8>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.context.clone())
            .build()
            .map_err(|err| {
                log::error!("invalid page parameters: {err}");
                Error::Capture
            })?;

        let page = self.browser.new_page(params).await.map_err(|err| {
            log::error!("failed to open page: {err}");
            Error::Capture
        })?;

        let result: core::result::Result<Vec<u8>, CdpError> = async {
            page.set_content(html).await?;
            let root = page.find_element(ROOT_SELECTOR).await?;
            root.screenshot(CaptureScreenshotFormat::Png).await
        }
        .await;

        // Always release the page, even when the capture failed.
        if let Err(err) = page.close().await {
            log::warn!("failed to close page: {err}");
        }

        result.map_err(|err| {
            log::error!("failed to capture poll: {err}");
            Error::Capture
        })
    }

    async fn shutdown(mut self) {
        Self::close(&mut self.browser).await;
        self.handler.abort();
    }
}
