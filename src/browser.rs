use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tracing::{debug, info};

use crate::config::{BrowserBuilder, BrowserConfig, USER_AGENT};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::page::ChromePage;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "no-first-run",
    "disable-client-side-phishing-detection",
    "disable-prompt-on-repost",
];

/// One launched Chromium, used for a single calculator run.
pub struct ChromeSession {
    browser: CrBrowser,
    config: BrowserConfig,
    _handler_task: tokio::task::JoinHandle<()>,
}

impl ChromeSession {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Launch a browser instance with the given configuration.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let mut builder = CrBrowserConfig::builder();

        if config.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }

        // chromiumoxide adds the `--` prefix itself
        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }
        builder = builder.arg(("user-agent", USER_AGENT));

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: config.mobile.then_some(2.0),
            emulating_mobile: config.mobile,
            is_landscape: false,
            has_touch: config.mobile,
        });

        let cr_config = builder
            .build()
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        info!(headless = config.headless, mobile = config.mobile, "browser launched");
        Ok(Self {
            browser,
            config,
            _handler_task: handler_task,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Open a tab on the calculator page, wrapped in a [`Driver`].
    pub async fn open_calculator(&self) -> Result<Driver<ChromePage>> {
        let cr_page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        let driver = Driver::new(ChromePage::new(cr_page), &self.config);
        driver.open(&self.config.calculator_url).await?;
        Ok(driver)
    }

    /// Shut the browser down and wait for the process to exit.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self.browser.wait().await?;
        debug!("browser closed");
        Ok(())
    }
}
