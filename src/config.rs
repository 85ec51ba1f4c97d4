use std::path::PathBuf;
use std::time::Duration;

use crate::browser::ChromeSession;
use crate::driver::Locator;
use crate::error::Result;

/// Address of the pay-down calculator both integration paths talk to.
pub const CALCULATOR_URL: &str =
    "https://www.bankrate.com/calculators/managing-debt/debt-pay-down-calculator.aspx";

/// Desktop Chrome user agent sent by the replay client and the launched browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0.0.0 Safari/537.36";

pub struct BrowserConfig {
    pub headless: bool,
    /// Emulate a phone-sized touch viewport instead of a desktop window.
    pub mobile: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<PathBuf>,
    pub calculator_url: String,
    /// Upper bound for every wait (default: 10s).
    pub default_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause between typing into a field and reading its value back.
    pub type_settle: Duration,
    /// How many times a field is retyped before giving up.
    pub type_retries: u32,
    /// How many decades the date picker may page before giving up.
    pub max_decade_pages: u32,
    pub interstitial: Interstitial,
}

/// The promotional dialog the calculator page sometimes pops over the form.
#[derive(Debug, Clone)]
pub struct Interstitial {
    pub dialog: Locator,
    pub close: Locator,
}

impl Default for Interstitial {
    fn default() -> Self {
        Self {
            dialog: Locator::css("div.modal[role='dialog']"),
            close: Locator::css("div.modal[role='dialog'] button.close"),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            mobile: false,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            calculator_url: CALCULATOR_URL.to_string(),
            default_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            type_settle: Duration::from_millis(250),
            type_retries: 5,
            max_decade_pages: 20,
            interstitial: Interstitial::default(),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Emulate an iPhone-sized viewport (375x667, touch, device scale 2).
    pub fn mobile(mut self, mobile: bool) -> Self {
        self.config.mobile = mobile;
        if mobile {
            self.config.viewport_width = 375;
            self.config.viewport_height = 667;
        }
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn calculator_url(mut self, url: impl Into<String>) -> Self {
        self.config.calculator_url = url.into();
        self
    }

    /// Set the default timeout for element waits.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn type_retries(mut self, retries: u32) -> Self {
        self.config.type_retries = retries;
        self
    }

    pub fn interstitial(mut self, dialog: Locator, close: Locator) -> Self {
        self.config.interstitial = Interstitial { dialog, close };
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<ChromeSession> {
        ChromeSession::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for the HTTP replay client.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            url: CALCULATOR_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
