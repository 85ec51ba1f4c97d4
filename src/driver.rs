//! Browser automation capability and the reliability rules built on it.
//!
//! [`BrowserActions`] is the narrow surface a page backend has to offer:
//! navigate, locate, click, type, read. [`Driver`] layers the waiting,
//! visible-match and type-and-verify behaviour on top so the backend can be
//! swapped (Chromium over CDP in production, scripted fakes in tests).

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{BrowserConfig, Interstitial};
use crate::error::{Error, Result};

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Element id attribute.
    Id(String),
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id={id}"),
            Locator::Css(css) => write!(f, "css={css}"),
            Locator::XPath(xpath) => write!(f, "xpath={xpath}"),
        }
    }
}

/// Operations a page backend must provide.
///
/// Elements are addressed by locator plus the index of the match in
/// document order, so backends never hand out element handles.
#[async_trait]
pub trait BrowserActions: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Visibility of every element matching `locator`, in document order.
    /// An empty vector means nothing matches.
    async fn visibility(&self, locator: &Locator) -> Result<Vec<bool>>;

    async fn click(&self, locator: &Locator, index: usize) -> Result<()>;

    /// Clear the field and type `text` into it.
    async fn clear_and_type(&self, locator: &Locator, index: usize, text: &str) -> Result<()>;

    /// Current `value` of a form field.
    async fn value(&self, locator: &Locator, index: usize) -> Result<String>;

    async fn inner_html(&self, locator: &Locator, index: usize) -> Result<String>;
}

/// Waiting and verification on top of a [`BrowserActions`] backend.
pub struct Driver<B> {
    actions: B,
    timeout: Duration,
    poll_interval: Duration,
    type_settle: Duration,
    type_retries: u32,
    interstitial: Interstitial,
}

impl<B: BrowserActions> Driver<B> {
    pub fn new(actions: B, config: &BrowserConfig) -> Self {
        Self {
            actions,
            timeout: config.default_timeout,
            poll_interval: config.poll_interval,
            type_settle: config.type_settle,
            type_retries: config.type_retries.max(1),
            interstitial: config.interstitial.clone(),
        }
    }

    pub fn actions(&self) -> &B {
        &self.actions
    }

    pub async fn open(&self, url: &str) -> Result<()> {
        info!(url, "opening page");
        self.actions.navigate(url).await
    }

    /// Index of the single visible match for `locator`.
    pub async fn visible_index(&self, locator: &Locator) -> Result<usize> {
        let visible: Vec<usize> = self
            .actions
            .visibility(locator)
            .await?
            .into_iter()
            .enumerate()
            .filter_map(|(index, shown)| shown.then_some(index))
            .collect();
        match visible.as_slice() {
            [index] => Ok(*index),
            [] => Err(Error::ElementNotFound(format!("no visible element for {locator}"))),
            _ => Err(Error::AmbiguousElement {
                locator: locator.to_string(),
                count: visible.len(),
            }),
        }
    }

    /// Click the one visible match; zero or several visible matches is an error.
    pub async fn click_visible(&self, locator: &Locator) -> Result<()> {
        let index = self.visible_index(locator).await?;
        self.actions.click(locator, index).await
    }

    /// Wait for exactly one match to show, then click it.
    pub async fn click_when_visible(&self, locator: &Locator) -> Result<()> {
        let index = self.wait_for_visible(locator).await?;
        self.actions.click(locator, index).await
    }

    /// Click the first match once it is present.
    pub async fn click(&self, locator: &Locator) -> Result<()> {
        self.wait_for_present(locator).await?;
        self.actions.click(locator, 0).await
    }

    /// Type `text` into the first match and read it back, retyping until the
    /// field holds exactly `text`.
    pub async fn type_verified(&self, locator: &Locator, text: &str) -> Result<()> {
        self.wait_for_present(locator).await?;
        let mut actual = String::new();
        for attempt in 1..=self.type_retries {
            self.actions.clear_and_type(locator, 0, text).await?;
            if !self.type_settle.is_zero() {
                tokio::time::sleep(self.type_settle).await;
            }
            actual = self.actions.value(locator, 0).await?;
            if actual == text {
                debug!(%locator, attempt, "field verified");
                return Ok(());
            }
            warn!(
                %locator,
                attempt,
                expected = text,
                actual = %actual,
                "field value mismatch, retyping"
            );
        }
        Err(Error::InputMismatch {
            locator: locator.to_string(),
            expected: text.to_string(),
            actual,
            attempts: self.type_retries,
        })
    }

    /// Wait until at least one element matches; returns the match count.
    pub async fn wait_for_present(&self, locator: &Locator) -> Result<usize> {
        self.poll(locator, "presence", |shown| !shown.is_empty())
            .await
            .map(|shown| shown.len())
    }

    /// Wait until exactly one match is visible; returns its index.
    pub async fn wait_for_visible(&self, locator: &Locator) -> Result<usize> {
        self.poll(locator, "visibility", |shown| shown.iter().any(|s| *s)).await?;
        self.visible_index(locator).await
    }

    /// Wait until no match is visible (or nothing matches at all).
    pub async fn wait_for_invisible(&self, locator: &Locator) -> Result<()> {
        self.poll(locator, "invisibility", |shown| !shown.iter().any(|s| *s))
            .await
            .map(|_| ())
    }

    /// Polls every `poll_interval` up to the configured timeout.
    async fn poll<F>(&self, locator: &Locator, what: &str, done: F) -> Result<Vec<bool>>
    where
        F: Fn(&[bool]) -> bool,
    {
        let start = Instant::now();
        loop {
            let shown = self.actions.visibility(locator).await?;
            if done(&shown) {
                return Ok(shown);
            }
            if start.elapsed() >= self.timeout {
                return Err(Error::Timeout(format!("{what} of {locator}")));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Close the promotional dialog if it is showing. Its absence is fine.
    pub async fn dismiss_interstitial(&self) -> Result<()> {
        let dialog = &self.interstitial.dialog;
        let shown = self.actions.visibility(dialog).await?;
        if !shown.iter().any(|s| *s) {
            debug!("no interstitial dialog");
            return Ok(());
        }
        info!("dismissing interstitial dialog");
        self.click_visible(&self.interstitial.close).await?;
        self.wait_for_invisible(dialog).await
    }

    /// Inner HTML of the first match once it is present.
    pub async fn inner_html(&self, locator: &Locator) -> Result<String> {
        self.wait_for_present(locator).await?;
        self.actions.inner_html(locator, 0).await
    }

    pub async fn inner_html_visible(&self, locator: &Locator) -> Result<String> {
        let index = self.visible_index(locator).await?;
        self.actions.inner_html(locator, index).await
    }
}
