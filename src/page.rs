use async_trait::async_trait;
use chromiumoxide::page::Page as CrPage;
use tracing::debug;

use crate::driver::{BrowserActions, Locator};
use crate::element::Element;
use crate::error::{Error, Result};

/// A Chromium tab exposed through [`BrowserActions`].
pub struct ChromePage {
    inner: CrPage,
}

impl ChromePage {
    pub(crate) fn new(inner: CrPage) -> Self {
        Self { inner }
    }

    /// All elements matching `locator`. Lookup failures count as no match.
    async fn resolve(&self, locator: &Locator) -> Result<Vec<Element>> {
        let found = match locator {
            Locator::Id(id) => self.inner.find_elements(format!("[id=\"{id}\"]")).await,
            Locator::Css(css) => self.inner.find_elements(css.as_str()).await,
            Locator::XPath(xpath) => self.inner.find_xpaths(xpath.as_str()).await,
        };
        match found {
            Ok(els) => Ok(els.into_iter().map(Element::new).collect()),
            Err(e) => {
                debug!(%locator, error = %e, "lookup found nothing");
                Ok(Vec::new())
            }
        }
    }

    async fn nth(&self, locator: &Locator, index: usize) -> Result<Element> {
        self.resolve(locator)
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::ElementNotFound(format!("{locator} [{index}]")))
    }
}

#[async_trait]
impl BrowserActions for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    async fn visibility(&self, locator: &Locator) -> Result<Vec<bool>> {
        let mut shown = Vec::new();
        for el in self.resolve(locator).await? {
            shown.push(el.is_visible().await?);
        }
        Ok(shown)
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<()> {
        self.nth(locator, index).await?.click().await
    }

    async fn clear_and_type(&self, locator: &Locator, index: usize, text: &str) -> Result<()> {
        let el = self.nth(locator, index).await?;
        el.clear().await?;
        el.click().await?;
        el.type_text(text).await
    }

    async fn value(&self, locator: &Locator, index: usize) -> Result<String> {
        self.nth(locator, index).await?.value().await
    }

    async fn inner_html(&self, locator: &Locator, index: usize) -> Result<String> {
        self.nth(locator, index).await?.inner_html().await
    }
}
