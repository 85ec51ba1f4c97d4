use chromiumoxide::element::Element as CrElement;

use crate::error::{Error, Result};

const IS_VISIBLE_JS: &str = r#"function() {
    const style = window.getComputedStyle(this);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    return !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length);
}"#;

const CLEAR_JS: &str = r#"function() {
    this.focus();
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

const VALUE_JS: &str = "function() { return this.value === undefined ? '' : String(this.value); }";

/// Wrapper around a chromiumoxide Element with the form operations the calculator needs.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    /// Click this element (scrolls into view first).
    pub async fn click(&self) -> Result<()> {
        self.inner.click().await?;
        Ok(())
    }

    /// Rendered and not hidden by CSS.
    pub async fn is_visible(&self) -> Result<bool> {
        let value = self.call(IS_VISIBLE_JS).await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Empty the field and notify the page's input listeners.
    pub async fn clear(&self) -> Result<()> {
        self.call(CLEAR_JS).await?;
        Ok(())
    }

    /// Type text into this element one key at a time.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.inner.type_str(text).await?;
        Ok(())
    }

    /// Current `value` property of a form field.
    pub async fn value(&self) -> Result<String> {
        let value = self.call(VALUE_JS).await?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    /// Get the inner HTML of this element.
    pub async fn inner_html(&self) -> Result<String> {
        self.inner
            .inner_html()
            .await?
            .ok_or_else(|| Error::ElementNotFound("inner HTML is empty".into()))
    }

    async fn call(&self, function: &str) -> Result<Option<serde_json::Value>> {
        let returns = self.inner.call_js_fn(function, false).await?;
        if let Some(details) = returns.exception_details {
            return Err(Error::JsError(details.text));
        }
        Ok(returns.result.value)
    }
}
