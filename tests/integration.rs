//! Runs against a real Chromium; needs a local Chrome install.

use paydown_plan::{ChromeSession, Error, Locator};

const FORM_PAGE: &str = "data:text/html;charset=utf-8,<html><body>\
    <input id='debtCount' type='text'>\
    <span class='opt'>Mortgage</span>\
    <span class='opt' style='display:none'>Mortgage</span>\
    <span class='dup'>Windfall</span><span class='dup'>Windfall</span>\
    <div><h5>Results</h5><p>Paid off</p></div>\
    </body></html>";

async fn open() -> (ChromeSession, paydown_plan::Driver<paydown_plan::ChromePage>) {
    let session = ChromeSession::builder()
        .headless(true)
        .calculator_url(FORM_PAGE)
        .build()
        .await
        .expect("Failed to launch browser");
    let driver = session
        .open_calculator()
        .await
        .expect("Failed to open page");
    (session, driver)
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_type_verified() {
    let (session, driver) = open().await;

    driver
        .type_verified(&Locator::id("debtCount"), "3")
        .await
        .expect("Failed to type");

    drop(driver);
    session.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_click_visible_skips_hidden_matches() {
    let (session, driver) = open().await;

    driver
        .click_visible(&Locator::xpath("//span[text()='Mortgage']"))
        .await
        .expect("Failed to click the visible option");

    let err = driver
        .click_visible(&Locator::css("span.dup"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousElement { count: 2, .. }));

    drop(driver);
    session.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_results_inner_html() {
    let (session, driver) = open().await;

    let html = driver
        .inner_html(&Locator::xpath("//h5[text()='Results']/.."))
        .await
        .expect("Failed to read results");
    assert!(html.contains("Paid off"), "HTML was: {html}");

    driver.dismiss_interstitial().await.expect("No dialog to dismiss");

    drop(driver);
    session.close().await.expect("Failed to close browser");
}
