//! Whole-plan runs of the browser page object against a scripted page.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use paydown_plan::calculator::{PICKER_HEADING, RESULTS_DIV};
use paydown_plan::{
    BrowserActions, BrowserConfig, Calculator, Driver, Error, Locator, PlanConfig, PlanRunner,
    Result,
};

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Click(Locator),
    Type(Locator, String),
}

/// Every locator matches one visible element unless overridden; typed text
/// sticks, the decade heading always shows the 2020s.
#[derive(Default)]
struct ScriptedPage {
    visibility: HashMap<Locator, Vec<bool>>,
    values: Mutex<HashMap<Locator, String>>,
    actions: Mutex<Vec<Action>>,
}

impl ScriptedPage {
    fn showing(mut self, locator: Locator, visibility: &[bool]) -> Self {
        self.visibility.insert(locator, visibility.to_vec());
        self
    }

    fn typed(&self) -> Vec<(String, String)> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter_map(|a| match a {
                Action::Type(Locator::Id(id), text) => Some((id.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    fn clicked(&self) -> Vec<Locator> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter_map(|a| match a {
                Action::Click(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrowserActions for ScriptedPage {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn visibility(&self, locator: &Locator) -> Result<Vec<bool>> {
        if let Some(shown) = self.visibility.get(locator) {
            return Ok(shown.clone());
        }
        // the interstitial never shows up unless asked for
        if matches!(locator, Locator::Css(css) if css.contains("modal")) {
            return Ok(Vec::new());
        }
        Ok(vec![true])
    }

    async fn click(&self, locator: &Locator, _index: usize) -> Result<()> {
        self.actions.lock().unwrap().push(Action::Click(locator.clone()));
        Ok(())
    }

    async fn clear_and_type(&self, locator: &Locator, _index: usize, text: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(locator.clone(), text.to_string());
        self.actions
            .lock()
            .unwrap()
            .push(Action::Type(locator.clone(), text.to_string()));
        Ok(())
    }

    async fn value(&self, locator: &Locator, _index: usize) -> Result<String> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .unwrap_or_default())
    }

    async fn inner_html(&self, locator: &Locator, _index: usize) -> Result<String> {
        match locator {
            Locator::Css(css) if css == PICKER_HEADING => Ok("2020 - 2029".into()),
            Locator::XPath(x) if x == RESULTS_DIV => {
                Ok("<h5>Results</h5><table><tr><td>Debt free: March 2029</td></tr></table>".into())
            }
            _ => Ok(String::new()),
        }
    }
}

fn calculator(page: ScriptedPage) -> Calculator<ScriptedPage> {
    let config = BrowserConfig {
        default_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        type_settle: Duration::ZERO,
        ..BrowserConfig::default()
    };
    Calculator::new(Driver::new(page, &config), config.max_decade_pages)
}

fn card_plan() -> PlanConfig {
    PlanConfig::from_json_str(
        &json!({
            "loans": [{"lender_name": "Card A", "interest_rate": "19.0", "balance": "2000",
                       "min_monthly_payment": "50", "loan_type": 0}],
            "user": {"tax_bracket": "25", "budget_savings": "100", "raises": "0"},
            "windfalls": []
        })
        .to_string(),
    )
    .unwrap()
}

fn pair(id: &str, text: &str) -> (String, String) {
    (id.to_string(), text.to_string())
}

#[tokio::test]
async fn single_card_plan_is_typed_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PlanRunner::new(dir.path());
    let mut calc = calculator(ScriptedPage::default());

    let path = runner.run(&mut calc, &card_plan(), "card").await.unwrap();

    assert_eq!(
        calc.driver().actions().typed(),
        vec![
            pair("debtCount", "1"),
            pair("lenderNamecreditCardLoan0", "Card A"),
            pair("amountcreditCardLoan0", "2000"),
            pair("interestRatecreditCardLoan0", "19.0"),
            pair("monthlyPaymentcreditCardLoan0", "50"),
            pair("additionalIncomeCount", "0"),
            pair("extraPayment", "100"),
        ]
    );

    let clicked = calc.driver().actions().clicked();
    assert!(clicked.contains(&Locator::xpath(
        "//span[text()='Credit card or retailer charge card']"
    )));
    assert!(clicked.contains(&Locator::xpath(
        "//span[text()='25% ($37,951 to $91,900 single; $75,901 to $153,100 married)']"
    )));
    assert!(!clicked.iter().any(|l| matches!(l, Locator::XPath(x) if x.contains("promotionType"))));

    assert_eq!(path, dir.path().join("card.html"));
    let saved = std::fs::read_to_string(path).unwrap();
    assert!(saved.contains("Debt free: March 2029"));
}

#[tokio::test]
async fn promo_card_other_loan_and_windfall() {
    let plan = PlanConfig::from_json_str(
        &json!({
            "loans": [
                {"lender_name": "Store", "interest_rate": "24.9", "balance": "900",
                 "min_monthly_payment": "30", "loan_type": 0,
                 "promo": {"regular_rate": "24.9", "promo_rate": "0", "end_date": "06/30/2027",
                           "minimum_monthly_payment": "20", "promo_type": 0}},
                {"lender_name": "Student", "interest_rate": "5.0", "balance": "12000",
                 "min_monthly_payment": "140", "loan_type": 4, "deductible": "1"}
            ],
            "user": {"tax_bracket": "15", "budget_savings": "50", "raises": 0},
            "windfalls": [{"amount": "1500", "date": "04/15/2028"}]
        })
        .to_string(),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let runner = PlanRunner::new(dir.path());
    let mut calc = calculator(ScriptedPage::default());

    runner.run(&mut calc, &plan, "mixed").await.unwrap();

    let typed = calc.driver().actions().typed();
    assert!(typed.contains(&pair("introductoryRatecreditCardLoan0", "0")));
    assert!(typed.contains(&pair("lenderNameotherLoanLoan1", "Student")));
    assert!(typed.contains(&pair("additionalIncomeCount", "1")));
    assert!(typed.contains(&pair("amountIncome0", "1500")));

    let clicked = calc.driver().actions().clicked();
    assert!(clicked.contains(&Locator::xpath(
        "(//input[@name='promotionTypecreditCardLoan0']/..)[1]"
    )));
    assert!(clicked.contains(&Locator::xpath(
        "//input[@name='taxDeductibleotherLoanLoan1'][@value='true']/.."
    )));
    assert!(clicked.contains(&Locator::xpath("//span[text()='Windfall']")));
    assert!(clicked.contains(&Locator::xpath(
        "//span[text()='June'][contains(@class, 'cell month')]"
    )));
    assert!(clicked.contains(&Locator::xpath(
        "//span[text()='2028'][contains(@class, 'cell year')]"
    )));
}

#[tokio::test]
async fn ambiguous_loan_type_option_aborts() {
    let page = ScriptedPage::default().showing(
        Locator::xpath("//span[text()='Credit card or retailer charge card']"),
        &[true, true],
    );
    let dir = tempfile::tempdir().unwrap();
    let runner = PlanRunner::new(dir.path());
    let mut calc = calculator(page);

    let err = runner.run(&mut calc, &card_plan(), "card").await.unwrap_err();
    assert!(matches!(err, Error::AmbiguousElement { count: 2, .. }));
    assert!(!dir.path().join("card.html").exists());
}

#[tokio::test]
async fn missing_results_region_times_out() {
    let page = ScriptedPage::default().showing(Locator::xpath(RESULTS_DIV), &[]);
    let dir = tempfile::tempdir().unwrap();
    let runner = PlanRunner::new(dir.path());
    let mut calc = calculator(page);

    let err = runner.run(&mut calc, &card_plan(), "card").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}

#[tokio::test]
async fn vehicle_loan_is_refused_before_typing() {
    let plan = PlanConfig::from_json_str(
        &json!({
            "loans": [{"lender_name": "Auto", "interest_rate": "4.9", "balance": "9000",
                       "min_monthly_payment": "260", "loan_type": 1}],
            "user": {"tax_bracket": "25", "budget_savings": "100", "raises": 0}
        })
        .to_string(),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let runner = PlanRunner::new(dir.path());
    let mut calc = calculator(ScriptedPage::default());

    let err = runner.run(&mut calc, &plan, "auto").await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert!(calc.driver().actions().actions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn top_bracket_is_offered_in_the_browser() {
    let plan = PlanConfig::from_json_str(
        &json!({
            "loans": [{"lender_name": "Card A", "interest_rate": "19.0", "balance": "2000",
                       "min_monthly_payment": "50", "loan_type": 0}],
            "user": {"tax_bracket": "39.6", "budget_savings": "100", "raises": 0}
        })
        .to_string(),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let runner = PlanRunner::new(dir.path());
    let mut calc = calculator(ScriptedPage::default());

    runner.run(&mut calc, &plan, "top").await.unwrap();
    assert!(calc.driver().actions().clicked().contains(&Locator::xpath(
        "//span[text()='39.6% ($418,401+ single; $470,001+ married)']"
    )));
}
