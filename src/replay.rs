//! Replays the calculator's server-side postback wizard over plain HTTP.
//!
//! The ASP.NET form keeps its session in a hidden `__VIEWSTATE` field. Every
//! step posts the fields of one wizard question together with the token from
//! the previous response, then takes the new token from the reply. A reply
//! without a token ends the run.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::config::ReplayConfig;
use crate::error::{Error, Result};
use crate::plan::{format_date, Loan, LoanType, Promotion, PromoType, Windfall};

/// Every wizard field name starts with this control path.
pub const FIELD_PREFIX: &str = "ctl00$well$defaultUC$";
pub const VIEW_STATE_FIELD: &str = "__VIEWSTATE";
const VIEW_STATE_SELECTOR: &str = "input#__VIEWSTATE";
const RESULTS_SELECTOR: &str = "div.calculator";

/// Tax bracket answers of the postback form, keyed by bracket percentage.
pub const TAX_BRACKETS: &[(&str, &str)] = &[
    ("10", "10% (up to $7,825 single; up to $15,650 married)"),
    ("15", "15% ($7,826-$31,850 single; $15,651-$63,700 married)"),
    ("25", "25% ($31,851-$77,100 single; $63,701-$128,500 married)"),
    ("28", "28% ($77,101-$160,850 single; $128,501-$195,850 married)"),
    ("33", "33% ($169,851-$349,700 single; $195,851-$349,700 married)"),
    ("35", "35% ($349,701 or more)"),
];

pub fn tax_bracket_code(bracket: &str) -> Result<&'static str> {
    TAX_BRACKETS
        .iter()
        .find(|(key, label)| *key == bracket || *label == bracket)
        .map(|(key, _)| *key)
        .ok_or_else(|| Error::UnknownTaxBracket(bracket.to_string()))
}

/// Answer to "will the interest rate or payment change in the future?".
pub const NO_CHANGE: &str = "1";

/// One question of the wizard, in the order the site asks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    DebtCount,
    LenderAndType,
    Balance,
    LoanDetails,
    ChangeQuestion,
    PromoType,
    PromoDetails,
    InterestAndPayment,
    SavingsContinue,
    BudgetSavings,
    Raises,
    WindfallCount,
    Windfalls,
    TaxBracket,
    GeneratePlan,
}

impl Step {
    /// Value of the `isValid` field the site expects for this step.
    pub fn validator(self) -> &'static str {
        match self {
            Step::DebtCount => "DEFAULT",
            Step::LenderAndType => "LT",
            Step::Balance => "LB",
            Step::LoanDetails => "OL",
            Step::PromoDetails => "LIIR",
            Step::InterestAndPayment => "NSP",
            Step::BudgetSavings => "AMC",
            Step::Raises => "NOR",
            Step::WindfallCount => "NOW",
            Step::ChangeQuestion
            | Step::PromoType
            | Step::SavingsContinue
            | Step::Windfalls
            | Step::TaxBracket
            | Step::GeneratePlan => "",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Form fields of one step, without the control-path prefix.
#[derive(Debug, Clone)]
pub struct FormStep {
    pub step: Step,
    fields: Vec<(String, String)>,
}

impl FormStep {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            fields: vec![("isValid".to_string(), step.validator().to_string())],
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((name.into(), value.to_string()));
        self
    }

    /// Short field name lookup, e.g. `debts`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Full wire parameters: prefixed fields plus the view-state token.
    pub fn to_params(&self, view_state: &str) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .fields
            .iter()
            .map(|(name, value)| (format!("{FIELD_PREFIX}{name}"), value.clone()))
            .collect();
        params.push((VIEW_STATE_FIELD.to_string(), view_state.to_string()));
        params
    }
}

/// Sends the wizard's requests and returns response bodies.
#[async_trait]
pub trait FormTransport: Send {
    async fn get(&mut self, url: &str) -> Result<String>;
    async fn post(&mut self, url: &str, params: &[(String, String)]) -> Result<String>;
}

/// [`FormTransport`] over a cookie-keeping reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ReplayConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FormTransport for HttpTransport {
    async fn get(&mut self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn post(&mut self, url: &str, params: &[(String, String)]) -> Result<String> {
        let response = self
            .client
            .post(url)
            .form(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Extract the `__VIEWSTATE` token from a response page.
pub fn view_state(html: &str) -> Option<String> {
    let selector = Selector::parse(VIEW_STATE_SELECTOR).ok()?;
    Html::parse_document(html)
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// The `div.calculator` fragment of the final plan page.
pub fn results_fragment(html: &str) -> Option<String> {
    let selector = Selector::parse(RESULTS_SELECTOR).ok()?;
    Html::parse_document(html)
        .select(&selector)
        .next()
        .map(|div| div.html())
}

/// Client for the calculator's postback wizard.
pub struct DebtCalculatorClient<T> {
    transport: T,
    url: String,
    view_state: Option<String>,
    history: Vec<FormStep>,
}

impl<T: FormTransport> DebtCalculatorClient<T> {
    pub fn new(transport: T, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            view_state: None,
            history: Vec::new(),
        }
    }

    /// Steps submitted so far, in order.
    pub fn history(&self) -> &[FormStep] {
        &self.history
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Post one step with the current token and rotate the token.
    pub async fn submit(&mut self, form: FormStep) -> Result<String> {
        let token = self
            .view_state
            .as_deref()
            .ok_or_else(|| Error::MissingViewState("session start".into()))?;
        let params = form.to_params(token);
        info!(step = %form.step, "submitting");
        let body = self.transport.post(&self.url, &params).await?;
        let next = view_state(&body).ok_or_else(|| Error::MissingViewState(form.step.to_string()))?;
        debug!(step = %form.step, token_len = next.len(), "view state rotated");
        self.view_state = Some(next);
        self.history.push(form);
        Ok(body)
    }

    /// How many debts do you want to include in your plan?
    ///
    /// Loads the page first to obtain the session's initial token.
    pub async fn declare_number_of_debts(&mut self, debts: usize) -> Result<()> {
        let body = self.transport.get(&self.url).await?;
        let token = view_state(&body).ok_or_else(|| Error::MissingViewState("page load".into()))?;
        self.view_state = Some(token);
        self.submit(FormStep::new(Step::DebtCount).field("debts", debts))
            .await?;
        Ok(())
    }

    pub async fn post_lender_name_and_loan_type(&mut self, loan: &Loan) -> Result<()> {
        self.submit(
            FormStep::new(Step::LenderAndType)
                .field("lenderNameLT", &loan.lender_name)
                .field("AnswerLT", loan.loan_type.code()),
        )
        .await?;
        Ok(())
    }

    pub async fn enter_loan_balance(&mut self, loan: &Loan) -> Result<()> {
        self.submit(
            FormStep::new(Step::Balance)
                .field("lenderNameLB", &loan.lender_name)
                .field("loanBalanceLB", &loan.balance),
        )
        .await?;
        Ok(())
    }

    pub async fn enter_loan_details(&mut self, loan: &Loan) -> Result<()> {
        self.submit(
            FormStep::new(Step::LoanDetails)
                .field("currMonthlyPaymentOL", &loan.min_monthly_payment)
                .field("interestRateOL", &loan.interest_rate)
                .field("selectedOL", u8::from(loan.deductible)),
        )
        .await?;
        Ok(())
    }

    /// Will the interest rate or payment amount change in the future on this loan?
    pub async fn is_change_loan_details(&mut self, change: &str) -> Result<()> {
        self.submit(
            FormStep::new(Step::ChangeQuestion)
                .field("selectedICONIF", change)
                .field("SubmitICONIF", "Submit"),
        )
        .await?;
        Ok(())
    }

    pub async fn select_promo_type(&mut self, promo_type: PromoType) -> Result<()> {
        self.submit(
            FormStep::new(Step::PromoType)
                .field("AnswerPT", promo_type.code())
                .field("SubmitPT", "Submit"),
        )
        .await?;
        Ok(())
    }

    pub async fn post_promo_details(&mut self, promo: &Promotion) -> Result<()> {
        self.submit(
            FormStep::new(Step::PromoDetails)
                .field("introInterestLIIR", &promo.promo_rate)
                .field("currMinPaymentLIIR", &promo.minimum_monthly_payment)
                .field("introEndsLIIR", format_date(promo.end_date))
                .field("normalInterestLIIR", &promo.regular_rate),
        )
        .await?;
        Ok(())
    }

    pub async fn add_interest_rate_and_payments(&mut self, loan: &Loan) -> Result<()> {
        self.submit(
            FormStep::new(Step::InterestAndPayment)
                .field("interestRateNSP", &loan.interest_rate)
                .field("minMonthlyPaymentNSP", &loan.min_monthly_payment),
        )
        .await?;
        Ok(())
    }

    /// One loan: name and type, balance, then the card or generic branch.
    pub async fn add_loan(&mut self, loan: &Loan) -> Result<()> {
        info!(lender = %loan.lender_name, loan_type = ?loan.loan_type, "adding loan");
        self.post_lender_name_and_loan_type(loan).await?;
        self.enter_loan_balance(loan).await?;
        match loan.loan_type {
            LoanType::CreditCard => self.add_credit_card(loan).await,
            LoanType::Vehicle | LoanType::HomeEquity | LoanType::Mortgage | LoanType::Other => {
                self.enter_loan_details(loan).await?;
                self.is_change_loan_details(NO_CHANGE).await
            }
        }
    }

    /// Promotion sub-flow when the card has one, plain rate and payment otherwise.
    pub async fn add_credit_card(&mut self, loan: &Loan) -> Result<()> {
        match loan.promo_details() {
            Some(promo) => {
                self.select_promo_type(promo.promo_type).await?;
                self.post_promo_details(promo).await
            }
            None => {
                self.select_promo_type(PromoType::NoPromotion).await?;
                self.add_interest_rate_and_payments(loan).await
            }
        }
    }

    /// Leave the loan questions for the budget, raises and windfall section.
    pub async fn continue_to_saving_options(&mut self) -> Result<()> {
        self.submit(FormStep::new(Step::SavingsContinue).field("SubmitGIAL", "Continue"))
            .await?;
        Ok(())
    }

    pub async fn budget_savings(&mut self, amount: &str) -> Result<()> {
        self.submit(FormStep::new(Step::BudgetSavings).field("additionPayAMC", amount))
            .await?;
        Ok(())
    }

    pub async fn forecasted_raises(&mut self, raises: u32) -> Result<()> {
        self.submit(FormStep::new(Step::Raises).field("numberOfRaisesNOR", raises))
            .await?;
        Ok(())
    }

    /// Raise details are not replayed yet.
    pub async fn add_raises(&mut self) -> Result<()> {
        Err(Error::NotSupported("entering income raise details".into()))
    }

    /// Windfall count, then the windfall entries when there are any.
    pub async fn forecasted_windfalls(&mut self, windfalls: &[Windfall]) -> Result<()> {
        self.submit(FormStep::new(Step::WindfallCount).field("windFallNOW", windfalls.len()))
            .await?;
        if !windfalls.is_empty() {
            self.add_windfalls(windfalls).await?;
        }
        Ok(())
    }

    /// All windfalls in one post as numbered amount/date pairs, starting at 1.
    pub async fn add_windfalls(&mut self, windfalls: &[Windfall]) -> Result<()> {
        let mut form = FormStep::new(Step::Windfalls).field("SubmitWI", "Submit");
        for (n, windfall) in windfalls.iter().enumerate().map(|(i, w)| (i + 1, w)) {
            form = form
                .field(format!("SalAmountWI{n}"), &windfall.amount)
                .field(format!("SalDateWI{n}"), format_date(windfall.date));
        }
        self.submit(form).await?;
        Ok(())
    }

    pub async fn select_tax_bracket(&mut self, bracket: &str) -> Result<()> {
        let code = tax_bracket_code(bracket)?;
        self.submit(
            FormStep::new(Step::TaxBracket)
                .field("AnswerSTB", code)
                .field("SubmitSTB", "Submit"),
        )
        .await?;
        Ok(())
    }

    /// Ask for the plan and return its `div.calculator` fragment.
    pub async fn generate_plan(&mut self) -> Result<String> {
        let body = self
            .submit(FormStep::new(Step::GeneratePlan).field("SubmitNOMTP", "Get Plan"))
            .await?;
        results_fragment(&body)
            .ok_or_else(|| Error::ElementNotFound(format!("{RESULTS_SELECTOR} in plan page")))
    }
}
