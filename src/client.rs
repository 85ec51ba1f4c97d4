//! Drives a calculator session through a whole plan.
//!
//! Both integration paths implement [`CalculatorSession`]; [`PlanRunner`]
//! only orders the calls and dispatches each loan on its type.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, info_span, warn, Instrument};

use crate::browser::ChromeSession;
use crate::calculator::{self, Calculator};
use crate::config::{BrowserConfig, ReplayConfig};
use crate::driver::BrowserActions;
use crate::error::{Error, Result};
use crate::plan::{Loan, LoanType, PlanConfig, UserProfile, Windfall};
use crate::replay::{self, DebtCalculatorClient, FormTransport, HttpTransport};

/// One run of the calculator, fed step by step.
#[async_trait]
pub trait CalculatorSession: Send {
    /// Refuse a plan this session cannot enter in full, before any step.
    fn check_plan(&self, plan: &PlanConfig) -> Result<()>;

    async fn declare_debts(&mut self, count: usize) -> Result<()>;

    async fn add_credit_card(&mut self, index: usize, card: &Loan) -> Result<()>;

    /// Any loan type other than a credit card.
    async fn add_other_loan(&mut self, index: usize, loan: &Loan) -> Result<()>;

    /// Budget, raises, windfalls and tax bracket, then the plan's results HTML.
    async fn wrap_up(&mut self, user: &UserProfile, windfalls: &[Windfall]) -> Result<String>;
}

#[async_trait]
impl<T: FormTransport> CalculatorSession for DebtCalculatorClient<T> {
    fn check_plan(&self, plan: &PlanConfig) -> Result<()> {
        replay::tax_bracket_code(&plan.user.tax_bracket).map(|_| ())
    }

    async fn declare_debts(&mut self, count: usize) -> Result<()> {
        self.declare_number_of_debts(count).await
    }

    async fn add_credit_card(&mut self, _index: usize, card: &Loan) -> Result<()> {
        self.add_loan(card).await
    }

    async fn add_other_loan(&mut self, _index: usize, loan: &Loan) -> Result<()> {
        self.add_loan(loan).await
    }

    async fn wrap_up(&mut self, user: &UserProfile, windfalls: &[Windfall]) -> Result<String> {
        self.continue_to_saving_options().await?;
        self.budget_savings(&user.budget_savings).await?;
        self.forecasted_raises(user.raises).await?;
        if user.raises > 0 {
            self.add_raises().await?;
        }
        self.forecasted_windfalls(windfalls).await?;
        self.select_tax_bracket(&user.tax_bracket).await?;
        self.generate_plan().await
    }
}

#[async_trait]
impl<B: BrowserActions> CalculatorSession for Calculator<B> {
    fn check_plan(&self, plan: &PlanConfig) -> Result<()> {
        calculator::tax_bracket_label(&plan.user.tax_bracket)?;
        for loan in plan.loans.iter() {
            calculator::check_loan_type(loan?.loan_type)?;
        }
        Ok(())
    }

    async fn declare_debts(&mut self, count: usize) -> Result<()> {
        self.driver().dismiss_interstitial().await?;
        self.declare_number_of_debts(count).await
    }

    async fn add_credit_card(&mut self, index: usize, card: &Loan) -> Result<()> {
        self.driver().dismiss_interstitial().await?;
        Calculator::add_credit_card(self, index, card).await
    }

    async fn add_other_loan(&mut self, index: usize, loan: &Loan) -> Result<()> {
        self.driver().dismiss_interstitial().await?;
        self.add_loan(index, loan).await
    }

    async fn wrap_up(&mut self, user: &UserProfile, windfalls: &[Windfall]) -> Result<String> {
        if user.raises > 0 {
            return Err(Error::NotSupported("entering income raise details".into()));
        }
        self.driver().dismiss_interstitial().await?;
        self.declare_additional_income(windfalls.len()).await?;
        for (index, windfall) in windfalls.iter().enumerate() {
            self.add_windfall(index, windfall).await?;
        }
        self.declare_extra_payments(&user.budget_savings).await?;
        self.select_tax_bracket(&user.tax_bracket).await?;
        self.driver().dismiss_interstitial().await?;
        self.generate_plan().await
    }
}

/// Orders a plan's steps and saves the results page.
pub struct PlanRunner {
    output_dir: PathBuf,
}

impl PlanRunner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where the results of `plan_name` are written.
    pub fn plan_path(&self, plan_name: &str) -> PathBuf {
        self.output_dir.join(format!("{plan_name}.html"))
    }

    /// Feed `plan` through `session` and write the results HTML.
    pub async fn run<S>(
        &self,
        session: &mut S,
        plan: &PlanConfig,
        plan_name: &str,
    ) -> Result<PathBuf>
    where
        S: CalculatorSession + ?Sized,
    {
        self.drive(session, plan, plan_name)
            .instrument(info_span!("plan", name = plan_name))
            .await
    }

    async fn drive<S>(&self, session: &mut S, plan: &PlanConfig, plan_name: &str) -> Result<PathBuf>
    where
        S: CalculatorSession + ?Sized,
    {
        if plan.user.raises > 0 {
            return Err(Error::NotSupported(format!(
                "{} income raises; raise details cannot be entered yet",
                plan.user.raises
            )));
        }
        session.check_plan(plan)?;

        session.declare_debts(plan.loans.len()).await?;
        for (index, loan) in plan.loans.iter().enumerate() {
            let loan = loan?;
            match loan.loan_type {
                LoanType::CreditCard => session.add_credit_card(index, &loan).await?,
                LoanType::Vehicle | LoanType::HomeEquity | LoanType::Mortgage | LoanType::Other => {
                    session.add_other_loan(index, &loan).await?
                }
            }
        }
        let html = session.wrap_up(&plan.user, &plan.windfalls).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.plan_path(plan_name);
        tokio::fs::write(&path, html).await?;
        info!(path = %path.display(), "debt pay-down plan generated");
        Ok(path)
    }

    /// Generate a plan by replaying the calculator's postbacks over HTTP.
    pub async fn run_replay(
        &self,
        config: &ReplayConfig,
        plan: &PlanConfig,
        plan_name: &str,
    ) -> Result<PathBuf> {
        let transport = HttpTransport::new(config)?;
        let mut client = DebtCalculatorClient::new(transport, config.url.clone());
        self.run(&mut client, plan, plan_name).await
    }

    /// Generate a plan by driving the calculator in a freshly launched browser.
    pub async fn run_browser(
        &self,
        config: BrowserConfig,
        plan: &PlanConfig,
        plan_name: &str,
    ) -> Result<PathBuf> {
        let session = ChromeSession::launch(config).await?;
        let outcome = match session.open_calculator().await {
            Ok(driver) => {
                let mut calculator = Calculator::new(driver, session.config().max_decade_pages);
                self.run(&mut calculator, plan, plan_name).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = session.close().await {
            warn!(error = %e, "browser did not shut down cleanly");
        }
        outcome
    }
}
