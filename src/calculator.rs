//! Page object for the calculator's interactive (JavaScript) form.
//!
//! Element ids, XPath expressions and option labels mirror the live page
//! markup; a markup change on the site breaks them.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use crate::driver::{BrowserActions, Driver, Locator};
use crate::error::{Error, Result};
use crate::plan::{Loan, LoanType, Promotion, PromoType, Windfall};

/// Tax bracket dropdown labels, keyed by the bracket percentage.
pub const TAX_BRACKETS: &[(&str, &str)] = &[
    ("10", "10% (Up to $9,325 single; up to $18,650 married)"),
    ("15", "15% ($9,326 to $37,950 single; $18,651 to $75,900 married)"),
    ("25", "25% ($37,951 to $91,900 single; $75,901 to $153,100 married)"),
    ("28", "28% ($91,901 to $191,650 single; $153,101 to $233,350 married)"),
    ("33", "33% ($191,651 to $416,700 single; $233,351 to $416,700 married)"),
    ("35", "35% ($416,701 to $418,400 single; $416,701 to $470,000 married)"),
    ("39.6", "39.6% ($418,401+ single; $470,001+ married)"),
];

pub fn tax_bracket_label(bracket: &str) -> Result<&'static str> {
    TAX_BRACKETS
        .iter()
        .find(|(key, _)| *key == bracket)
        .map(|(_, label)| *label)
        .ok_or_else(|| Error::UnknownTaxBracket(bracket.to_string()))
}

/// Additional income dropdown label for a one-time windfall.
pub const WINDFALL_INCOME: &str = "Windfall";

pub const DEBT_COUNT_INPUT: &str = "debtCount";
pub const EXTRA_PAYMENT_INPUT: &str = "extraPayment";
pub const ADDITIONAL_INCOME_INPUT: &str = "additionalIncomeCount";
/// The tax bracket dropdown is identified by its default selection.
pub const DEFAULT_TAX_BRACKET: &str = "10";
pub const CALCULATE_BUTTON: &str = r"div.grid-cell.size-1of3.\+center-content button";
pub const RESULTS_DIV: &str = "//h5[text()='Results']/..";
pub const CARD_PROMO_END_DATE: &str =
    "//label[text()='Intro rate ends:']/../div[@class='vdp-datepicker']";
pub const WINDFALL_DATE: &str = "//label[text()='Date:']/../div[@class='vdp-datepicker']";

pub const PICKER_UP: &str = "span.up";
pub const PICKER_PREV: &str = "div.vdp-datepicker__calendar header span.prev";
pub const PICKER_NEXT: &str = "div.vdp-datepicker__calendar header span.next";
pub const PICKER_HEADING: &str = "div.vdp-datepicker__calendar header span:nth-child(2)";

fn indexed_id(prefix: &str, index: usize) -> Locator {
    Locator::id(format!("{prefix}{index}"))
}

fn option_text(text: &str) -> Locator {
    Locator::xpath(format!("//span[text()='{text}']"))
}

/// The `nth` (0-based) match of an XPath expression.
fn nth_match(xpath: &str, nth: usize) -> Locator {
    Locator::xpath(format!("({xpath})[{}]", nth + 1))
}

/// The calculator form, driven field by field.
pub struct Calculator<B> {
    driver: Driver<B>,
    max_decade_pages: u32,
    promo_pickers: usize,
}

impl<B: BrowserActions> Calculator<B> {
    pub fn new(driver: Driver<B>, max_decade_pages: u32) -> Self {
        Self {
            driver,
            max_decade_pages,
            promo_pickers: 0,
        }
    }

    pub fn driver(&self) -> &Driver<B> {
        &self.driver
    }

    pub async fn open(&self, url: &str) -> Result<()> {
        self.driver.open(url).await
    }

    /// How many debts do you want to include in your plan?
    pub async fn declare_number_of_debts(&self, debts: usize) -> Result<()> {
        self.driver
            .type_verified(&Locator::id(DEBT_COUNT_INPUT), &debts.to_string())
            .await
    }

    /// Do you expect any additional income that you can apply to your payments?
    pub async fn declare_additional_income(&self, number: usize) -> Result<()> {
        self.driver
            .type_verified(&Locator::id(ADDITIONAL_INCOME_INPUT), &number.to_string())
            .await
    }

    /// Monthly amount cut from the budget and put towards the debts.
    pub async fn declare_extra_payments(&self, amount: &str) -> Result<()> {
        self.driver
            .type_verified(&Locator::id(EXTRA_PAYMENT_INPUT), amount)
            .await
    }

    pub async fn select_tax_bracket(&self, bracket: &str) -> Result<()> {
        let label = tax_bracket_label(bracket)?;
        self.driver.click(&Locator::id(DEFAULT_TAX_BRACKET)).await?;
        self.driver.click_when_visible(&option_text(label)).await
    }

    pub async fn select_loan_type(&self, index: usize, loan_type: LoanType) -> Result<()> {
        self.driver.click(&indexed_id("loanType", index)).await?;
        self.driver
            .click_when_visible(&option_text(loan_type.label()))
            .await
    }

    pub async fn select_additional_income_type(&self, index: usize, label: &str) -> Result<()> {
        self.driver.click(&indexed_id("incomeTypeIncome", index)).await?;
        self.driver.click_when_visible(&option_text(label)).await
    }

    /// Credit card or retailer charge card, with its promotion when it has one.
    pub async fn add_credit_card(&mut self, index: usize, card: &Loan) -> Result<()> {
        info!(index, lender = %card.lender_name, "adding credit card");
        self.select_loan_type(index, LoanType::CreditCard).await?;
        self.type_field("lenderNamecreditCardLoan", index, &card.lender_name).await?;
        self.type_field("amountcreditCardLoan", index, &card.balance).await?;
        self.type_field("interestRatecreditCardLoan", index, &card.interest_rate).await?;
        self.type_field("monthlyPaymentcreditCardLoan", index, &card.min_monthly_payment).await?;
        if let Some(promo) = card.promo_details() {
            self.add_credit_card_with_promo_rate(index, promo).await?;
        }
        Ok(())
    }

    pub async fn add_credit_card_with_promo_rate(
        &mut self,
        index: usize,
        promo: &Promotion,
    ) -> Result<()> {
        debug!(index, promo_type = ?promo.promo_type, "card promotion");
        let radio = nth_match(
            &format!("//input[@name='promotionTypecreditCardLoan{index}']/.."),
            promo_radio(promo.promo_type),
        );
        self.driver.click(&radio).await?;
        self.type_field("introductoryRatecreditCardLoan", index, &promo.promo_rate)
            .await?;
        let picker = nth_match(CARD_PROMO_END_DATE, self.promo_pickers);
        self.promo_pickers += 1;
        self.pick_date(&picker, promo.end_date).await
    }

    /// A loan of the "Other kind of loan" type. Vehicle, home equity and
    /// mortgage loans open sections whose field ids this page object does not
    /// know, so they are refused.
    pub async fn add_loan(&mut self, index: usize, loan: &Loan) -> Result<()> {
        check_loan_type(loan.loan_type)?;
        info!(index, lender = %loan.lender_name, "adding loan");
        self.select_loan_type(index, LoanType::Other).await?;
        self.type_field("lenderNameotherLoanLoan", index, &loan.lender_name).await?;
        self.type_field("amountotherLoanLoan", index, &loan.balance).await?;
        self.type_field("interestRateotherLoanLoan", index, &loan.interest_rate).await?;
        self.type_field("monthlyPaymentotherLoanLoan", index, &loan.min_monthly_payment).await?;
        if loan.deductible {
            let radio = Locator::xpath(format!(
                "//input[@name='taxDeductibleotherLoanLoan{index}'][@value='true']/.."
            ));
            self.driver.click(&radio).await?;
        }
        Ok(())
    }

    pub async fn add_windfall(&mut self, index: usize, windfall: &Windfall) -> Result<()> {
        info!(index, amount = %windfall.amount, "adding windfall");
        self.select_additional_income_type(index, WINDFALL_INCOME).await?;
        self.type_field("amountIncome", index, &windfall.amount).await?;
        self.pick_date(&nth_match(WINDFALL_DATE, index), windfall.date).await
    }

    pub async fn press_calculate(&self) -> Result<()> {
        self.driver.click(&Locator::css(CALCULATE_BUTTON)).await
    }

    /// Calculate and return the inner HTML of the Results region.
    pub async fn generate_plan(&self) -> Result<String> {
        self.press_calculate().await?;
        self.driver.inner_html(&Locator::xpath(RESULTS_DIV)).await
    }

    async fn type_field(&self, prefix: &str, index: usize, text: &str) -> Result<()> {
        self.driver.type_verified(&indexed_id(prefix, index), text).await
    }

    async fn pick_date(&self, picker: &Locator, date: NaiveDate) -> Result<()> {
        self.driver.click(picker).await?;
        DatePicker::new(&self.driver, self.max_decade_pages)
            .select(date)
            .await
    }
}

/// Loan types the page object can enter.
pub fn check_loan_type(loan_type: LoanType) -> Result<()> {
    match loan_type {
        LoanType::CreditCard | LoanType::Other => Ok(()),
        LoanType::Vehicle | LoanType::HomeEquity | LoanType::Mortgage => Err(Error::NotSupported(
            format!("entering {:?} loans in the browser", loan_type.label()),
        )),
    }
}

/// Position of the promotion radio button for each promotion type.
fn promo_radio(promo_type: PromoType) -> usize {
    promo_type.code() as usize
}

/// An open calendar popup: day view, up to months, up to decades.
pub struct DatePicker<'a, B> {
    driver: &'a Driver<B>,
    max_pages: u32,
}

impl<'a, B: BrowserActions> DatePicker<'a, B> {
    pub fn new(driver: &'a Driver<B>, max_pages: u32) -> Self {
        Self { driver, max_pages }
    }

    /// Assumes the picker was just opened on its default day view.
    pub async fn select(&self, date: NaiveDate) -> Result<()> {
        let up = Locator::css(PICKER_UP);
        self.driver.click_when_visible(&up).await?;
        self.driver.click_when_visible(&up).await?;
        self.page_to_decade(date.year()).await?;

        let year = Locator::xpath(format!(
            "//span[text()='{}'][contains(@class, 'cell year')]",
            date.year()
        ));
        let month = Locator::xpath(format!(
            "//span[text()='{}'][contains(@class, 'cell month')]",
            date.format("%B")
        ));
        let day = Locator::xpath(format!(
            "//span[text()='{}'][contains(@class, 'cell day')]",
            date.day()
        ));
        self.driver.click_when_visible(&year).await?;
        self.driver.click_when_visible(&month).await?;
        self.driver.click_when_visible(&day).await
    }

    async fn page_to_decade(&self, year: i32) -> Result<()> {
        let heading = Locator::css(PICKER_HEADING);
        for _ in 0..=self.max_pages {
            let label = self.driver.inner_html_visible(&heading).await?;
            let start = decade_start(&label).ok_or_else(|| {
                Error::ElementNotFound(format!("decade heading {label:?} has no year"))
            })?;
            let arrow = if year < start {
                PICKER_PREV
            } else if year > start + 9 {
                PICKER_NEXT
            } else {
                return Ok(());
            };
            debug!(year, start, arrow, "paging decades");
            self.driver.click_visible(&Locator::css(arrow)).await?;
        }
        Err(Error::Timeout(format!(
            "date picker did not reach year {year} within {} pages",
            self.max_pages
        )))
    }
}

/// First four-digit number in a decade heading such as `2020 - 2029`.
fn decade_start(label: &str) -> Option<i32> {
    let bytes = label.as_bytes();
    bytes
        .windows(4)
        .enumerate()
        .find(|(i, w)| {
            w.iter().all(u8::is_ascii_digit)
                && !bytes.get(i + 4).is_some_and(u8::is_ascii_digit)
                && (*i == 0 || !bytes[i - 1].is_ascii_digit())
        })
        .and_then(|(i, _)| label[i..i + 4].parse().ok())
}
