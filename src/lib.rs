pub mod browser;
pub mod calculator;
pub mod client;
pub mod config;
pub mod driver;
pub mod element;
pub mod error;
pub mod page;
pub mod plan;
pub mod replay;

pub use browser::ChromeSession;
pub use calculator::Calculator;
pub use client::{CalculatorSession, PlanRunner};
pub use config::{BrowserBuilder, BrowserConfig, ReplayConfig};
pub use driver::{BrowserActions, Driver, Locator};
pub use error::{Error, Result};
pub use page::ChromePage;
pub use plan::{Loan, LoanType, Loans, PlanConfig, PromoType, Promotion, UserProfile, Windfall};
pub use replay::{DebtCalculatorClient, FormTransport, HttpTransport, Step};
