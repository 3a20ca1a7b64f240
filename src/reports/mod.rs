//! Aggregation/query layer
//!
//! Derived queries composed from the three aggregate views: monthly report,
//! spending breakdown and balances to date. All results are currency
//! segmented; nothing here ever sums across currencies.

pub mod balances;
pub mod monthly;
pub mod spending;

pub use balances::{account_balances, BalanceEntry};
pub use monthly::{
    generate_monthly_report, CategoryBreakdownEntry, CurrencySection, MonthlyReport,
    RunningBalanceEntry,
};
pub use spending::{generate_spending_report, SpendingEntry, SpendingReport};
