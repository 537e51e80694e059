//! Financial reports, fetched from `/reports/<name>` as raw JSON documents.

use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde_json::Value;
use time::Date;

use crate::client::{Client, RequestOptions};
use crate::endpoints::Endpoint;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::utils::date_format::format_date;

macro_rules! reports {
    ($($variant:ident),* $(,)?) => {
        /// A named report.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Report {
            $($variant,)*
        }

        impl Report {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// The name used in the report's path, e.g. `ProfitAndLoss`.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

reports! {
    AccountList,
    AgedPayableDetail,
    AgedPayables,
    AgedReceivableDetail,
    AgedReceivables,
    BalanceSheet,
    CashFlow,
    ClassSales,
    CustomerBalance,
    CustomerBalanceDetail,
    CustomerIncome,
    CustomerSales,
    DepartmentSales,
    GeneralLedger,
    InventoryValuationSummary,
    ItemSales,
    JournalReport,
    ProfitAndLoss,
    ProfitAndLossDetail,
    SalesByProduct,
    TaxSummary,
    TransactionList,
    TrialBalance,
    VendorBalance,
    VendorBalanceDetail,
    VendorExpenses,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Report {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|report| report.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid_query(format!("unknown report `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingMethod {
    Cash,
    Accrual,
}

impl AccountingMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Accrual => "Accrual",
        }
    }
}

/// Parameters shared by most reports. Unset fields are left off the request;
/// anything not modelled here can go through [`ReportParameters::with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportParameters {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    /// A relative range such as `This Fiscal Year-to-date`.
    pub date_macro: Option<String>,
    pub accounting_method: Option<AccountingMethod>,
    /// Column grouping, e.g. `Month` or `Customers`.
    pub summarize_column_by: Option<String>,
    pub customer: Option<String>,
    pub vendor: Option<String>,
    pub item: Option<String>,
    pub department: Option<String>,
    pub class: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl ReportParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn date_range(mut self, start_date: Date, end_date: Date) -> Self {
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn date_macro(mut self, date_macro: impl Into<String>) -> Self {
        self.date_macro = Some(date_macro.into());
        self
    }

    #[must_use]
    pub fn accounting_method(mut self, method: AccountingMethod) -> Self {
        self.accounting_method = Some(method);
        self
    }

    #[must_use]
    pub fn summarize_column_by(mut self, column: impl Into<String>) -> Self {
        self.summarize_column_by = Some(column.into());
        self
    }

    #[must_use]
    pub fn customer(mut self, id: impl Into<String>) -> Self {
        self.customer = Some(id.into());
        self
    }

    #[must_use]
    pub fn vendor(mut self, id: impl Into<String>) -> Self {
        self.vendor = Some(id.into());
        self
    }

    #[must_use]
    pub fn item(mut self, id: impl Into<String>) -> Self {
        self.item = Some(id.into());
        self
    }

    #[must_use]
    pub fn department(mut self, id: impl Into<String>) -> Self {
        self.department = Some(id.into());
        self
    }

    #[must_use]
    pub fn class(mut self, id: impl Into<String>) -> Self {
        self.class = Some(id.into());
        self
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Query parameters in a stable order, dates as `YYYY-MM-DD`.
    pub fn to_query(&self) -> Result<Vec<(String, String)>> {
        let mut query = Vec::new();
        for (key, date) in [("start_date", self.start_date), ("end_date", self.end_date)] {
            if let Some(date) = date {
                let formatted = format_date(date)
                    .map_err(|e| Error::invalid_query(format!("cannot format {key}: {e}")))?;
                query.push((key.to_string(), formatted));
            }
        }

        let text = [
            ("date_macro", self.date_macro.as_deref()),
            (
                "accounting_method",
                self.accounting_method.map(AccountingMethod::as_str),
            ),
            ("summarize_column_by", self.summarize_column_by.as_deref()),
            ("customer", self.customer.as_deref()),
            ("vendor", self.vendor.as_deref()),
            ("item", self.item.as_deref()),
            ("department", self.department.as_deref()),
            ("class", self.class.as_deref()),
        ];
        query.extend(
            text.into_iter()
                .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.to_string()))),
        );
        query.extend(self.extra.iter().cloned());
        Ok(query)
    }
}

/// Runs `report` and returns the report document (`Header`, `Columns`,
/// `Rows`) as sent.
#[instrument(skip(client, parameters))]
pub async fn run<T: Transport>(
    client: &Client<T>,
    report: Report,
    parameters: &ReportParameters,
) -> Result<Value> {
    let options = parameters
        .to_query()?
        .into_iter()
        .fold(RequestOptions::default(), |options, (key, value)| {
            options.with_query(key, value)
        });
    client
        .dispatch(Method::GET, &Endpoint::Report(report), options)
        .await?
        .deserialize()
}
