//! The closed set of entity types exposed by the accounting API, with the
//! per-entity metadata the generic operations need.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub mod crud;

pub use crud::{DeleteTarget, UpdateMode};

/// An operation a caller may attempt against an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Void,
    Pdf,
    Send,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::Void => "void",
            Self::Pdf => "pdf",
            Self::Send => "send",
        })
    }
}

use Operation as Op;

const NAME_LIST: &[Operation] = &[Op::Create, Op::Read, Op::Update, Op::Query];
const TRANSACTION: &[Operation] = &[Op::Create, Op::Read, Op::Update, Op::Delete, Op::Query];
const READ_ONLY: &[Operation] = &[Op::Read, Op::Query];
const SETTINGS: &[Operation] = &[Op::Read, Op::Update, Op::Query];
const SALES_DOCUMENT: &[Operation] = &[
    Op::Create,
    Op::Read,
    Op::Update,
    Op::Delete,
    Op::Query,
    Op::Pdf,
    Op::Send,
];
const VOIDABLE_SALES_DOCUMENT: &[Operation] = &[
    Op::Create,
    Op::Read,
    Op::Update,
    Op::Delete,
    Op::Query,
    Op::Void,
    Op::Pdf,
    Op::Send,
];
const VOIDABLE_PAYMENT: &[Operation] = &[
    Op::Create,
    Op::Read,
    Op::Update,
    Op::Delete,
    Op::Query,
    Op::Void,
];

/// A named accounting record type.
///
/// Serializes as its canonical name, which is also the key the API wraps
/// single records in (`{"Invoice": {...}}`) and lists query results under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Account,
    Attachable,
    Bill,
    BillPayment,
    Budget,
    Class,
    CompanyCurrency,
    CompanyInfo,
    CreditCardPayment,
    CreditMemo,
    Customer,
    CustomerType,
    Department,
    Deposit,
    Employee,
    Estimate,
    ExchangeRate,
    Invoice,
    Item,
    JournalCode,
    JournalEntry,
    Payment,
    PaymentMethod,
    Preferences,
    Purchase,
    PurchaseOrder,
    RecurringTransaction,
    RefundReceipt,
    ReimburseCharge,
    SalesReceipt,
    TaxAgency,
    TaxCode,
    TaxRate,
    Term,
    TimeActivity,
    Transfer,
    Vendor,
    VendorCredit,
}

impl Entity {
    pub const ALL: &'static [Self] = &[
        Self::Account,
        Self::Attachable,
        Self::Bill,
        Self::BillPayment,
        Self::Budget,
        Self::Class,
        Self::CompanyCurrency,
        Self::CompanyInfo,
        Self::CreditCardPayment,
        Self::CreditMemo,
        Self::Customer,
        Self::CustomerType,
        Self::Department,
        Self::Deposit,
        Self::Employee,
        Self::Estimate,
        Self::ExchangeRate,
        Self::Invoice,
        Self::Item,
        Self::JournalCode,
        Self::JournalEntry,
        Self::Payment,
        Self::PaymentMethod,
        Self::Preferences,
        Self::Purchase,
        Self::PurchaseOrder,
        Self::RecurringTransaction,
        Self::RefundReceipt,
        Self::ReimburseCharge,
        Self::SalesReceipt,
        Self::TaxAgency,
        Self::TaxCode,
        Self::TaxRate,
        Self::Term,
        Self::TimeActivity,
        Self::Transfer,
        Self::Vendor,
        Self::VendorCredit,
    ];

    /// The canonical upper-camel-case name, e.g. `JournalEntry`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::Attachable => "Attachable",
            Self::Bill => "Bill",
            Self::BillPayment => "BillPayment",
            Self::Budget => "Budget",
            Self::Class => "Class",
            Self::CompanyCurrency => "CompanyCurrency",
            Self::CompanyInfo => "CompanyInfo",
            Self::CreditCardPayment => "CreditCardPayment",
            Self::CreditMemo => "CreditMemo",
            Self::Customer => "Customer",
            Self::CustomerType => "CustomerType",
            Self::Department => "Department",
            Self::Deposit => "Deposit",
            Self::Employee => "Employee",
            Self::Estimate => "Estimate",
            Self::ExchangeRate => "ExchangeRate",
            Self::Invoice => "Invoice",
            Self::Item => "Item",
            Self::JournalCode => "JournalCode",
            Self::JournalEntry => "JournalEntry",
            Self::Payment => "Payment",
            Self::PaymentMethod => "PaymentMethod",
            Self::Preferences => "Preferences",
            Self::Purchase => "Purchase",
            Self::PurchaseOrder => "PurchaseOrder",
            Self::RecurringTransaction => "RecurringTransaction",
            Self::RefundReceipt => "RefundReceipt",
            Self::ReimburseCharge => "ReimburseCharge",
            Self::SalesReceipt => "SalesReceipt",
            Self::TaxAgency => "TaxAgency",
            Self::TaxCode => "TaxCode",
            Self::TaxRate => "TaxRate",
            Self::Term => "Term",
            Self::TimeActivity => "TimeActivity",
            Self::Transfer => "Transfer",
            Self::Vendor => "Vendor",
            Self::VendorCredit => "VendorCredit",
        }
    }

    /// Plural display name, e.g. `JournalEntries`.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Account => "Accounts",
            Self::Attachable => "Attachables",
            Self::Bill => "Bills",
            Self::BillPayment => "BillPayments",
            Self::Budget => "Budgets",
            Self::Class => "Classes",
            Self::CompanyCurrency => "CompanyCurrencies",
            Self::CompanyInfo => "CompanyInfo",
            Self::CreditCardPayment => "CreditCardPayments",
            Self::CreditMemo => "CreditMemos",
            Self::Customer => "Customers",
            Self::CustomerType => "CustomerTypes",
            Self::Department => "Departments",
            Self::Deposit => "Deposits",
            Self::Employee => "Employees",
            Self::Estimate => "Estimates",
            Self::ExchangeRate => "ExchangeRates",
            Self::Invoice => "Invoices",
            Self::Item => "Items",
            Self::JournalCode => "JournalCodes",
            Self::JournalEntry => "JournalEntries",
            Self::Payment => "Payments",
            Self::PaymentMethod => "PaymentMethods",
            Self::Preferences => "Preferences",
            Self::Purchase => "Purchases",
            Self::PurchaseOrder => "PurchaseOrders",
            Self::RecurringTransaction => "RecurringTransactions",
            Self::RefundReceipt => "RefundReceipts",
            Self::ReimburseCharge => "ReimburseCharges",
            Self::SalesReceipt => "SalesReceipts",
            Self::TaxAgency => "TaxAgencies",
            Self::TaxCode => "TaxCodes",
            Self::TaxRate => "TaxRates",
            Self::Term => "Terms",
            Self::TimeActivity => "TimeActivities",
            Self::Transfer => "Transfers",
            Self::Vendor => "Vendors",
            Self::VendorCredit => "VendorCredits",
        }
    }

    /// The lower-cased path segment used in resource URLs, e.g. `journalentry`.
    #[must_use]
    pub fn path_segment(self) -> String {
        self.name().to_ascii_lowercase()
    }

    /// Whether updates must carry `Id` and `SyncToken`. Exchange rates are
    /// keyed by currency and date instead.
    #[must_use]
    pub const fn requires_sync_token(self) -> bool {
        !matches!(self, Self::ExchangeRate)
    }

    #[must_use]
    pub const fn operations(self) -> &'static [Operation] {
        match self {
            Self::Account
            | Self::Class
            | Self::Customer
            | Self::Department
            | Self::Employee
            | Self::Item
            | Self::PaymentMethod
            | Self::Term
            | Self::Vendor
            | Self::Budget
            | Self::CompanyCurrency => NAME_LIST,
            Self::TaxAgency => &[Op::Create, Op::Read, Op::Query],
            Self::CompanyInfo | Self::Preferences | Self::ExchangeRate => SETTINGS,
            Self::CustomerType | Self::ReimburseCharge | Self::TaxCode | Self::TaxRate => {
                READ_ONLY
            }
            Self::Attachable
            | Self::Bill
            | Self::CreditCardPayment
            | Self::Deposit
            | Self::JournalCode
            | Self::JournalEntry
            | Self::Purchase
            | Self::RecurringTransaction
            | Self::TimeActivity
            | Self::Transfer
            | Self::VendorCredit => TRANSACTION,
            Self::CreditMemo | Self::Estimate | Self::PurchaseOrder | Self::RefundReceipt => {
                SALES_DOCUMENT
            }
            Self::Invoice | Self::SalesReceipt => VOIDABLE_SALES_DOCUMENT,
            Self::Payment | Self::BillPayment => VOIDABLE_PAYMENT,
        }
    }

    #[must_use]
    pub fn supports(self, operation: Operation) -> bool {
        self.operations().contains(&operation)
    }

    /// Fails with a precondition error when `operation` is not available.
    pub(crate) fn ensure(self, operation: Operation) -> crate::error::Result<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(Error::unsupported(self, operation))
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Entity {
    type Err = Error;

    /// Accepts the canonical, lower-cased or plural name in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|entity| {
                entity.name().eq_ignore_ascii_case(s) || entity.plural().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| Error::UnknownEntity {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_lower_cased_names() {
        assert_eq!(Entity::JournalEntry.path_segment(), "journalentry");
        assert_eq!(Entity::ExchangeRate.path_segment(), "exchangerate");
        assert_eq!(Entity::Invoice.path_segment(), "invoice");
    }

    #[test]
    fn only_exchange_rate_skips_sync_token() {
        let exempt: Vec<_> = Entity::ALL
            .iter()
            .filter(|e| !e.requires_sync_token())
            .collect();
        assert_eq!(exempt, vec![&Entity::ExchangeRate]);
    }

    #[test]
    fn void_is_limited_to_invoices_receipts_and_payments() {
        let voidable: Vec<_> = Entity::ALL
            .iter()
            .copied()
            .filter(|e| e.supports(Operation::Void))
            .collect();
        assert_eq!(
            voidable,
            vec![
                Entity::BillPayment,
                Entity::Invoice,
                Entity::Payment,
                Entity::SalesReceipt
            ]
        );
    }

    #[test]
    fn every_entity_is_queryable() {
        assert!(Entity::ALL.iter().all(|e| e.supports(Operation::Query)));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("invoice".parse::<Entity>().unwrap(), Entity::Invoice);
        assert_eq!("JournalEntries".parse::<Entity>().unwrap(), Entity::JournalEntry);
        assert_eq!("TAXRATE".parse::<Entity>().unwrap(), Entity::TaxRate);
        assert!(matches!(
            "Widget".parse::<Entity>(),
            Err(Error::UnknownEntity { .. })
        ));
    }

    #[test]
    fn serializes_as_canonical_name() {
        assert_eq!(
            serde_json::to_value(Entity::CreditMemo).unwrap(),
            serde_json::json!("CreditMemo")
        );
    }
}
