use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoaError;

/// Tenant boundary. Every directory call names the company explicitly;
/// there is no ambient "current company" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl NormalBalance {
    /// Balance of a (debit total, credit total) pair seen from this side.
    pub fn signed(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

impl AccountType {
    pub fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = CoaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Ok(Self::Asset),
            "LIABILITY" => Ok(Self::Liability),
            "EQUITY" => Ok(Self::Equity),
            "REVENUE" => Ok(Self::Revenue),
            "EXPENSE" => Ok(Self::Expense),
            other => Err(CoaError::validation(format!(
                "unsupported account type: {other}"
            ))),
        }
    }
}

/// One node of the chart-of-accounts tree as returned by the directory.
/// `children` is ordered by code; `balance` is the server-side aggregate
/// (headers carry the sum of their subtree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountNode {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_header: bool,
    pub balance: Decimal,
    pub parent_id: Option<Uuid>,
    pub children: Vec<AccountNode>,
}

impl AccountNode {
    /// Case-insensitive substring match on code or name.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.code.to_lowercase().contains(needle)
    }
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_header: bool,
    pub parent_id: Option<Uuid>,
}

/// Partial update. `parent` distinguishes "leave unchanged" (`None`) from
/// "detach to root" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub is_header: Option<bool>,
    pub parent: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub entry_date: NaiveDate,
    pub memo: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Spreadsheet export, opaque to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBlob {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Spreadsheet upload, opaque to the client (the multipart `file` field).
#[derive(Debug, Clone, PartialEq)]
pub struct ImportUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub message: String,
    pub created: usize,
    pub updated: usize,
}
