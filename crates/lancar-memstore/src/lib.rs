//! In-memory chart-of-accounts directory. Reference implementation of the
//! rules the REST boundary enforces: unique codes per company, headers as
//! the only valid parents, sub-accounts inheriting their header's type,
//! delete blocked by children or postings, and balances aggregated
//! bottom-up from journal postings on the account's normal side.

mod seed;
mod sheet;

pub use seed::seed_demo_company;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use lancar_core::{
    AccountDraft, AccountNode, AccountPatch, AccountType, CoaDirectory, CoaError, CompanyId,
    DateRange, ExportBlob, ImportSummary, ImportUpload, LedgerEntry,
};

#[derive(Debug, Clone)]
pub(crate) struct StoredAccount {
    pub(crate) id: Uuid,
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) account_type: AccountType,
    pub(crate) is_header: bool,
    pub(crate) parent_id: Option<Uuid>,
}

#[derive(Debug, Default)]
pub(crate) struct CompanyBooks {
    pub(crate) company_name: String,
    pub(crate) accounts: HashMap<Uuid, StoredAccount>,
    pub(crate) postings: Vec<LedgerEntry>,
}

impl CompanyBooks {
    fn children_of(&self, parent: Option<Uuid>) -> Vec<&StoredAccount> {
        let mut children: Vec<&StoredAccount> = self
            .accounts
            .values()
            .filter(|account| account.parent_id == parent)
            .collect();
        children.sort_by(|a, b| a.code.cmp(&b.code));
        children
    }

    fn has_children(&self, id: Uuid) -> bool {
        self.accounts
            .values()
            .any(|account| account.parent_id == Some(id))
    }

    fn has_postings(&self, id: Uuid) -> bool {
        self.postings.iter().any(|entry| entry.account_id == id)
    }

    fn code_in_use(&self, code: &str, except: Option<Uuid>) -> bool {
        self.accounts
            .values()
            .any(|account| account.code == code && except != Some(account.id))
    }

    fn descendant_ids(&self, id: Uuid) -> HashSet<Uuid> {
        let mut out = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for account in self.accounts.values() {
                if account.parent_id == Some(current) && out.insert(account.id) {
                    stack.push(account.id);
                }
            }
        }
        out
    }

    fn posted_balance(&self, account: &StoredAccount) -> Decimal {
        let (debit, credit) = self
            .postings
            .iter()
            .filter(|entry| entry.account_id == account.id)
            .fold((Decimal::ZERO, Decimal::ZERO), |(debit, credit), entry| {
                (debit + entry.debit, credit + entry.credit)
            });
        account.account_type.normal_balance().signed(debit, credit)
    }

    pub(crate) fn build_tree(&self) -> Vec<AccountNode> {
        self.build_level(None)
    }

    fn build_level(&self, parent: Option<Uuid>) -> Vec<AccountNode> {
        self.children_of(parent)
            .into_iter()
            .map(|account| {
                let children = self.build_level(Some(account.id));
                let rolled_up: Decimal = children.iter().map(|child| child.balance).sum();
                AccountNode {
                    id: account.id,
                    code: account.code.clone(),
                    name: account.name.clone(),
                    account_type: account.account_type,
                    is_header: account.is_header,
                    balance: self.posted_balance(account) + rolled_up,
                    parent_id: account.parent_id,
                    children,
                }
            })
            .collect()
    }

    /// First invariant violation across the whole book, if any. Used to
    /// reject imports that would leave the tree in an illegal shape.
    pub(crate) fn verify(&self) -> Result<(), CoaError> {
        for account in self.accounts.values() {
            if let Some(parent_id) = account.parent_id {
                let parent = self.accounts.get(&parent_id).ok_or_else(|| {
                    CoaError::validation(format!(
                        "account {} references a missing parent",
                        account.code
                    ))
                })?;
                if !parent.is_header {
                    return Err(CoaError::validation(format!(
                        "account {} is nested under a postable account",
                        account.code
                    )));
                }
                if parent.account_type != account.account_type {
                    return Err(CoaError::validation(format!(
                        "account {} does not share its header's type",
                        account.code
                    )));
                }
            }
            if account.is_header && self.has_postings(account.id) {
                return Err(CoaError::validation(format!(
                    "header account {} has journal postings",
                    account.code
                )));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    companies: RwLock<HashMap<CompanyId, CompanyBooks>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_company(&self, name: &str) -> CompanyId {
        let company = CompanyId::new();
        let mut companies = self.companies.write().await;
        companies.insert(
            company,
            CompanyBooks {
                company_name: name.to_string(),
                ..CompanyBooks::default()
            },
        );
        company
    }

    /// Record one journal leg on a postable account. Not part of the
    /// directory boundary; used by the seed and by sibling services.
    pub async fn post_entry(
        &self,
        company: CompanyId,
        account_id: Uuid,
        entry_date: NaiveDate,
        memo: &str,
        debit: Decimal,
        credit: Decimal,
    ) -> Result<Uuid, CoaError> {
        if debit.is_sign_negative() || credit.is_sign_negative() {
            return Err(CoaError::validation("journal amounts cannot be negative"));
        }

        let mut companies = self.companies.write().await;
        let books = books_mut(&mut companies, company)?;
        let account = books
            .accounts
            .get(&account_id)
            .ok_or(CoaError::NotFound(account_id))?;
        if account.is_header {
            return Err(CoaError::validation(
                "journal entries can only be posted to postable accounts",
            ));
        }

        let id = Uuid::new_v4();
        books.postings.push(LedgerEntry {
            id,
            account_id,
            entry_date,
            memo: memo.to_string(),
            debit,
            credit,
        });
        Ok(id)
    }
}

fn books<'a>(
    companies: &'a HashMap<CompanyId, CompanyBooks>,
    company: CompanyId,
) -> Result<&'a CompanyBooks, CoaError> {
    companies
        .get(&company)
        .ok_or_else(|| CoaError::validation("unknown company"))
}

fn books_mut<'a>(
    companies: &'a mut HashMap<CompanyId, CompanyBooks>,
    company: CompanyId,
) -> Result<&'a mut CompanyBooks, CoaError> {
    companies
        .get_mut(&company)
        .ok_or_else(|| CoaError::validation("unknown company"))
}

fn validate_parent(
    books: &CompanyBooks,
    parent_id: Uuid,
    account_type: AccountType,
) -> Result<(), CoaError> {
    let parent = books
        .accounts
        .get(&parent_id)
        .ok_or_else(|| CoaError::validation("parent account not found"))?;
    if !parent.is_header {
        return Err(CoaError::validation("parent must be a header account"));
    }
    if parent.account_type != account_type {
        return Err(CoaError::validation(
            "a sub-account must share its header's type",
        ));
    }
    Ok(())
}

#[async_trait]
impl CoaDirectory for InMemoryDirectory {
    async fn fetch_tree(&self, company: CompanyId) -> Result<Vec<AccountNode>, CoaError> {
        let companies = self.companies.read().await;
        Ok(books(&companies, company)?.build_tree())
    }

    async fn create_account(
        &self,
        company: CompanyId,
        draft: AccountDraft,
    ) -> Result<Uuid, CoaError> {
        let code = draft.code.trim().to_string();
        let name = draft.name.trim().to_string();
        if code.is_empty() {
            return Err(CoaError::field("kodeAkun", "account code is required"));
        }
        if name.is_empty() {
            return Err(CoaError::field("namaAkun", "account name is required"));
        }

        let mut companies = self.companies.write().await;
        let books = books_mut(&mut companies, company)?;
        if books.code_in_use(&code, None) {
            return Err(CoaError::field(
                "kodeAkun",
                format!("account code {code} is already in use"),
            ));
        }
        if let Some(parent_id) = draft.parent_id {
            validate_parent(books, parent_id, draft.account_type)?;
        }

        let id = Uuid::new_v4();
        books.accounts.insert(
            id,
            StoredAccount {
                id,
                code,
                name,
                account_type: draft.account_type,
                is_header: draft.is_header,
                parent_id: draft.parent_id,
            },
        );
        Ok(id)
    }

    async fn update_account(
        &self,
        company: CompanyId,
        id: Uuid,
        patch: AccountPatch,
    ) -> Result<(), CoaError> {
        let mut companies = self.companies.write().await;
        let books = books_mut(&mut companies, company)?;
        let current = books
            .accounts
            .get(&id)
            .cloned()
            .ok_or(CoaError::NotFound(id))?;

        let mut next = current.clone();
        if let Some(code) = patch.code {
            next.code = code.trim().to_string();
        }
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(account_type) = patch.account_type {
            next.account_type = account_type;
        }
        if let Some(is_header) = patch.is_header {
            next.is_header = is_header;
        }
        if let Some(parent) = patch.parent {
            next.parent_id = parent;
        }

        if next.code.is_empty() {
            return Err(CoaError::field("kodeAkun", "account code is required"));
        }
        if next.name.is_empty() {
            return Err(CoaError::field("namaAkun", "account name is required"));
        }
        if books.code_in_use(&next.code, Some(id)) {
            return Err(CoaError::field(
                "kodeAkun",
                format!("account code {} is already in use", next.code),
            ));
        }
        if !next.is_header && books.has_children(id) {
            return Err(CoaError::conflict("account still has sub-accounts"));
        }
        if next.is_header && books.has_postings(id) {
            return Err(CoaError::conflict("account has journal postings"));
        }
        if next.account_type != current.account_type && books.has_children(id) {
            return Err(CoaError::validation(
                "cannot change the type of an account that has sub-accounts",
            ));
        }
        if let Some(parent_id) = next.parent_id {
            if parent_id == id {
                return Err(CoaError::validation("an account cannot be its own parent"));
            }
            if books.descendant_ids(id).contains(&parent_id) {
                return Err(CoaError::validation(
                    "cannot move an account under its own sub-account",
                ));
            }
            validate_parent(books, parent_id, next.account_type)?;
        }

        books.accounts.insert(id, next);
        Ok(())
    }

    async fn delete_account(&self, company: CompanyId, id: Uuid) -> Result<(), CoaError> {
        let mut companies = self.companies.write().await;
        let books = books_mut(&mut companies, company)?;
        if !books.accounts.contains_key(&id) {
            return Err(CoaError::NotFound(id));
        }
        if books.has_children(id) {
            return Err(CoaError::conflict("account still has sub-accounts"));
        }
        if books.has_postings(id) {
            return Err(CoaError::conflict("account has journal postings"));
        }
        books.accounts.remove(&id);
        Ok(())
    }

    async fn export_tree(&self, company: CompanyId) -> Result<ExportBlob, CoaError> {
        let companies = self.companies.read().await;
        let books = books(&companies, company)?;
        Ok(sheet::export(books))
    }

    async fn import_tree(
        &self,
        company: CompanyId,
        upload: ImportUpload,
    ) -> Result<ImportSummary, CoaError> {
        let rows = sheet::parse(&upload.bytes)?;

        let mut companies = self.companies.write().await;
        let books = books_mut(&mut companies, company)?;
        sheet::apply(books, rows)
    }

    async fn account_transactions(
        &self,
        company: CompanyId,
        id: Uuid,
        range: DateRange,
    ) -> Result<Vec<LedgerEntry>, CoaError> {
        let companies = self.companies.read().await;
        let books = books(&companies, company)?;
        if !books.accounts.contains_key(&id) {
            return Err(CoaError::NotFound(id));
        }

        let mut entries: Vec<LedgerEntry> = books
            .postings
            .iter()
            .filter(|entry| entry.account_id == id && range.contains(entry.entry_date))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.entry_date);
        Ok(entries)
    }
}
