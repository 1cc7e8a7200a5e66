use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoaError;
use crate::models::{
    AccountDraft, AccountNode, AccountPatch, CompanyId, DateRange, ExportBlob, ImportSummary,
    ImportUpload, LedgerEntry,
};

/// The chart-of-accounts REST boundary. The directory owns the data and
/// computes all aggregates; callers always re-pull the full tree after a
/// mutation instead of splicing locally.
#[async_trait]
pub trait CoaDirectory: Send + Sync {
    /// Ordered root accounts with nested children, balances aggregated.
    async fn fetch_tree(&self, company: CompanyId) -> Result<Vec<AccountNode>, CoaError>;

    async fn create_account(
        &self,
        company: CompanyId,
        draft: AccountDraft,
    ) -> Result<Uuid, CoaError>;

    async fn update_account(
        &self,
        company: CompanyId,
        id: Uuid,
        patch: AccountPatch,
    ) -> Result<(), CoaError>;

    /// Rejected with [`CoaError::Conflict`] while the account still has
    /// sub-accounts or journal postings.
    async fn delete_account(&self, company: CompanyId, id: Uuid) -> Result<(), CoaError>;

    async fn export_tree(&self, company: CompanyId) -> Result<ExportBlob, CoaError>;

    async fn import_tree(
        &self,
        company: CompanyId,
        upload: ImportUpload,
    ) -> Result<ImportSummary, CoaError>;

    /// Ledger entries for one postable account, for the account detail view.
    async fn account_transactions(
        &self,
        company: CompanyId,
        id: Uuid,
        range: DateRange,
    ) -> Result<Vec<LedgerEntry>, CoaError>;
}
