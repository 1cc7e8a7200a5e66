use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use lancar_core::{
    AccountDraft, AccountNode, AccountPatch, CoaDirectory, CoaError, CompanyId, ExportBlob,
    ImportSummary, ImportUpload, tree,
};

use crate::notice::Notice;
use crate::view::TreeView;

#[derive(Default)]
struct TreeState {
    roots: Vec<AccountNode>,
    loaded: bool,
    load_failed: bool,
    fetched_at: Option<DateTime<Utc>>,
    applied_seq: u64,
}

/// Client-side view of one company's chart of accounts.
///
/// The session owns the only snapshot of the tree and rebuilds it
/// wholesale from the directory: every successful mutation awaits a full
/// refetch before the call returns, so success notices always describe the
/// tree the user is about to see. Balances are directory-computed
/// aggregates and are never patched locally.
pub struct TreeSession {
    directory: Arc<dyn CoaDirectory>,
    company: CompanyId,
    fetch_seq: AtomicU64,
    state: RwLock<TreeState>,
    notices: Mutex<Vec<Notice>>,
}

impl TreeSession {
    pub fn new(directory: Arc<dyn CoaDirectory>, company: CompanyId) -> Self {
        Self {
            directory,
            company,
            fetch_seq: AtomicU64::new(0),
            state: RwLock::new(TreeState::default()),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn company(&self) -> CompanyId {
        self.company
    }

    /// Re-pull the whole tree. Each call takes a fresh sequence token and a
    /// response is installed only if no newer request was issued while it
    /// was in flight (last-request-wins, independent of arrival order). A
    /// failed fetch keeps the previous snapshot visible.
    pub async fn refresh(&self) -> Result<(), CoaError> {
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        match self.directory.fetch_tree(self.company).await {
            Ok(roots) => {
                if let Err(violation) = tree::verify_structure(&roots) {
                    warn!(%violation, "directory returned an inconsistent tree");
                }
                let mut state = self.state.write().await;
                if seq <= state.applied_seq {
                    debug!(seq, applied = state.applied_seq, "discarding superseded fetch");
                    return Ok(());
                }
                state.applied_seq = seq;
                state.roots = roots;
                state.loaded = true;
                state.load_failed = false;
                state.fetched_at = Some(Utc::now());
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state.write().await;
                    if !state.loaded {
                        state.load_failed = true;
                    }
                }
                self.push(Notice::from_error(&err)).await;
                Err(err)
            }
        }
    }

    pub async fn tree(&self) -> Vec<AccountNode> {
        self.state.read().await.roots.clone()
    }

    pub async fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.fetched_at
    }

    /// Classify what the tree pane should show for `query`: the (possibly
    /// filtered) accounts, a "nothing matched" state while a search is
    /// active, or the no-accounts-yet empty state.
    pub async fn view(&self, query: &str) -> TreeView {
        let state = self.state.read().await;
        if !state.loaded && state.load_failed {
            return TreeView::Unavailable;
        }

        let filtered = tree::filter_tree(&state.roots, query);
        if !filtered.is_empty() {
            TreeView::Accounts(filtered)
        } else if query.trim().is_empty() {
            TreeView::Empty
        } else {
            TreeView::NoMatches {
                query: query.trim().to_string(),
            }
        }
    }

    /// Search the snapshot, keeping ancestors of every match.
    pub async fn search(&self, query: &str) -> Vec<AccountNode> {
        let state = self.state.read().await;
        tree::filter_tree(&state.roots, query)
    }

    /// Every account in pre-order, for lookup tables.
    pub async fn flat_accounts(&self) -> Vec<AccountNode> {
        let state = self.state.read().await;
        tree::flatten_tree(&state.roots)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Header accounts offered as parents in pickers. When `editing` names
    /// an account, that account and its entire subtree are left out: an
    /// account can never be offered as its own parent, directly or through
    /// one of its descendants.
    pub async fn parent_options(&self, editing: Option<Uuid>) -> Vec<AccountNode> {
        let state = self.state.read().await;
        tree::parent_candidates(&state.roots, editing)
            .into_iter()
            .cloned()
            .collect()
    }

    /// On failure the draft borrow is untouched, so the caller's form keeps
    /// its entered values for correction.
    pub async fn create_account(&self, draft: &AccountDraft) -> Result<Uuid, CoaError> {
        self.submit_create(draft.clone()).await
    }

    /// Create a child under `parent_id`. The parent must be a header, and
    /// the submitted payload always carries the parent's account type — a
    /// sub-account cannot belong to a different top-level category than
    /// its header.
    pub async fn create_sub_account(
        &self,
        parent_id: Uuid,
        draft: &AccountDraft,
    ) -> Result<Uuid, CoaError> {
        let parent = {
            let state = self.state.read().await;
            tree::find_node(&state.roots, parent_id).cloned()
        };
        let Some(parent) = parent else {
            return Err(self.reject(CoaError::NotFound(parent_id)).await);
        };
        if !parent.is_header {
            return Err(self
                .reject(CoaError::validation(
                    "sub-accounts can only be added under a header account",
                ))
                .await);
        }

        let mut effective = draft.clone();
        effective.parent_id = Some(parent.id);
        effective.account_type = parent.account_type;
        self.submit_create(effective).await
    }

    pub async fn update_account(&self, id: Uuid, patch: &AccountPatch) -> Result<(), CoaError> {
        if patch.parent == Some(Some(id)) {
            return Err(self
                .reject(CoaError::validation("an account cannot be its own parent"))
                .await);
        }

        match self
            .directory
            .update_account(self.company, id, patch.clone())
            .await
        {
            Ok(()) => {
                self.refresh().await?;
                self.push(Notice::success("account updated")).await;
                Ok(())
            }
            Err(err) => Err(self.reject(err).await),
        }
    }

    /// Destructive and irreversible; callers confirm with the user before
    /// invoking. On a conflict the displayed tree is untouched and the
    /// directory's reason is surfaced verbatim.
    pub async fn delete_account(&self, id: Uuid) -> Result<(), CoaError> {
        match self.directory.delete_account(self.company, id).await {
            Ok(()) => {
                self.refresh().await?;
                self.push(Notice::success("account deleted")).await;
                Ok(())
            }
            Err(err) => Err(self.reject(err).await),
        }
    }

    /// Opaque spreadsheet download; the bytes are saved as-is.
    pub async fn export(&self) -> Result<ExportBlob, CoaError> {
        match self.directory.export_tree(self.company).await {
            Ok(blob) => Ok(blob),
            Err(err) => Err(self.reject(err).await),
        }
    }

    /// Opaque bulk upload; the directory parses and validates, the session
    /// only reloads afterwards and surfaces the summary.
    pub async fn import(&self, upload: ImportUpload) -> Result<ImportSummary, CoaError> {
        match self.directory.import_tree(self.company, upload).await {
            Ok(summary) => {
                self.refresh().await?;
                self.push(Notice::success(summary.message.clone())).await;
                Ok(summary)
            }
            Err(err) => Err(self.reject(err).await),
        }
    }

    /// Take all queued notifications, oldest first.
    pub async fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().await)
    }

    async fn submit_create(&self, draft: AccountDraft) -> Result<Uuid, CoaError> {
        let code = draft.code.clone();
        match self.directory.create_account(self.company, draft).await {
            Ok(id) => {
                self.refresh().await?;
                self.push(Notice::success(format!("account {code} created")))
                    .await;
                Ok(id)
            }
            Err(err) => Err(self.reject(err).await),
        }
    }

    async fn reject(&self, err: CoaError) -> CoaError {
        self.push(Notice::from_error(&err)).await;
        err
    }

    async fn push(&self, notice: Notice) {
        self.notices.lock().await.push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;
    use async_trait::async_trait;
    use lancar_core::{AccountType, DateRange, LedgerEntry};
    use lancar_memstore::InMemoryDirectory;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    fn draft(code: &str, name: &str, account_type: AccountType, is_header: bool) -> AccountDraft {
        AccountDraft {
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            is_header,
            parent_id: None,
        }
    }

    /// Directory wrapper for driving session behavior: records create
    /// payloads, can fail fetches, and can hold one fetch so a newer one
    /// overtakes it.
    struct TestDirectory {
        inner: InMemoryDirectory,
        created: StdMutex<Vec<AccountDraft>>,
        updates: StdMutex<Vec<(Uuid, AccountPatch)>>,
        fail_fetch: AtomicBool,
        hold_next_fetch: AtomicBool,
        fetch_entered: Notify,
        fetch_release: Notify,
    }

    impl TestDirectory {
        fn new() -> Self {
            Self {
                inner: InMemoryDirectory::new(),
                created: StdMutex::new(Vec::new()),
                updates: StdMutex::new(Vec::new()),
                fail_fetch: AtomicBool::new(false),
                hold_next_fetch: AtomicBool::new(false),
                fetch_entered: Notify::new(),
                fetch_release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl CoaDirectory for TestDirectory {
        async fn fetch_tree(&self, company: CompanyId) -> Result<Vec<AccountNode>, CoaError> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(CoaError::Network("connection reset".to_string()));
            }
            if self.hold_next_fetch.swap(false, Ordering::SeqCst) {
                // Capture the tree as of now, then park until released so a
                // newer fetch can come back first.
                let stale = self.inner.fetch_tree(company).await;
                self.fetch_entered.notify_one();
                self.fetch_release.notified().await;
                return stale;
            }
            self.inner.fetch_tree(company).await
        }

        async fn create_account(
            &self,
            company: CompanyId,
            draft: AccountDraft,
        ) -> Result<Uuid, CoaError> {
            self.created.lock().unwrap().push(draft.clone());
            self.inner.create_account(company, draft).await
        }

        async fn update_account(
            &self,
            company: CompanyId,
            id: Uuid,
            patch: AccountPatch,
        ) -> Result<(), CoaError> {
            self.updates.lock().unwrap().push((id, patch.clone()));
            self.inner.update_account(company, id, patch).await
        }

        async fn delete_account(&self, company: CompanyId, id: Uuid) -> Result<(), CoaError> {
            self.inner.delete_account(company, id).await
        }

        async fn export_tree(&self, company: CompanyId) -> Result<ExportBlob, CoaError> {
            self.inner.export_tree(company).await
        }

        async fn import_tree(
            &self,
            company: CompanyId,
            upload: ImportUpload,
        ) -> Result<ImportSummary, CoaError> {
            self.inner.import_tree(company, upload).await
        }

        async fn account_transactions(
            &self,
            company: CompanyId,
            id: Uuid,
            range: DateRange,
        ) -> Result<Vec<LedgerEntry>, CoaError> {
            self.inner.account_transactions(company, id, range).await
        }
    }

    async fn session_with_directory() -> (Arc<TestDirectory>, TreeSession) {
        let directory = Arc::new(TestDirectory::new());
        let company = directory.inner.register_company("PT Uji Coba").await;
        let session = TreeSession::new(directory.clone(), company);
        (directory, session)
    }

    #[tokio::test]
    async fn successful_create_refetches_before_returning() {
        let (_, session) = session_with_directory().await;
        session.refresh().await.unwrap();

        session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();

        // No manual refresh: the awaited refetch already installed the tree.
        let roots = session.tree().await;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].code, "1");

        let notices = session.drain_notices().await;
        assert_eq!(notices.last().unwrap(), &Notice::success("account 1 created"));
    }

    #[tokio::test]
    async fn failed_create_surfaces_message_and_leaves_draft_usable() {
        let (_, session) = session_with_directory().await;
        session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();

        let duplicate = draft("1", "Aset Lagi", AccountType::Asset, true);
        let err = session.create_account(&duplicate).await.unwrap_err();
        assert!(matches!(err, CoaError::Validation { .. }));

        // The borrow is untouched; the form can resubmit after corrections.
        assert_eq!(duplicate.name, "Aset Lagi");

        let notices = session.drain_notices().await;
        let last = notices.last().unwrap();
        assert_eq!(last.level, NoticeLevel::Error);
        assert!(last.message.contains("already in use"));
    }

    #[tokio::test]
    async fn sub_accounts_inherit_the_parents_type() {
        let (directory, session) = session_with_directory().await;
        let parent_id = session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();

        // The form claims EXPENSE; the submitted payload must say ASSET.
        session
            .create_sub_account(parent_id, &draft("1-1", "Kas", AccountType::Expense, false))
            .await
            .unwrap();

        let created = directory.created.lock().unwrap();
        let submitted = created.last().unwrap();
        assert_eq!(submitted.account_type, AccountType::Asset);
        assert_eq!(submitted.parent_id, Some(parent_id));
    }

    #[tokio::test]
    async fn sub_accounts_under_a_leaf_are_rejected() {
        let (directory, session) = session_with_directory().await;
        let leaf_id = session
            .create_account(&draft("1-1", "Kas", AccountType::Asset, false))
            .await
            .unwrap();

        let before = directory.created.lock().unwrap().len();
        let err = session
            .create_sub_account(leaf_id, &draft("1-1-1", "Kas Kecil", AccountType::Asset, false))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoaError::validation("sub-accounts can only be added under a header account")
        );
        // Rejected locally, nothing was submitted.
        assert_eq!(directory.created.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn parent_options_never_contain_the_edited_node() {
        let (_, session) = session_with_directory().await;
        let aset = session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();
        session
            .create_sub_account(aset, &draft("1-1", "Aset Lancar", AccountType::Asset, true))
            .await
            .unwrap();
        session
            .create_account(&draft("2", "Kewajiban", AccountType::Liability, true))
            .await
            .unwrap();

        let options = session.parent_options(Some(aset)).await;
        let codes: Vec<&str> = options.iter().map(|node| node.code.as_str()).collect();
        // Neither the edited header nor its sub-header is offered.
        assert_eq!(codes, vec!["2"]);
    }

    #[tokio::test]
    async fn self_parent_patches_are_rejected_without_a_round_trip() {
        let (directory, session) = session_with_directory().await;
        let aset = session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();

        let patch = AccountPatch {
            parent: Some(Some(aset)),
            ..AccountPatch::default()
        };
        let err = session.update_account(aset, &patch).await.unwrap_err();
        assert_eq!(err, CoaError::validation("an account cannot be its own parent"));
        assert!(directory.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_conflict_keeps_tree_and_surfaces_reason_verbatim() {
        let (_, session) = session_with_directory().await;
        let aset = session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();
        session
            .create_sub_account(aset, &draft("1-1", "Kas", AccountType::Asset, false))
            .await
            .unwrap();
        session.drain_notices().await;

        let err = session.delete_account(aset).await.unwrap_err();
        assert_eq!(err, CoaError::conflict("account still has sub-accounts"));

        let notices = session.drain_notices().await;
        assert_eq!(
            notices.last().unwrap(),
            &Notice::error("account still has sub-accounts")
        );

        // The displayed tree still shows the rejected node.
        let roots = session.tree().await;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 1);
    }

    #[tokio::test]
    async fn superseded_fetch_responses_are_discarded() {
        let (directory, session) = session_with_directory().await;
        session.refresh().await.unwrap();

        let session = Arc::new(session);
        directory.hold_next_fetch.store(true, Ordering::SeqCst);

        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.refresh().await })
        };
        directory.fetch_entered.notified().await;

        // While the first fetch is parked, a mutation lands and its awaited
        // refetch installs the newer tree.
        session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();

        directory.fetch_release.notify_one();
        slow.await.unwrap().unwrap();

        // The released stale response (an empty tree) must not have
        // overwritten the newer snapshot.
        let roots = session.tree().await;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].code, "1");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let (directory, session) = session_with_directory().await;
        session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();

        directory.fail_fetch.store(true, Ordering::SeqCst);
        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, CoaError::Network(_)));

        let roots = session.tree().await;
        assert_eq!(roots.len(), 1);
        assert!(!matches!(session.view("").await, TreeView::Unavailable));
    }

    #[tokio::test]
    async fn first_load_failure_is_unavailable_until_a_fetch_lands() {
        let (directory, session) = session_with_directory().await;
        directory.fail_fetch.store(true, Ordering::SeqCst);

        session.refresh().await.unwrap_err();
        assert_eq!(session.view("").await, TreeView::Unavailable);

        directory.fail_fetch.store(false, Ordering::SeqCst);
        session.refresh().await.unwrap();
        assert_eq!(session.view("").await, TreeView::Empty);
    }

    #[tokio::test]
    async fn view_distinguishes_no_accounts_from_no_matches() {
        let (_, session) = session_with_directory().await;
        session.refresh().await.unwrap();

        assert_eq!(session.view("").await, TreeView::Empty);
        assert_eq!(
            session.view("kas").await,
            TreeView::NoMatches {
                query: "kas".to_string()
            }
        );

        let aset = session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();
        session
            .create_sub_account(aset, &draft("1-1", "Kas", AccountType::Asset, false))
            .await
            .unwrap();

        match session.view("kas").await {
            TreeView::Accounts(roots) => {
                assert_eq!(roots[0].code, "1");
                assert_eq!(roots[0].children[0].name, "Kas");
            }
            other => panic!("expected accounts, got {other:?}"),
        }
        assert_eq!(
            session.view("xyz").await,
            TreeView::NoMatches {
                query: "xyz".to_string()
            }
        );
    }

    #[tokio::test]
    async fn import_reloads_and_surfaces_the_summary() {
        let (_, session) = session_with_directory().await;
        session.refresh().await.unwrap();

        let upload = ImportUpload {
            filename: "coa.csv".to_string(),
            bytes: b"1,Aset,ASSET,true,\n1-1,Kas,ASSET,false,1\n".to_vec(),
        };
        let summary = session.import(upload).await.unwrap();
        assert_eq!(summary.created, 2);

        let roots = session.tree().await;
        assert_eq!(roots[0].children[0].code, "1-1");

        let notices = session.drain_notices().await;
        assert_eq!(notices.last().unwrap().message, summary.message);
    }

    #[tokio::test]
    async fn flat_accounts_are_preorder() {
        let (_, session) = session_with_directory().await;
        let aset = session
            .create_account(&draft("1", "Aset", AccountType::Asset, true))
            .await
            .unwrap();
        session
            .create_sub_account(aset, &draft("1-1", "Kas", AccountType::Asset, false))
            .await
            .unwrap();
        session
            .create_account(&draft("2", "Kewajiban", AccountType::Liability, true))
            .await
            .unwrap();

        let codes: Vec<String> = session
            .flat_accounts()
            .await
            .into_iter()
            .map(|node| node.code)
            .collect();
        assert_eq!(codes, vec!["1", "1-1", "2"]);
    }
}
