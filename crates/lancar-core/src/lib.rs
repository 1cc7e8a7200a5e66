pub mod directory;
pub mod error;
pub mod models;
pub mod tree;

pub use directory::CoaDirectory;
pub use error::{CoaError, StructureViolation};
pub use models::{
    AccountDraft, AccountNode, AccountPatch, AccountType, CompanyId, DateRange, ExportBlob,
    ImportSummary, ImportUpload, LedgerEntry, NormalBalance,
};
pub use tree::{filter_tree, flatten_tree, node_count, parent_candidates, verify_structure};
