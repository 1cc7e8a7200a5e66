pub mod config;
pub mod contracts;

pub use config::ServiceConfig;
pub use contracts::{
    AccountView, CreateAccountRequest, ImportResultView, LedgerEntryView, MessageResponse,
    UpdateAccountRequest,
};
