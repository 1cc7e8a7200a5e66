use chrono::NaiveDate;
use lancar_core::{
    AccountDraft, AccountNode, AccountPatch, AccountType, ImportSummary, LedgerEntry,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub id: Uuid,
    #[serde(rename = "kodeAkun")]
    pub kode_akun: String,
    #[serde(rename = "namaAkun")]
    pub nama_akun: String,
    pub tipe: AccountType,
    #[serde(rename = "isHeader")]
    pub is_header: bool,
    pub balance: Decimal,
    #[serde(rename = "parentId")]
    pub parent_id: Option<Uuid>,
    pub children: Vec<AccountView>,
}

impl From<AccountNode> for AccountView {
    fn from(node: AccountNode) -> Self {
        Self {
            id: node.id,
            kode_akun: node.code,
            nama_akun: node.name,
            tipe: node.account_type,
            is_header: node.is_header,
            balance: node.balance,
            parent_id: node.parent_id,
            children: node.children.into_iter().map(Self::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(rename = "kodeAkun")]
    pub kode_akun: String,
    #[serde(rename = "namaAkun")]
    pub nama_akun: String,
    pub tipe: AccountType,
    #[serde(rename = "isHeader", default)]
    pub is_header: bool,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<Uuid>,
}

impl CreateAccountRequest {
    pub fn into_draft(self) -> AccountDraft {
        AccountDraft {
            code: self.kode_akun,
            name: self.nama_akun,
            account_type: self.tipe,
            is_header: self.is_header,
            parent_id: self.parent_id,
        }
    }
}

/// Partial update. For `parentId`, an absent key means "leave the parent
/// unchanged" while an explicit `null` detaches the account to root level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(rename = "kodeAkun", default, skip_serializing_if = "Option::is_none")]
    pub kode_akun: Option<String>,
    #[serde(rename = "namaAkun", default, skip_serializing_if = "Option::is_none")]
    pub nama_akun: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipe: Option<AccountType>,
    #[serde(rename = "isHeader", default, skip_serializing_if = "Option::is_none")]
    pub is_header: Option<bool>,
    #[serde(
        rename = "parentId",
        default,
        deserialize_with = "nullable_parent",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<Uuid>>,
}

fn nullable_parent<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

impl UpdateAccountRequest {
    pub fn into_patch(self) -> AccountPatch {
        AccountPatch {
            code: self.kode_akun,
            name: self.nama_akun,
            account_type: self.tipe,
            is_header: self.is_header,
            parent: self.parent_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryView {
    pub id: Uuid,
    #[serde(rename = "accountId")]
    pub account_id: Uuid,
    pub date: NaiveDate,
    pub memo: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl From<LedgerEntry> for LedgerEntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            date: entry.entry_date,
            memo: entry.memo,
            debit: entry.debit,
            credit: entry.credit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResultView {
    pub message: String,
    pub created: usize,
    pub updated: usize,
}

impl From<ImportSummary> for ImportResultView {
    fn from(summary: ImportSummary) -> Self {
        Self {
            message: summary.message,
            created: summary.created,
            updated: summary.updated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uses_wire_field_names() {
        let request: CreateAccountRequest = serde_json::from_str(
            r#"{"kodeAkun":"1-1000","namaAkun":"Kas","tipe":"ASSET","isHeader":false}"#,
        )
        .unwrap();

        let draft = request.into_draft();
        assert_eq!(draft.code, "1-1000");
        assert_eq!(draft.name, "Kas");
        assert_eq!(draft.account_type, AccountType::Asset);
        assert!(!draft.is_header);
        assert_eq!(draft.parent_id, None);
    }

    #[test]
    fn update_request_distinguishes_absent_from_null_parent() {
        let untouched: UpdateAccountRequest =
            serde_json::from_str(r#"{"namaAkun":"Kas Besar"}"#).unwrap();
        assert_eq!(untouched.parent_id, None);

        let detached: UpdateAccountRequest =
            serde_json::from_str(r#"{"parentId":null}"#).unwrap();
        assert_eq!(detached.parent_id, Some(None));

        let id = Uuid::new_v4();
        let moved: UpdateAccountRequest =
            serde_json::from_str(&format!(r#"{{"parentId":"{id}"}}"#)).unwrap();
        assert_eq!(moved.parent_id, Some(Some(id)));
    }

    #[test]
    fn account_view_serializes_nested_children() {
        let leaf = AccountNode {
            id: Uuid::new_v4(),
            code: "1-1".to_string(),
            name: "Kas".to_string(),
            account_type: AccountType::Asset,
            is_header: false,
            balance: Decimal::new(250_000, 0),
            parent_id: None,
            children: vec![],
        };
        let mut root = AccountNode {
            id: Uuid::new_v4(),
            code: "1".to_string(),
            name: "Aset".to_string(),
            account_type: AccountType::Asset,
            is_header: true,
            balance: Decimal::new(250_000, 0),
            parent_id: None,
            children: vec![leaf],
        };
        root.children[0].parent_id = Some(root.id);

        let value = serde_json::to_value(AccountView::from(root)).unwrap();
        assert_eq!(value["kodeAkun"], "1");
        assert_eq!(value["tipe"], "ASSET");
        assert_eq!(value["children"][0]["namaAkun"], "Kas");
        assert_eq!(value["children"][0]["isHeader"], false);
    }
}
