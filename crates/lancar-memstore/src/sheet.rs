//! CSV realization of the spreadsheet boundary. Rows are written in
//! pre-order with the parent referenced by code, and imports upsert by
//! code so a round trip is a no-op. Clients never look inside the bytes;
//! this format is a directory-side concern.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use lancar_core::{AccountType, CoaError, ExportBlob, ImportSummary, tree};

use crate::{CompanyBooks, StoredAccount};

const HEADER_ROW: &str = "kodeAkun,namaAkun,tipe,isHeader,parentKode";

pub(crate) fn export(books: &CompanyBooks) -> ExportBlob {
    let roots = books.build_tree();
    let code_by_id: HashMap<Uuid, &str> = books
        .accounts
        .values()
        .map(|account| (account.id, account.code.as_str()))
        .collect();

    let mut out = String::from(HEADER_ROW);
    out.push('\n');
    for node in tree::flatten_tree(&roots) {
        let parent_code = node
            .parent_id
            .and_then(|id| code_by_id.get(&id).copied())
            .unwrap_or("");
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            field(&node.code),
            field(&node.name),
            node.account_type,
            node.is_header,
            field(parent_code),
        ));
    }

    ExportBlob {
        filename: "chart-of-accounts.csv".to_string(),
        content_type: "text/csv".to_string(),
        bytes: out.into_bytes(),
    }
}

#[derive(Debug)]
pub(crate) struct ImportRow {
    line: usize,
    code: String,
    name: String,
    account_type: AccountType,
    is_header: bool,
    parent_code: Option<String>,
}

pub(crate) fn parse(bytes: &[u8]) -> Result<Vec<ImportRow>, CoaError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CoaError::validation("file is not valid UTF-8"))?;

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        if index == 0 && line.trim_start().starts_with("kodeAkun") {
            continue;
        }

        let fields = split_line(line);
        if fields.len() < 4 {
            return Err(CoaError::validation(format!(
                "row {line_no}: expected kodeAkun,namaAkun,tipe,isHeader[,parentKode]"
            )));
        }

        let code = fields[0].trim().to_string();
        if code.is_empty() {
            return Err(CoaError::validation(format!(
                "row {line_no}: account code is required"
            )));
        }
        if !seen.insert(code.clone()) {
            return Err(CoaError::validation(format!(
                "row {line_no}: duplicate account code {code}"
            )));
        }
        let name = fields[1].trim().to_string();
        if name.is_empty() {
            return Err(CoaError::validation(format!(
                "row {line_no}: account name is required"
            )));
        }
        let account_type = fields[2].parse::<AccountType>().map_err(|_| {
            CoaError::validation(format!(
                "row {line_no}: unsupported account type {}",
                fields[2].trim()
            ))
        })?;
        let is_header = match fields[3].trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" | "" => false,
            other => {
                return Err(CoaError::validation(format!(
                    "row {line_no}: isHeader must be true or false, got {other}"
                )));
            }
        };
        let parent_code = fields
            .get(4)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        rows.push(ImportRow {
            line: line_no,
            code,
            name,
            account_type,
            is_header,
            parent_code,
        });
    }

    if rows.is_empty() {
        return Err(CoaError::validation("file contains no account rows"));
    }
    Ok(rows)
}

/// Upsert the parsed rows into the book. Staged on a copy and committed
/// only if the resulting tree satisfies every invariant, so a rejected
/// import leaves the book untouched.
pub(crate) fn apply(
    books: &mut CompanyBooks,
    rows: Vec<ImportRow>,
) -> Result<ImportSummary, CoaError> {
    let mut staged = books.accounts.clone();
    let mut id_by_code: HashMap<String, Uuid> = staged
        .values()
        .map(|account| (account.code.clone(), account.id))
        .collect();

    let mut created = 0usize;
    let mut updated = 0usize;
    let mut placed: Vec<(Uuid, &ImportRow)> = Vec::with_capacity(rows.len());

    // Accounts first, parent links second: the file may reference a parent
    // declared on a later row.
    for row in &rows {
        let id = match id_by_code.get(&row.code) {
            Some(&id) => {
                if let Some(account) = staged.get_mut(&id) {
                    account.name = row.name.clone();
                    account.account_type = row.account_type;
                    account.is_header = row.is_header;
                }
                updated += 1;
                id
            }
            None => {
                let id = Uuid::new_v4();
                staged.insert(
                    id,
                    StoredAccount {
                        id,
                        code: row.code.clone(),
                        name: row.name.clone(),
                        account_type: row.account_type,
                        is_header: row.is_header,
                        parent_id: None,
                    },
                );
                id_by_code.insert(row.code.clone(), id);
                created += 1;
                id
            }
        };
        placed.push((id, row));
    }

    for (id, row) in &placed {
        let parent_id = match &row.parent_code {
            Some(code) => Some(*id_by_code.get(code).ok_or_else(|| {
                CoaError::validation(format!("row {}: unknown parent code {code}", row.line))
            })?),
            None => None,
        };
        if let Some(account) = staged.get_mut(id) {
            account.parent_id = parent_id;
        }
    }

    let trial = CompanyBooks {
        company_name: books.company_name.clone(),
        accounts: staged.clone(),
        postings: books.postings.clone(),
    };
    trial.verify()?;
    if tree::node_count(&trial.build_tree()) != trial.accounts.len() {
        return Err(CoaError::validation("import would create a parent cycle"));
    }

    books.accounts = staged;
    Ok(ImportSummary {
        message: format!(
            "imported {created} new accounts, updated {updated} existing accounts"
        ),
        created,
        updated,
    })
}

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if quoted {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '"' => quoted = true,
                ',' => fields.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
    }
    fields.push(current);
    fields
}
