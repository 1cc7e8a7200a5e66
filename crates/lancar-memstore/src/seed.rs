use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use lancar_core::{AccountDraft, AccountType, CoaDirectory, CoaError, CompanyId};

use crate::InMemoryDirectory;

/// Provision a demo company with a small Indonesian SME chart and a few
/// opening postings so header balances have something to aggregate.
pub async fn seed_demo_company(
    directory: &InMemoryDirectory,
    name: &str,
) -> Result<CompanyId, CoaError> {
    let company = directory.register_company(name).await;

    let aset = add(directory, company, "1", "Aset", AccountType::Asset, true, None).await?;
    let kas = add(
        directory,
        company,
        "1-1000",
        "Kas",
        AccountType::Asset,
        false,
        Some(aset),
    )
    .await?;
    let bank = add(
        directory,
        company,
        "1-1100",
        "Bank BCA",
        AccountType::Asset,
        false,
        Some(aset),
    )
    .await?;
    add(
        directory,
        company,
        "1-1200",
        "Piutang Usaha",
        AccountType::Asset,
        false,
        Some(aset),
    )
    .await?;
    add(
        directory,
        company,
        "1-1300",
        "Persediaan",
        AccountType::Asset,
        false,
        Some(aset),
    )
    .await?;

    let kewajiban = add(
        directory,
        company,
        "2",
        "Kewajiban",
        AccountType::Liability,
        true,
        None,
    )
    .await?;
    add(
        directory,
        company,
        "2-1000",
        "Hutang Usaha",
        AccountType::Liability,
        false,
        Some(kewajiban),
    )
    .await?;

    let modal = add(directory, company, "3", "Modal", AccountType::Equity, true, None).await?;
    let modal_disetor = add(
        directory,
        company,
        "3-1000",
        "Modal Disetor",
        AccountType::Equity,
        false,
        Some(modal),
    )
    .await?;

    let pendapatan = add(
        directory,
        company,
        "4",
        "Pendapatan",
        AccountType::Revenue,
        true,
        None,
    )
    .await?;
    let penjualan = add(
        directory,
        company,
        "4-1000",
        "Penjualan",
        AccountType::Revenue,
        false,
        Some(pendapatan),
    )
    .await?;

    let beban = add(directory, company, "5", "Beban", AccountType::Expense, true, None).await?;
    let gaji = add(
        directory,
        company,
        "5-1000",
        "Beban Gaji",
        AccountType::Expense,
        false,
        Some(beban),
    )
    .await?;
    add(
        directory,
        company,
        "5-2000",
        "Beban Sewa",
        AccountType::Expense,
        false,
        Some(beban),
    )
    .await?;

    let today = Utc::now().date_naive();

    // Opening balances funded by paid-in capital.
    directory
        .post_entry(company, kas, today, "Saldo awal kas", rp(2_500_000), Decimal::ZERO)
        .await?;
    directory
        .post_entry(
            company,
            modal_disetor,
            today,
            "Saldo awal kas",
            Decimal::ZERO,
            rp(2_500_000),
        )
        .await?;
    directory
        .post_entry(company, bank, today, "Saldo awal bank", rp(10_000_000), Decimal::ZERO)
        .await?;
    directory
        .post_entry(
            company,
            modal_disetor,
            today,
            "Saldo awal bank",
            Decimal::ZERO,
            rp(10_000_000),
        )
        .await?;

    // One cash sale and one salary payment.
    directory
        .post_entry(company, kas, today, "Penjualan tunai", rp(1_250_000), Decimal::ZERO)
        .await?;
    directory
        .post_entry(
            company,
            penjualan,
            today,
            "Penjualan tunai",
            Decimal::ZERO,
            rp(1_250_000),
        )
        .await?;
    directory
        .post_entry(company, gaji, today, "Pembayaran gaji", rp(3_000_000), Decimal::ZERO)
        .await?;
    directory
        .post_entry(company, kas, today, "Pembayaran gaji", Decimal::ZERO, rp(3_000_000))
        .await?;

    Ok(company)
}

async fn add(
    directory: &InMemoryDirectory,
    company: CompanyId,
    code: &str,
    name: &str,
    account_type: AccountType,
    is_header: bool,
    parent_id: Option<Uuid>,
) -> Result<Uuid, CoaError> {
    directory
        .create_account(
            company,
            AccountDraft {
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                is_header,
                parent_id,
            },
        )
        .await
}

fn rp(amount: i64) -> Decimal {
    Decimal::new(amount, 0)
}
