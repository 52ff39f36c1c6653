//! Records a month of cash activity and payroll, then prints a statement.
//!
//! Run with `RUST_LOG=debug` to see every storage call. `HERACLION_*`
//! variables, from the environment or a `.env` file, override the defaults.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use heraclion_core::{
    telemetry, BackOffice, DocumentKind, HeraclionConfig, HeraclionResult, MemoryStorage,
    MovementFilter, MovementKind, NewCashMovement, PayrollInput,
};

const DEMO_YEAR: i32 = 2024;

#[tokio::main]
async fn main() -> HeraclionResult<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    // The demo data is dated 2024, so the year window is pinned to it
    let mut config = HeraclionConfig::from_env()?;
    config.numbering.reference_year = Some(DEMO_YEAR);
    let office = BackOffice::with_config(MemoryStorage::new(), config);

    let start = NaiveDate::from_ymd_opt(DEMO_YEAR, 2, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(DEMO_YEAR, 2, 29).unwrap();

    office
        .record_movement(NewCashMovement::entree(
            start,
            "Fonds de caisse".to_string(),
            BigDecimal::from(500_000),
        ))
        .await?;

    let invoice = office
        .next_document_number(DocumentKind::Facture, DEMO_YEAR)
        .await?;
    office
        .record_movement(
            NewCashMovement::entree(
                NaiveDate::from_ymd_opt(DEMO_YEAR, 2, 12).unwrap(),
                format!("Règlement {}", invoice),
                BigDecimal::from(180_000),
            )
            .with_category("Ventes")
            .with_reference(invoice.to_string()),
        )
        .await?;

    let payroll = vec![
        PayrollInput::new("2024-02-29", "Rakoto", 150_000),
        PayrollInput::new("2024-02-29", "Rabe", 120_000).with_comment("Heures sup. incluses"),
    ];
    office.record_payrolls(&payroll).await?;

    let outflows = office
        .list_movements(&MovementFilter::new().kind(MovementKind::Sortie))
        .await?;
    for movement in &outflows {
        println!("{} {:<20} {:>12}", movement.date, movement.label, movement.amount);
    }

    let statement = office.generate_cash_statement(start, end).await?;
    println!("opening  {:>12}", statement.opening_balance);
    println!("inflows  {:>12}", statement.total_inflows);
    println!("outflows {:>12}", statement.total_outflows);
    println!("closing  {:>12}", statement.closing_balance);

    let archived = office.archive_month(DEMO_YEAR, 2).await?;
    println!("archived {} movements of {}-02", archived, DEMO_YEAR);

    Ok(())
}
