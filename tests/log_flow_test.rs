use anyhow::Result;
use call_sheets::app::log_use_case::NormalizeLogUseCase;
use call_sheets::error::CallSheetsError;
use call_sheets::pipeline::timestamp::TimestampFallback;
use call_sheets::table::Cell;
use call_sheets::workbook::{read_table_file, read_workbook_file};
use std::fs;
use tempfile::tempdir;

const EXPORT: &str = "\
From,Date,Time,Action Result,Extension,Duration
5551111,Mon 01/01/2024,9:00 AM,Missed,Latino Main,0
12,Mon 01/01/2024,9:05 AM,Answered,Latino Main,30
5552222,Mon 01/01/2024,9:10 AM,Answered,Agape Line,45
5553333,Mon 01/01/2024,9:20 AM,Answered,Reception,12
5551111,Tue 01/02/2024,4:45 PM,Answered,LATINO overflow,80
5554444,Tue 01/02/2024,,Voicemail,latino,0
";

fn categories() -> Vec<String> {
    ["Latino", "Agape", "Bayview", "Anaheim"].iter().map(|c| c.to_string()).collect()
}

#[test]
fn csv_export_becomes_one_sheet_per_category() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("calls.csv");
    let output = dir.path().join("por_categoria.xlsx");
    fs::write(&input, EXPORT)?;

    let sheet = read_table_file(&input, b',')?;
    let use_case = NormalizeLogUseCase::new(categories(), TimestampFallback::Verbatim);
    let (outcome, bytes) = use_case.run_to_workbook(&sheet)?;
    fs::write(&output, bytes)?;

    assert_eq!(outcome.rows_in, 6);
    assert_eq!(outcome.rows_out, 3);

    let sheets = read_workbook_file(&output)?;
    let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Agape", "Latino"]);

    let latino = &sheets[1].table;
    assert_eq!(latino.headers, vec!["From", "PraFecha", "Action Result"]);
    assert_eq!(
        latino.rows,
        vec![
            vec![Cell::text("5551111"), Cell::text("2024-01-02 16:45:00"), Cell::text("Answered")],
            vec![Cell::text("5554444"), Cell::text("2024-01-02 00:00:00"), Cell::text("Voicemail")],
        ]
    );

    let agape = &sheets[0].table;
    assert_eq!(agape.rows.len(), 1);
    assert_eq!(agape.rows[0][1], Cell::text("2024-01-01 09:10:00"));

    Ok(())
}

#[test]
fn export_without_action_result_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("calls.csv");
    fs::write(&input, "From,Date,Time,Extension\n5551111,01/01/2024,9:00,Latino\n")?;

    let sheet = read_table_file(&input, b',')?;
    let use_case = NormalizeLogUseCase::new(categories(), TimestampFallback::Verbatim);

    match use_case.run_to_workbook(&sheet) {
        Err(CallSheetsError::Schema { missing, .. }) => assert_eq!(missing, vec!["Action Result"]),
        other => panic!("expected schema error, got {:?}", other.map(|(o, _)| o.rows_out)),
    }
    Ok(())
}

#[test]
fn alternate_category_lists_change_the_grouping() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("calls.csv");
    fs::write(&input, EXPORT)?;
    let sheet = read_table_file(&input, b',')?;

    let use_case = NormalizeLogUseCase::new(vec!["Main".to_string(), "Line".to_string()], TimestampFallback::Verbatim);
    let outcome = use_case.run(&sheet)?;

    let names: Vec<&str> = outcome.tables.keys().map(|k| k.as_str()).collect();
    assert_eq!(names, vec!["Line", "Main"]);
    Ok(())
}
