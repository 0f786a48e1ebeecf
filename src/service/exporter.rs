use crate::error::ProcessError;
use crate::models::table::{
    COL_AMOUNT_FUNCTIONAL, COL_AMOUNT_RECEIVED, COL_AMOUNT_TRANSACTION, COL_CHARGE_ACCOUNT,
    COL_CURRENCY, COL_INVOICE_LINE_NUMBER, COL_INVOICE_NUMBER, COL_LINE_AMOUNT,
    COL_LINE_AMOUNT_FUNCTIONAL, COL_PO_NUMBER, COL_SUPPLIER,
};
use crate::models::{AggregatedRow, CombinedTable, DetailedRow};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

pub const REPORT_TYPE_COMBINED: &str = "Combined";
pub const REPORT_TYPE_PROCESSED: &str = "Processed";
pub const REPORT_TYPE_DETAILED: &str = "ProcessedDetailed";

/// 三张报表统一的前导元数据列
const META_COLUMNS: [&str; 3] = ["Report Type", "Date Range", "Generation Date"];

// 明细报表追加列, 列名与下游对账模板保持一致
const DETAILED_EXTRA_COLUMNS: [&str; 6] = [
    "Dup_ind",
    "Line_amount_adj",
    "Invoice_line_amount_in_sar",
    "conversion_rate",
    "Amount_recieved_in_SAR",
    "GRN_amount_in_SAR",
];

/// 三张派生报表序列化为 CSV 字节块, 文件名按日期范围和生成时刻确定
///
/// 同一秒内重复调用会得到相同文件名, 这是已接受的弱唯一性边界;
/// generated_at 由调用方一次性计算传入, 保证导出本身可确定性复现。
pub fn export_reports(
    combined: &CombinedTable,
    aggregated: &[AggregatedRow],
    detailed: &[DetailedRow],
    from_date: NaiveDate,
    to_date: NaiveDate,
    generated_at: NaiveDateTime,
) -> Result<IndexMap<String, Vec<u8>>, ProcessError> {
    let date_range = date_range_label(from_date, to_date);
    let generation = generated_at.format("%Y-%m-%d %H:%M:%S").to_string();

    let mut reports = IndexMap::new();
    reports.insert(
        report_filename(REPORT_TYPE_COMBINED, from_date, to_date, generated_at),
        combined_csv(combined, &date_range, &generation)?,
    );
    reports.insert(
        report_filename(REPORT_TYPE_PROCESSED, from_date, to_date, generated_at),
        processed_csv(aggregated, &date_range, &generation)?,
    );
    reports.insert(
        report_filename(REPORT_TYPE_DETAILED, from_date, to_date, generated_at),
        detailed_csv(combined, detailed, &date_range, &generation)?,
    );
    Ok(reports)
}

/// 原始工件的下载文件名 (不做加工时用)
pub fn raw_artifact_filename(
    from_date: NaiveDate,
    to_date: NaiveDate,
    generated_at: NaiveDateTime,
) -> String {
    format!(
        "PO_Report_{}_to_{}_{}.xls",
        from_date.format("%m%d%Y"),
        to_date.format("%m%d%Y"),
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

fn report_filename(
    label: &str,
    from_date: NaiveDate,
    to_date: NaiveDate,
    generated_at: NaiveDateTime,
) -> String {
    format!(
        "{}_PO_Report_{}_to_{}_{}.csv",
        label,
        from_date.format("%m%d%Y"),
        to_date.format("%m%d%Y"),
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

fn date_range_label(from_date: NaiveDate, to_date: NaiveDate) -> String {
    format!(
        "{} to {}",
        from_date.format("%m-%d-%Y"),
        to_date.format("%m-%d-%Y")
    )
}

fn combined_csv(
    table: &CombinedTable,
    date_range: &str,
    generation: &str,
) -> Result<Vec<u8>, ProcessError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = META_COLUMNS.to_vec();
    header.extend(table.columns.iter().map(String::as_str));
    write_record(&mut writer, &header)?;

    for row in &table.rows {
        let mut record: Vec<&str> = vec![REPORT_TYPE_COMBINED, date_range, generation];
        record.extend(row.iter().map(String::as_str));
        write_record(&mut writer, &record)?;
    }

    finish(writer)
}

fn processed_csv(
    rows: &[AggregatedRow],
    date_range: &str,
    generation: &str,
) -> Result<Vec<u8>, ProcessError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = META_COLUMNS.to_vec();
    header.extend([
        COL_PO_NUMBER,
        COL_CHARGE_ACCOUNT,
        COL_SUPPLIER,
        COL_CURRENCY,
        COL_INVOICE_NUMBER,
        COL_INVOICE_LINE_NUMBER,
        COL_LINE_AMOUNT,
        COL_LINE_AMOUNT_FUNCTIONAL,
        COL_AMOUNT_RECEIVED,
        COL_AMOUNT_TRANSACTION,
        COL_AMOUNT_FUNCTIONAL,
        "conversion rate",
        "diff",
        "diff InSAR",
    ]);
    write_record(&mut writer, &header)?;

    for row in rows {
        let record = [
            REPORT_TYPE_PROCESSED.to_string(),
            date_range.to_string(),
            generation.to_string(),
            row.po_number.clone(),
            row.charge_account.clone(),
            row.supplier.clone(),
            row.currency.clone(),
            row.invoice_number.clone(),
            row.invoice_line_number.clone(),
            row.line_amount.to_string(),
            row.line_amount_functional.to_string(),
            row.amount_received.to_string(),
            row.amount_transaction.to_string(),
            row.amount_functional.to_string(),
            row.conversion_rate.to_string(),
            row.diff.to_string(),
            row.diff_in_functional.to_string(),
        ];
        writer
            .write_record(&record)
            .map_err(|e| ProcessError::Csv(e.to_string()))?;
    }

    finish(writer)
}

fn detailed_csv(
    table: &CombinedTable,
    rows: &[DetailedRow],
    date_range: &str,
    generation: &str,
) -> Result<Vec<u8>, ProcessError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = META_COLUMNS.to_vec();
    header.extend(table.columns.iter().map(String::as_str));
    header.extend(DETAILED_EXTRA_COLUMNS);
    write_record(&mut writer, &header)?;

    for row in rows {
        let mut record: Vec<String> = vec![
            REPORT_TYPE_DETAILED.to_string(),
            date_range.to_string(),
            generation.to_string(),
        ];
        record.extend(row.cells.iter().cloned());
        record.push(row.dup_index.to_string());
        record.push(row.line_amount_adj.to_string());
        record.push(row.functional_line_amount_adj.to_string());
        record.push(row.conversion_rate.to_string());
        record.push(row.amount_received_functional.to_string());
        record.push(row.grn_amount_functional.to_string());
        writer
            .write_record(&record)
            .map_err(|e| ProcessError::Csv(e.to_string()))?;
    }

    finish(writer)
}

fn write_record(writer: &mut csv::Writer<Vec<u8>>, record: &[&str]) -> Result<(), ProcessError> {
    writer
        .write_record(record)
        .map_err(|e| ProcessError::Csv(e.to_string()))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ProcessError> {
    writer
        .into_inner()
        .map_err(|e| ProcessError::Csv(e.to_string()))
}
