use crate::error::ProcessError;
use crate::models::{CombinedTable, SheetSkip};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::{info, warn};

/// 将多工作表工件合并为单一表格
///
/// 首个工作表的第一行作为列名模板 (去除首尾空白), 其余行为数据;
/// 后续工作表无表头, 按位置套用模板列名。列数与模板不一致的
/// 工作表整体丢弃并记录, 不让整个合并失败。行顺序保持输入顺序:
/// 首个工作表的行在前, 保留的工作表按簿内顺序追加。
pub fn combine(artifact: &[u8]) -> Result<CombinedTable, ProcessError> {
    let cursor = Cursor::new(artifact);
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| ProcessError::Workbook(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_owned();
    let Some(first_name) = sheet_names.first() else {
        return Err(ProcessError::EmptyArtifact);
    };

    let first = workbook
        .worksheet_range(first_name)
        .map_err(|e| ProcessError::Workbook(e.to_string()))?;
    let mut first_rows = first.rows();
    let Some(header) = first_rows.next() else {
        return Err(ProcessError::EmptyArtifact);
    };

    let columns: Vec<String> = header
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = first_rows
        .map(|r| r.iter().map(cell_to_string).collect())
        .collect();
    let mut skipped: Vec<SheetSkip> = Vec::new();

    for name in &sheet_names[1..] {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| ProcessError::Workbook(e.to_string()))?;

        let width = range.width();
        if width != columns.len() {
            warn!(
                "Skipping sheet '{}' due to column mismatch: expected {}, got {}",
                name,
                columns.len(),
                width
            );
            skipped.push(SheetSkip {
                sheet: name.clone(),
                expected: columns.len(),
                actual: width,
            });
            continue;
        }

        for row in range.rows() {
            rows.push(row.iter().map(cell_to_string).collect());
        }
    }

    info!(
        "合并完成: {} 列 {} 行, 跳过 {} 个工作表",
        columns.len(),
        rows.len(),
        skipped.len()
    );

    Ok(CombinedTable {
        columns,
        rows,
        skipped,
    })
}

/// 单元格渲染为字符串; 整数值的浮点单元格收敛为整数形式
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
