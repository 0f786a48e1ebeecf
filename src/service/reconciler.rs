use crate::error::ProcessError;
use crate::models::table::{
    COL_AMOUNT_FUNCTIONAL, COL_AMOUNT_RECEIVED, COL_AMOUNT_TRANSACTION, COL_CHARGE_ACCOUNT,
    COL_CURRENCY, COL_INVOICE_LINE_NUMBER, COL_INVOICE_NUMBER, COL_LINE_AMOUNT,
    COL_LINE_AMOUNT_FUNCTIONAL, COL_PO_NUMBER, COL_SUPPLIER,
};
use crate::models::{AggregatedRow, CombinedTable, DetailedRow};
use bigdecimal::{BigDecimal, One, Zero};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// 汇总分组键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    po_number: String,
    charge_account: String,
    supplier: String,
    currency: String,
    invoice_number: String,
    invoice_line_number: String,
    line_amount: BigDecimal,
    line_amount_functional: BigDecimal,
}

#[derive(Debug, Default)]
struct GroupSums {
    amount_received: BigDecimal,
    amount_transaction: BigDecimal,
    amount_functional: BigDecimal,
}

/// 对账所需列的下标
struct ReconColumns {
    po_number: usize,
    charge_account: usize,
    supplier: usize,
    currency: usize,
    invoice_number: usize,
    invoice_line_number: usize,
    line_amount: usize,
    line_amount_functional: usize,
    amount_received: usize,
    amount_transaction: usize,
    amount_functional: usize,
}

impl ReconColumns {
    fn resolve(table: &CombinedTable) -> Result<Self, ProcessError> {
        let idx = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| ProcessError::MissingColumn {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            po_number: idx(COL_PO_NUMBER)?,
            charge_account: idx(COL_CHARGE_ACCOUNT)?,
            supplier: idx(COL_SUPPLIER)?,
            currency: idx(COL_CURRENCY)?,
            invoice_number: idx(COL_INVOICE_NUMBER)?,
            invoice_line_number: idx(COL_INVOICE_LINE_NUMBER)?,
            line_amount: idx(COL_LINE_AMOUNT)?,
            line_amount_functional: idx(COL_LINE_AMOUNT_FUNCTIONAL)?,
            amount_received: idx(COL_AMOUNT_RECEIVED)?,
            amount_transaction: idx(COL_AMOUNT_TRANSACTION)?,
            amount_functional: idx(COL_AMOUNT_FUNCTIONAL)?,
        })
    }
}

/// 汇总对账: 分组求和 + 汇率 + 重复行清零 + 差额
///
/// 纯函数: 相同输入 (含行序) 必然得到相同输出。
pub fn aggregate(
    table: &CombinedTable,
    exempt_po_numbers: &HashSet<String>,
) -> Result<Vec<AggregatedRow>, ProcessError> {
    let cols = ReconColumns::resolve(table)?;

    // 1. 缺失键值/金额统一归零后, 按分组键保序分组求和
    let mut groups: IndexMap<GroupKey, GroupSums> = IndexMap::new();
    for row in &table.rows {
        let key = GroupKey {
            po_number: key_field(row, cols.po_number),
            charge_account: key_field(row, cols.charge_account),
            supplier: key_field(row, cols.supplier),
            currency: key_field(row, cols.currency),
            invoice_number: key_field(row, cols.invoice_number),
            invoice_line_number: key_field(row, cols.invoice_line_number),
            line_amount: amount_field(row, cols.line_amount),
            line_amount_functional: amount_field(row, cols.line_amount_functional),
        };
        let sums = groups.entry(key).or_default();
        sums.amount_received += amount_field(row, cols.amount_received);
        sums.amount_transaction += amount_field(row, cols.amount_transaction);
        sums.amount_functional += amount_field(row, cols.amount_functional);
    }

    let mut rows: Vec<AggregatedRow> = groups
        .into_iter()
        .map(|(key, sums)| AggregatedRow {
            po_number: key.po_number,
            charge_account: key.charge_account,
            supplier: key.supplier,
            currency: key.currency,
            invoice_number: key.invoice_number,
            invoice_line_number: key.invoice_line_number,
            line_amount: key.line_amount,
            line_amount_functional: key.line_amount_functional,
            amount_received: sums.amount_received,
            amount_transaction: sums.amount_transaction,
            amount_functional: sums.amount_functional,
            conversion_rate: BigDecimal::zero(),
            diff: BigDecimal::zero(),
            diff_in_functional: BigDecimal::zero(),
        })
        .collect();

    // 2. 仅按PO号排序 (稳定排序, 同键保持分组出现顺序)
    rows.sort_by(|a, b| a.po_number.cmp(&b.po_number));

    // 3. 组级汇率
    for row in &mut rows {
        row.conversion_rate = conversion_rate(&row.amount_functional, &row.amount_transaction)
            .ok_or_else(|| ProcessError::ZeroConversionBase {
                po_number: row.po_number.clone(),
                invoice_number: row.invoice_number.clone(),
            })?;
    }

    // 4. 同一 (PO, 发票, 行号) 子组内首行之后的行金额清零, 防止重复计量
    let mut seen: HashMap<(String, String, String), u32> = HashMap::new();
    for row in &mut rows {
        let sub_key = (
            row.po_number.clone(),
            row.invoice_number.clone(),
            row.invoice_line_number.clone(),
        );
        let count = seen.entry(sub_key).or_insert(0);
        if *count > 0 {
            row.line_amount = BigDecimal::zero();
            row.line_amount_functional = BigDecimal::zero();
        }
        *count += 1;
    }

    // 5. 差额及其本位币折算; 豁免PO的本位币差额强制为零
    for row in &mut rows {
        row.diff = &row.line_amount - &row.amount_received;
        row.diff_in_functional = if exempt_po_numbers.contains(&row.po_number) {
            BigDecimal::zero()
        } else {
            &row.diff * &row.conversion_rate
        };
    }

    Ok(rows)
}

/// 明细对账: 逐行重复标号 + 金额调整 + 行级汇率折算
///
/// 与 aggregate 同为纯函数, 行数与输入一一对应。
pub fn detail(table: &CombinedTable) -> Result<Vec<DetailedRow>, ProcessError> {
    let cols = ReconColumns::resolve(table)?;

    let mut dup_counter: HashMap<(String, String, String, BigDecimal), u32> = HashMap::new();
    let mut out = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let po_number = key_field(row, cols.po_number);
        let invoice_number = key_field(row, cols.invoice_number);
        let invoice_line_number = key_field(row, cols.invoice_line_number);
        let line_amount = amount_field(row, cols.line_amount);
        let functional_line_amount = amount_field(row, cols.line_amount_functional);
        let amount_received = amount_field(row, cols.amount_received);
        let amount_transaction = amount_field(row, cols.amount_transaction);
        let amount_functional = amount_field(row, cols.amount_functional);

        // 1起始的重复序号, 按输入行序
        let dup_index = {
            let counter = dup_counter
                .entry((
                    po_number.clone(),
                    invoice_number.clone(),
                    invoice_line_number,
                    line_amount.clone(),
                ))
                .or_insert(0);
            *counter += 1;
            *counter
        };

        let (line_amount_adj, functional_line_amount_adj) = if dup_index > 1 {
            (BigDecimal::zero(), BigDecimal::zero())
        } else {
            (line_amount, functional_line_amount)
        };

        let conversion_rate = conversion_rate(&amount_functional, &amount_transaction)
            .ok_or_else(|| ProcessError::ZeroConversionBase {
                po_number: po_number.clone(),
                invoice_number: invoice_number.clone(),
            })?;

        let amount_received_functional = &amount_received * &conversion_rate;
        let grn_amount_functional = (&amount_received - &line_amount_adj) * &conversion_rate;

        out.push(DetailedRow {
            cells: row.clone(),
            dup_index,
            line_amount_adj,
            functional_line_amount_adj,
            conversion_rate,
            amount_received_functional,
            grn_amount_functional,
        });
    }

    Ok(out)
}

/// 汇率 = 本位币金额 / 交易币金额
///
/// 两个金额同时为零视为无折算发生, 汇率取 1; 交易币为零而本位币
/// 非零说明源数据异常, 返回 None 由调用方转成错误, 两条对账路径
/// 统一采用该口径。
fn conversion_rate(functional: &BigDecimal, transaction: &BigDecimal) -> Option<BigDecimal> {
    if transaction.is_zero() {
        if functional.is_zero() {
            Some(BigDecimal::one())
        } else {
            None
        }
    } else {
        Some(functional / transaction)
    }
}

/// 键列取值: 缺失/空白归一为 "0"
fn key_field(row: &[String], idx: usize) -> String {
    let value = row.get(idx).map(|s| s.trim()).unwrap_or("");
    if value.is_empty() {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// 金额列取值: 缺失或无法解析归零
fn amount_field(row: &[String], idx: usize) -> BigDecimal {
    row.get(idx)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .and_then(|s| BigDecimal::from_str(s).ok())
        .unwrap_or_else(BigDecimal::zero)
}
