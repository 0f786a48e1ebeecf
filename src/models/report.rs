use bigdecimal::BigDecimal;
use serde::Serialize;

/// 汇总对账行: 每个分组键一行
///
/// 分组键 = (PO号, 费用科目, 供应商, 币种, 发票号, 发票行号,
/// 行金额, 本位币行金额); 三个金额字段为组内求和。
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedRow {
    pub po_number: String,
    pub charge_account: String,
    pub supplier: String,
    pub currency: String,
    pub invoice_number: String,
    pub invoice_line_number: String,
    /// 同一 (PO, 发票, 行号) 组内仅首行保留原值, 其余清零以避免重复计量
    pub line_amount: BigDecimal,
    pub line_amount_functional: BigDecimal,
    pub amount_received: BigDecimal,
    pub amount_transaction: BigDecimal,
    pub amount_functional: BigDecimal,
    pub conversion_rate: BigDecimal,
    pub diff: BigDecimal,
    pub diff_in_functional: BigDecimal,
}

/// 明细对账行: 合并表逐行对应, 不做分组去重
#[derive(Debug, Clone, Serialize)]
pub struct DetailedRow {
    /// 合并表原始单元格, 与 CombinedTable::columns 对齐
    pub cells: Vec<String>,
    /// (PO, 发票, 行号, 行金额) 组内 1 起始的重复序号, 按输入顺序
    pub dup_index: u32,
    pub line_amount_adj: BigDecimal,
    pub functional_line_amount_adj: BigDecimal,
    pub conversion_rate: BigDecimal,
    pub amount_received_functional: BigDecimal,
    pub grn_amount_functional: BigDecimal,
}
