use serde::Serialize;

// 原始报表的列名模板 (以远程导出的首个工作表表头为准)
pub const COL_PO_NUMBER: &str = "Po Number";
pub const COL_CHARGE_ACCOUNT: &str = "POCharge A/c";
pub const COL_SUPPLIER: &str = "Supplier";
pub const COL_CURRENCY: &str = "Currency";
pub const COL_INVOICE_NUMBER: &str = "Invoice Number";
pub const COL_INVOICE_LINE_NUMBER: &str = "Invoice Line Number";
pub const COL_LINE_AMOUNT: &str = "Line Amount";
/// 源系统表头的原始拼写, 改掉会导致列匹配失败
pub const COL_LINE_AMOUNT_FUNCTIONAL: &str = "Line Maount in Functional Currency";
pub const COL_AMOUNT_RECEIVED: &str = "Amount Received";
pub const COL_AMOUNT_TRANSACTION: &str = "Amount in transaction Currency";
pub const COL_AMOUNT_FUNCTIONAL: &str = "Amount in Functional Currency";

/// 多工作表工件合并后的单一表格
///
/// 所有行共享首个工作表的表头模板; 列数不一致的工作表被整体丢弃,
/// 丢弃事件记录在 skipped 中 (不是错误)。
#[derive(Debug, Clone, Serialize)]
pub struct CombinedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub skipped: Vec<SheetSkip>,
}

impl CombinedTable {
    /// 按列名查找下标 (表头在合并时已去除首尾空白)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// 被丢弃工作表的记录 (列数与模板不一致)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSkip {
    pub sheet: String,
    pub expected: usize,
    pub actual: usize,
}
