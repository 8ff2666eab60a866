use chrono::NaiveDate;

/// Customer name used when a row leaves it blank.
pub const DEFAULT_CUSTOMER: &str = "Unknown";
/// Category used when the upload has no category column or the cell is blank.
pub const DEFAULT_CATEGORY: &str = "General";

/// One revenue/cost record. Profit figures are derived from the four money
/// fields by the metrics engine and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub revenue: f64,
    pub cogs: f64,
    pub sales_commission: f64,
    pub sales_program: f64,
    pub customer_name: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw == "success" {
            Self::Success
        } else {
            Self::Error
        }
    }
}

/// One row of the upload history table.
#[derive(Debug, Clone)]
pub struct UploadLog {
    pub id: i64,
    pub filename: String,
    pub records_count: i64,
    pub file_size: Option<i64>,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub checksum: Option<String>,
    pub uploaded_at: String,
}
