use serde::{Deserialize, Serialize};
use std::fmt;

/// Spending caps for one student at one school
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingLimit {
    pub student_id: String,
    pub school_id: String,
    /// Maximum spend per local calendar day (always > 0)
    pub daily_limit: f64,
    /// Maximum spend per local calendar month (always > 0)
    pub monthly_limit: f64,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

/// Derived view of a student's usage against their limits.
///
/// Percentages are clamped to [0, 100] for display, spent values are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingStatus {
    pub daily_spent: f64,
    pub daily_limit: f64,
    pub daily_percentage: f64,
    pub monthly_spent: f64,
    pub monthly_limit: f64,
    pub monthly_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpendingLimitRequest {
    pub daily_limit: f64,
    pub monthly_limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseCheckRequest {
    pub student_id: String,
    pub school_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseCheckResponse {
    pub allowed: bool,
}

/// A completed purchase at a school sales point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseTransaction {
    pub id: String,
    pub student_id: String,
    pub school_id: String,
    pub product_id: String,
    pub product_name: String,
    /// Sales point that rang up the purchase (e.g. "Cafeteria North")
    pub operating_unit: String,
    /// Always positive
    pub amount: f64,
    /// RFC 3339 timestamp
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPurchaseRequest {
    pub student_id: String,
    pub school_id: String,
    pub product_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPurchaseResponse {
    pub approved: bool,
    pub transaction: Option<PurchaseTransaction>,
    pub reason: Option<String>,
    pub new_balance: Option<f64>,
}

/// Parent-initiated transfer of funds to a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Filled from the caller's identity by the API; clients may omit it
    #[serde(default)]
    pub parent_user_id: String,
    pub student_id: String,
    pub school_id: String,
    /// Two-decimal money amount
    pub amount: f64,
    pub payment_method_id: Option<String>,
    pub notes: Option<String>,
}

/// Outcome of deposit validation; invalid results always carry a reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl DepositValidation {
    pub fn valid() -> Self {
        Self { valid: true, reason: None }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "PENDING",
            DepositStatus::Completed => "COMPLETED",
            DepositStatus::Failed => "FAILED",
            DepositStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(DepositStatus::Pending),
            "COMPLETED" => Some(DepositStatus::Completed),
            "FAILED" => Some(DepositStatus::Failed),
            "CANCELLED" => Some(DepositStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted deposit record. Only `Pending` deposits may change status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    pub parent_user_id: String,
    pub student_id: String,
    pub school_id: String,
    pub amount: f64,
    pub payment_method_id: Option<String>,
    pub notes: Option<String>,
    pub status: DepositStatus,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub deposited_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailDepositRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    BankAccount,
    Other,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "card",
            PaymentMethodType::BankAccount => "bank_account",
            PaymentMethodType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "card" => PaymentMethodType::Card,
            "bank_account" => PaymentMethodType::BankAccount,
            _ => PaymentMethodType::Other,
        }
    }
}

/// Funding source owned by a parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub parent_user_id: String,
    pub label: String,
    pub method_type: PaymentMethodType,
    pub last_four: Option<String>,
    /// At most one method per parent is the default
    pub is_default: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddPaymentMethodRequest {
    pub label: String,
    pub method_type: PaymentMethodType,
    pub last_four: Option<String>,
}

/// Relationship that authorizes a parent to fund a student at a school
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentStudentLink {
    pub parent_user_id: String,
    pub student_id: String,
    pub school_id: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStudentRequest {
    pub student_id: String,
    pub school_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LimitWarning,
    LimitExceeded,
    PurchaseDeclined,
    LowBalance,
    DepositCompleted,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LimitWarning => "limit_warning",
            AlertType::LimitExceeded => "limit_exceeded",
            AlertType::PurchaseDeclined => "purchase_declined",
            AlertType::LowBalance => "low_balance",
            AlertType::DepositCompleted => "deposit_completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "limit_warning" => Some(AlertType::LimitWarning),
            "limit_exceeded" => Some(AlertType::LimitExceeded),
            "purchase_declined" => Some(AlertType::PurchaseDeclined),
            "low_balance" => Some(AlertType::LowBalance),
            "deposit_completed" => Some(AlertType::DepositCompleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(AlertSeverity::Info),
            "warning" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

/// Notification scoped to one parent-student pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub student_id: String,
    pub school_id: String,
    pub parent_user_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    /// Flips to true once and never back
    pub is_read: bool,
    pub created_at: String,
    pub read_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAlertRequest {
    pub student_id: String,
    pub school_id: String,
    pub parent_user_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAlertResponse {
    pub alert_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingUnitSummary {
    pub operating_unit: String,
    pub transactions: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolReport {
    pub school_id: String,
    pub window_days: u32,
    pub student_count: u64,
    pub total_transactions: u64,
    pub total_revenue: f64,
    pub top_products: Vec<ProductSummary>,
    pub top_operating_units: Vec<OperatingUnitSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentTransactionReport {
    pub student_id: String,
    pub school_id: String,
    pub total_transactions: u64,
    pub total_amount: f64,
}

/// Student wallet profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub student_id: String,
    pub school_id: String,
    pub display_name: String,
    pub balance: f64,
}

/// Catalog item sold at a school
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub price: f64,
    pub operating_unit: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftStatus {
    Pending,
    Redeemed,
}

impl GiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftStatus::Pending => "pending",
            GiftStatus::Redeemed => "redeemed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(GiftStatus::Pending),
            "redeemed" => Some(GiftStatus::Redeemed),
            _ => None,
        }
    }
}

/// Snapshot of the catalog item at the moment a gift was sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftItem {
    pub product_id: String,
    pub product_name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gift {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub school_id: String,
    pub item: GiftItem,
    pub redemption_code: String,
    pub status: GiftStatus,
    pub created_at: String,
    pub redeemed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendGiftRequest {
    pub receiver_id: String,
    pub school_id: String,
    pub product_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendGiftResponse {
    pub gift: Gift,
    pub sender_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemGiftRequest {
    pub redemption_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThankYouNote {
    pub id: String,
    pub gift_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendThankYouRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub student_id: String,
    pub school_id: String,
    pub product_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddFavoriteRequest {
    pub school_id: String,
    pub product_id: String,
}

/// Error body returned by the REST layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_status_round_trips_through_storage_names() {
        for status in [
            DepositStatus::Pending,
            DepositStatus::Completed,
            DepositStatus::Failed,
            DepositStatus::Cancelled,
        ] {
            assert_eq!(DepositStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DepositStatus::parse("pending"), None);
    }

    #[test]
    fn test_unknown_payment_method_type_falls_back_to_other() {
        assert_eq!(PaymentMethodType::parse("card"), PaymentMethodType::Card);
        assert_eq!(PaymentMethodType::parse("crypto"), PaymentMethodType::Other);
    }

    #[test]
    fn test_invalid_validation_carries_reason() {
        let validation = DepositValidation::invalid("Amount must be greater than 0");
        assert!(!validation.valid);
        assert_eq!(validation.reason.as_deref(), Some("Amount must be greater than 0"));
        assert!(DepositValidation::valid().reason.is_none());
    }

    #[test]
    fn test_enums_use_storage_names_on_the_wire() {
        assert_eq!(serde_json::to_string(&DepositStatus::Cancelled).unwrap(), "\"CANCELLED\"");
        assert_eq!(serde_json::to_string(&AlertType::LimitWarning).unwrap(), "\"limit_warning\"");
        let method: PaymentMethodType = serde_json::from_str("\"bank_account\"").unwrap();
        assert_eq!(method, PaymentMethodType::BankAccount);
    }

    #[test]
    fn test_deposit_request_parent_is_optional_on_the_wire() {
        let request: DepositRequest =
            serde_json::from_str(r#"{"student_id":"stu-1","school_id":"sch-1","amount":12.5}"#).unwrap();
        assert_eq!(request.parent_user_id, "");
        assert_eq!(request.amount, 12.5);
        assert!(request.payment_method_id.is_none());
        assert!(request.notes.is_none());
    }
}
