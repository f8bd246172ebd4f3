// Repository modules
pub mod alert_repository;
pub mod deposit_repository;
pub mod favorite_repository;
pub mod gift_repository;
pub mod link_repository;
pub mod payment_method_repository;
pub mod product_repository;
pub mod profile_repository;
pub mod spending_limit_repository;
pub mod transaction_repository;

// Re-export repository types
pub use alert_repository::AlertRepository;
pub use deposit_repository::{DepositCompletion, DepositRepository};
pub use favorite_repository::FavoriteRepository;
pub use gift_repository::{GiftRedemption, GiftRepository};
pub use link_repository::LinkRepository;
pub use payment_method_repository::PaymentMethodRepository;
pub use product_repository::ProductRepository;
pub use profile_repository::ProfileRepository;
pub use spending_limit_repository::SpendingLimitRepository;
pub use transaction_repository::{DebitOutcome, SpendingGuard, TransactionRepository};
