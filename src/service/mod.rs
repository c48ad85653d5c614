//! 服务层
//!
//! 生命周期管理、地址格式切换、交易编排与会话

pub mod format_resolver;
pub mod lifecycle;
pub mod network;
pub mod orchestrator;
pub mod session;
pub mod transaction_builder;

pub use format_resolver::AddressFormatResolver;
pub use lifecycle::WalletLifecycleManager;
pub use network::{FeeDefaults, NetworkHandle};
pub use orchestrator::TransactionOrchestrator;
pub use session::WalletSession;
