pub mod classifier;
pub mod engine;
pub mod options;
pub mod store;

pub use classifier::{classify, ClassifyError, OptionHint, TradeInstruction, TradeIntent};
pub use engine::{EngineError, PaperTradingEngine, TradeOutcome};
pub use options::OptionQuoteService;
pub use store::{JsonStore, StoreError};
