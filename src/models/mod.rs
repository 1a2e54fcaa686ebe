//! Domain models shared across the entire Parallax pipeline.

pub mod council;
pub mod position;
pub mod signal;
pub mod tick;

#[allow(unused_imports)]
pub use council::{
    ConfidenceGrade, CouncilDecision, CouncilStage, Sentiment, SentimentResult, TradeAction,
    TradeVerdict,
};
pub use position::{OrderSide, Position, TradeRecord};
pub use signal::{Direction, DivergenceSignal};
pub use tick::{AlignedObservation, OddsQuote, PriceTick};
