mod helpers;
mod money;

pub mod op;

pub use helpers::parse_boolean_flag;
pub use money::{Money, MoneyConversionError, MONEY_SCALE};
