//! # Action Messages
//!
//! Wire contracts for the workflow action-message pipeline. One message type
//! per workflow action, all correlated to an originating database transaction
//! through `transaction_id`.

pub mod message;

pub use message::{
    ActionMessage, ChangeType, MessageActionType, MessageHeaders, ModifiedProperty,
    PredefinedItemType,
};
