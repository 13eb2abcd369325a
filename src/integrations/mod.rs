//! External service integrations.

pub mod billing_client {
    pub use crate::billing_client::*;
}

pub mod sms_client {
    pub use crate::sms_client::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
