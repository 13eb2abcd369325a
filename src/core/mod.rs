// Domain-layer modules and shared errors/models
pub mod dashboard {
    pub use crate::dashboard::*;
}

pub mod entitlements {
    pub use crate::entitlements::*;
}

pub mod errors {
    pub use crate::errors::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod onboarding {
    pub use crate::onboarding::*;
}
