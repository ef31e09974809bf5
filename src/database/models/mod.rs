pub mod budget;
pub mod category;
pub mod expense;
pub mod nudge_delivery;
pub mod nudge_preference;
pub mod push_subscription;

pub use budget::Budget;
pub use category::Category;
pub use expense::Expense;
pub use nudge_delivery::NudgeDelivery;
pub use nudge_preference::NudgePreference;
pub use push_subscription::PushSubscription;
