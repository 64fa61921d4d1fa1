use serde::{Deserialize, Serialize};

/// Who is asking, as resolved by the upstream identity gateway.
///
/// A caller without a `user_id` is a guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub plan_id: Option<String>,
}

impl Caller {
    /// Plan assumed for an identified caller the gateway sent no plan for.
    pub const DEFAULT_ACCOUNT_PLAN: &'static str = "free";

    pub fn guest() -> Self {
        Self::default()
    }

    pub fn account(user_id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: None,
            plan_id: Some(plan_id.into()),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}
