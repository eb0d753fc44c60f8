use super::*;

/// Result of `mining.configure` negotiation, carried for the life of the
/// connection.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Negotiation {
    pub(crate) asicboost: bool,
    pub(crate) version_mask: Option<Version>,
    pub(crate) minimum_difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone)]
pub(crate) struct Subscription {
    pub(crate) subscription_id: String,
    pub(crate) extranonce1: Extranonce,
    pub(crate) extranonce2_size: usize,
}

/// Subscribe and authorize are independent flags: miners may authorize
/// before subscribing, and submits check each one separately (codes 24 and
/// 25).
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionState {
    subscription: Option<Subscription>,
    worker: Option<String>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    pub(crate) fn authorize(&mut self, worker: String) {
        self.worker = Some(worker);
    }

    pub(crate) fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub(crate) fn worker(&self) -> Option<&str> {
        self.worker.as_deref()
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub(crate) fn is_authorized(&self) -> bool {
        self.worker.is_some()
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match (&self.subscription, &self.worker) {
            (None, None) => write!(f, "Fresh"),
            (Some(_), None) => write!(f, "Subscribed"),
            (None, Some(_)) => write!(f, "Authorized"),
            (Some(_), Some(_)) => write!(f, "Working"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> Subscription {
        Subscription {
            subscription_id: "67616c656e61000100000000000000001".into(),
            extranonce1: "deadbeef".parse().unwrap(),
            extranonce2_size: 4,
        }
    }

    #[test]
    fn fresh_state_has_neither_flag() {
        let state = SessionState::new();
        assert!(!state.is_subscribed());
        assert!(!state.is_authorized());
        assert_eq!(state.to_string(), "Fresh");
    }

    #[test]
    fn authorize_without_subscribe_is_legal() {
        let mut state = SessionState::new();
        state.authorize("worker".into());

        assert!(state.is_authorized());
        assert!(!state.is_subscribed());
        assert_eq!(state.to_string(), "Authorized");
    }

    #[test]
    fn subscribe_then_authorize_reaches_working() {
        let mut state = SessionState::new();
        state.subscribe(subscription());
        assert_eq!(state.to_string(), "Subscribed");

        state.authorize("worker".into());
        assert_eq!(state.to_string(), "Working");
        assert_eq!(state.worker(), Some("worker"));
        assert_eq!(
            state.subscription().unwrap().extranonce1,
            "deadbeef".parse().unwrap()
        );
    }

    #[test]
    fn resubscribe_replaces_the_extranonce() {
        let mut state = SessionState::new();
        state.subscribe(subscription());

        let replacement = Subscription {
            extranonce1: "cafebabe".parse().unwrap(),
            ..subscription()
        };
        state.subscribe(replacement);

        assert_eq!(
            state.subscription().unwrap().extranonce1,
            "cafebabe".parse().unwrap()
        );
    }
}
