use super::*;

/// Verdict from the pool operator's authorization policy.
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    pub authorized: bool,
    /// Starting difficulty to push right away, if the policy has one.
    pub difficulty: Option<Difficulty>,
    /// Tear the connection down instead of answering.
    pub disconnect: bool,
}

impl Authorization {
    pub fn accept() -> Self {
        Self {
            authorized: true,
            difficulty: None,
            disconnect: false,
        }
    }
}

/// Authorization is pool-operator policy, supplied from outside the core.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        remote: SocketAddr,
        username: &str,
        password: Option<&str>,
    ) -> Authorization;
}

/// Default policy: any worker name mines.
pub struct AcceptAll;

#[async_trait::async_trait]
impl Authorizer for AcceptAll {
    async fn authorize(
        &self,
        _remote: SocketAddr,
        _username: &str,
        _password: Option<&str>,
    ) -> Authorization {
        Authorization::accept()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_all_accepts() {
        let verdict = AcceptAll
            .authorize("203.0.113.7:48332".parse().unwrap(), "worker", None)
            .await;

        assert!(verdict.authorized);
        assert!(!verdict.disconnect);
        assert!(verdict.difficulty.is_none());
    }
}
