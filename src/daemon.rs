use {
    super::*,
    backon::{ExponentialBuilder, Retryable},
};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: usize = 3;

/// RPC methods the pool is allowed to issue; enforced at the client
/// boundary.
const RPC_METHOD_WHITELIST: &[&str] = &[
    "getblock",
    "getblockchaininfo",
    "getblocktemplate",
    "getdifficulty",
    "getinfo",
    "getmininginfo",
    "getnetworkinfo",
    "getpeerinfo",
    "submitblock",
    "validateaddress",
];

/// An error object returned by the daemon, surfaced verbatim so callers can
/// match on well-known codes (-10 while syncing, -32601 method not found).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcFailure {
    pub(crate) code: i64,
    pub(crate) message: String,
}

impl RpcFailure {
    pub(crate) const WARMING_UP: i64 = -10;
    pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
}

impl Display for RpcFailure {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "daemon RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcFailure {}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcFailure>,
    #[allow(dead_code)]
    id: Value,
}

/// HTTP JSON-RPC client over one or more daemon instances. Requests carry
/// Basic auth, a 30 s timeout, and up to three exponentially backed-off
/// retries on timeout; connection-refused surfaces immediately.
pub(crate) struct DaemonClient {
    client: reqwest::Client,
    instances: Vec<DaemonInstance>,
    request_id: AtomicU64,
}

#[derive(Debug, Clone)]
pub(crate) struct DaemonInstance {
    pub(crate) url: String,
    pub(crate) user: String,
    pub(crate) password: String,
}

impl DaemonClient {
    pub(crate) fn new(instances: Vec<DaemonInstance>) -> Result<Self> {
        ensure!(!instances.is_empty(), "no daemons configured");

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("failed to build HTTP client")?,
            instances,
            request_id: AtomicU64::new(0),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Issues one whitelisted call, trying every instance and retrying
    /// timeouts per instance.
    pub(crate) async fn call(&self, method: &str, params: Value) -> Result<Value> {
        ensure!(
            RPC_METHOD_WHITELIST.contains(&method),
            "RPC method {method} is not whitelisted"
        );

        let mut last_error = None;

        for instance in &self.instances {
            let body = json!({
                "jsonrpc": "1.0",
                "id": self.next_id(),
                "method": method,
                "params": params,
            });

            let attempt = || async { self.post(instance, &body).await };

            match attempt
                .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
                .when(is_transient)
                .await
            {
                Ok(response) => {
                    if let Some(error) = response.error {
                        return Err(Error::new(error));
                    }
                    return Ok(response.result.unwrap_or(Value::Null));
                }
                Err(err) => {
                    warn!("Daemon {} failed {method}: {err}", instance.url);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.expect("at least one instance").context(format!(
            "all {} daemon(s) failed {method}",
            self.instances.len()
        )))
    }

    /// One batch request with unique in-flight ids; results come back in
    /// call order, each carrying its own RPC error if the daemon returned
    /// one.
    pub(crate) async fn batch(&self, calls: &[(&str, Value)]) -> Result<Vec<Result<Value>>> {
        for (method, _) in calls {
            ensure!(
                RPC_METHOD_WHITELIST.contains(method),
                "RPC method {method} is not whitelisted"
            );
        }

        let ids: Vec<u64> = calls.iter().map(|_| self.next_id()).collect();

        let body: Vec<Value> = calls
            .iter()
            .zip(&ids)
            .map(|((method, params), id)| {
                json!({
                    "jsonrpc": "1.0",
                    "id": id,
                    "method": method,
                    "params": params,
                })
            })
            .collect();

        let mut last_error = None;

        for instance in &self.instances {
            match self.post_batch(instance, &json!(body)).await {
                Ok(responses) => {
                    let mut by_id: HashMap<u64, RpcResponse> = responses
                        .into_iter()
                        .filter_map(|r| Some((r.id.as_u64()?, r)))
                        .collect();

                    let mut results = Vec::with_capacity(ids.len());
                    for id in &ids {
                        let response = by_id
                            .remove(id)
                            .ok_or_else(|| anyhow!("batch response missing id {id}"))?;
                        match response.error {
                            Some(error) => results.push(Err(Error::new(error))),
                            None => results.push(Ok(response.result.unwrap_or(Value::Null))),
                        }
                    }

                    return Ok(results);
                }
                Err(err) => {
                    warn!("Daemon {} failed batch: {err}", instance.url);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .expect("at least one instance")
            .context("all daemons failed batch request"))
    }

    /// At least one instance must answer an RPC before startup proceeds.
    pub(crate) async fn online_check(&self) -> Result {
        self.call("getpeerinfo", json!([]))
            .await
            .map(|_| ())
            .context("no daemon instance is reachable")
    }

    pub(crate) async fn get_block_template(&self) -> Result<BlockTemplate> {
        let params = json!([{
            "capabilities": ["coinbasetxn", "workid", "coinbase/append"],
            "rules": ["segwit"],
        }]);

        let value = self.call("getblocktemplate", params).await?;

        serde_json::from_value(value).context("failed to decode block template")
    }

    /// `submitblock`, falling back to `getblocktemplate {mode: submit}` on
    /// daemons that never learned the former. A "rejected" result is an
    /// error.
    pub(crate) async fn submit_block(&self, block_hex: &str) -> Result {
        let result = match self.call("submitblock", json!([block_hex])).await {
            Ok(result) => result,
            Err(err)
                if err
                    .downcast_ref::<RpcFailure>()
                    .is_some_and(|f| f.code == RpcFailure::METHOD_NOT_FOUND) =>
            {
                self.call(
                    "getblocktemplate",
                    json!([{"mode": "submit", "data": block_hex}]),
                )
                .await?
            }
            Err(err) => return Err(err),
        };

        if let Some(reason) = result.as_str() {
            bail!("block rejected: {reason}");
        }

        Ok(())
    }

    pub(crate) async fn get_block(&self, hash: &BlockHash) -> Result<Value> {
        self.call("getblock", json!([hash.to_string()])).await
    }

    async fn post(&self, instance: &DaemonInstance, body: &Value) -> Result<RpcResponse> {
        let text = self.post_text(instance, body).await?;
        serde_json::from_str(&coerce_nan(&text))
            .with_context(|| format!("invalid RPC response from {}", instance.url))
    }

    async fn post_batch(&self, instance: &DaemonInstance, body: &Value) -> Result<Vec<RpcResponse>> {
        let text = self.post_text(instance, body).await?;
        serde_json::from_str(&coerce_nan(&text))
            .with_context(|| format!("invalid RPC batch response from {}", instance.url))
    }

    async fn post_text(&self, instance: &DaemonInstance, body: &Value) -> Result<String> {
        let response = self
            .client
            .post(&instance.url)
            .basic_auth(&instance.user, Some(&instance.password))
            .json(body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            bail!("daemon {} rejected credentials (HTTP 401)", instance.url);
        }

        Ok(response.text().await?)
    }
}

/// Some daemons render NaN difficulty fields as bare `-nan`, which is not
/// JSON.
fn coerce_nan(text: &str) -> String {
    text.replace(":-nan", ":0").replace(":nan", ":0")
}

fn is_transient(err: &Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DaemonClient {
        DaemonClient::new(vec![DaemonInstance {
            url: "http://127.0.0.1:8332".into(),
            user: "user".into(),
            password: "password".into(),
        }])
        .unwrap()
    }

    #[test]
    fn rejects_empty_instance_list() {
        assert!(DaemonClient::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn rejects_non_whitelisted_method() {
        let err = client().call("stop", json!([])).await.unwrap_err();
        assert!(err.to_string().contains("not whitelisted"));
    }

    #[test]
    fn nan_is_coerced_to_zero() {
        assert_eq!(
            coerce_nan(r#"{"difficulty":-nan,"height":1}"#),
            r#"{"difficulty":0,"height":1}"#
        );
        assert_eq!(
            coerce_nan(r#"{"difficulty":nan}"#),
            r#"{"difficulty":0}"#
        );
    }

    #[test]
    fn request_ids_are_unique() {
        let client = client();
        let a = client.next_id();
        let b = client.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn rpc_failure_renders_code_and_message() {
        let failure = RpcFailure {
            code: RpcFailure::WARMING_UP,
            message: "Bitcoin is downloading blocks...".into(),
        };
        assert_eq!(
            failure.to_string(),
            "daemon RPC error -10: Bitcoin is downloading blocks..."
        );
    }
}
