use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::config::Args;
use crate::core::error::{ConfigError, Error};
use crate::store::backend::RestClient;
use crate::store::memory::MemoryStore;
use crate::store::{KEY_PREFIX, TOKEN_TTL};

/// Envelope written to the backend: the credential wrapped in a one-field
/// object, serialized to text. The backend stores it as an opaque string.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    credential: String,
}

#[derive(Clone, Debug)]
enum Backend {
    Rest(RestClient),
    Memory(MemoryStore),
}

/// One-time credential hand-off between the web login flow and the desktop
/// client. The web side deposits a credential under a caller-generated
/// opaque token with `set_token`; the desktop side claims it exactly once
/// with `take_token`. Unclaimed entries expire after [`TOKEN_TTL`].
///
/// Backend selection happens once at construction: if the remote key-value
/// service is configured, entries are shared across instances with
/// server-enforced expiry; otherwise a process-local map is used.
#[derive(Clone, Debug)]
pub(crate) struct HandoffStore {
    backend: Backend,
}

impl HandoffStore {
    pub(crate) fn new(config: &Args) -> Result<Self, ConfigError> {
        match (&config.kv_rest_url, &config.kv_rest_token) {
            (Some(url), Some(token)) => {
                tracing::info!("using remote key-value backend");

                Ok(Self::with_rest(RestClient::new(url, token)?))
            }
            _ => {
                tracing::info!("key-value backend not configured, using in-process store");

                Ok(Self::in_memory())
            }
        }
    }

    pub(crate) fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::new()),
        }
    }

    pub(crate) fn with_rest(client: RestClient) -> Self {
        Self {
            backend: Backend::Rest(client),
        }
    }

    #[instrument(skip_all)]
    pub(crate) async fn set_token(&self, token: &str, credential: &str) -> Result<(), Error> {
        let key = format!("{}{}", KEY_PREFIX, token);
        let value = serde_json::to_string(&StoredCredential {
            credential: credential.to_string(),
        })?;

        match &self.backend {
            Backend::Rest(client) => client.put(&key, value, TOKEN_TTL).await?,
            Backend::Memory(store) => store.put(&key, value, TOKEN_TTL).await,
        }

        tracing::debug!("credential deposited");

        Ok(())
    }

    /// Claims the credential for `token`, destroying the entry. The first
    /// successful call returns the credential; later calls, and calls after
    /// the TTL window, observe absence.
    ///
    /// Against the remote backend, get and delete are two network calls, so
    /// duplicate concurrent takes from different instances can both read the
    /// value before either deletes it; tokens are single-use by construction,
    /// so that window is accepted. The in-process store removes the entry
    /// under a single lock, so takes within one process never race.
    #[instrument(skip_all)]
    pub(crate) async fn take_token(&self, token: &str) -> Result<Option<String>, Error> {
        let key = format!("{}{}", KEY_PREFIX, token);

        let credential = match &self.backend {
            Backend::Rest(client) => {
                let Some(raw) = client.get(&key).await? else {
                    return Ok(None);
                };

                // A malformed entry is left in place rather than deleted;
                // the TTL will reap it.
                let Some(credential) = Self::decode(&raw) else {
                    return Ok(None);
                };

                client.delete(&key).await?;

                credential
            }
            Backend::Memory(store) => {
                let Some(raw) = store.take(&key).await else {
                    return Ok(None);
                };

                let Some(credential) = Self::decode(&raw) else {
                    return Ok(None);
                };

                credential
            }
        };

        tracing::debug!("credential claimed");

        Ok(Some(credential))
    }

    fn decode(raw: &str) -> Option<String> {
        match serde_json::from_str::<StoredCredential>(raw) {
            Ok(stored) => Some(stored.credential),
            Err(e) => {
                tracing::warn!("malformed stored credential: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn first_take_returns_credential_later_takes_observe_absence() {
        let store = HandoffStore::in_memory();

        store.set_token("abc123", "jwt-payload-xyz").await.unwrap();

        assert_eq!(
            store.take_token("abc123").await.unwrap(),
            Some("jwt-payload-xyz".to_string())
        );
        assert_eq!(store.take_token("abc123").await.unwrap(), None);
        assert_eq!(store.take_token("abc123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tokens_are_isolated_from_each_other() {
        let store = HandoffStore::in_memory();

        store.set_token("tok1", "a").await.unwrap();
        store.set_token("tok2", "b").await.unwrap();

        assert_eq!(store.take_token("tok2").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.take_token("tok1").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn unclaimed_credential_expires_after_ttl() {
        let store = HandoffStore::in_memory();

        store.set_token("expiring", "v").await.unwrap();

        tokio::time::advance(Duration::from_secs(121)).await;

        assert_eq!(store.take_token("expiring").await.unwrap(), None);
    }

    #[tokio::test]
    async fn take_on_never_set_token_is_always_absent() {
        let store = HandoffStore::in_memory();

        for _ in 0..3 {
            assert_eq!(store.take_token("never-set").await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn last_set_wins_on_token_reuse() {
        let store = HandoffStore::in_memory();

        store.set_token("tok", "first").await.unwrap();
        store.set_token("tok", "second").await.unwrap();

        assert_eq!(
            store.take_token("tok").await.unwrap(),
            Some("second".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_takes_within_the_process_yield_one_credential() {
        let store = HandoffStore::in_memory();

        store.set_token("tok", "c").await.unwrap();

        let (first, second) = tokio::join!(store.take_token("tok"), store.take_token("tok"));

        let claimed: Vec<String> = [first.unwrap(), second.unwrap()]
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(claimed, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn malformed_stored_value_reads_as_absent() {
        let store = HandoffStore::in_memory();

        let Backend::Memory(memory) = &store.backend else {
            unreachable!();
        };

        memory
            .put("handoff:token:bad", "not json".to_string(), TOKEN_TTL)
            .await;

        assert_eq!(store.take_token("bad").await.unwrap(), None);
    }

    fn rest_store(server: &MockServer) -> HandoffStore {
        HandoffStore::with_rest(RestClient::new(&server.uri(), "secret").unwrap())
    }

    #[tokio::test]
    async fn rest_path_set_then_take_matches_memory_behavior() {
        let server = MockServer::start().await;
        let envelope = serde_json::json!({ "credential": "jwt-payload-xyz" }).to_string();

        Mock::given(method("POST"))
            .and(path("/set/handoff:token:abc123/ex/120"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "OK"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/get/handoff:token:abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": envelope
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/del/handoff:token:abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = rest_store(&server);

        store.set_token("abc123", "jwt-payload-xyz").await.unwrap();

        assert_eq!(
            store.take_token("abc123").await.unwrap(),
            Some("jwt-payload-xyz".to_string())
        );
    }

    #[tokio::test]
    async fn rest_path_keeps_ttl_for_tokens_with_reserved_characters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/set/handoff:token:x%3Fy/ex/120"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "OK"
            })))
            .expect(1)
            .mount(&server)
            .await;

        rest_store(&server).set_token("x?y", "v").await.unwrap();
    }

    #[tokio::test]
    async fn rest_path_leaves_malformed_stored_value_in_place() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get/handoff:token:bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "not json"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/del/handoff:token:bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": 1
            })))
            .expect(0)
            .mount(&server)
            .await;

        let store = rest_store(&server);

        assert_eq!(store.take_token("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rest_path_take_without_set_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get/handoff:token:never-set"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": null
            })))
            .mount(&server)
            .await;

        let store = rest_store(&server);

        assert_eq!(store.take_token("never-set").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rest_path_backend_failure_is_an_error_not_absence() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get/handoff:token:abc"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = rest_store(&server);

        assert!(store.take_token("abc").await.is_err());
    }
}
