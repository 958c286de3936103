use serde::Deserialize;

/// Runtime configuration, read from `HANDOFF_`-prefixed environment
/// variables. The two `kv_rest_*` values are optional as a pair: both
/// present selects the remote key-value backend, anything else selects
/// the in-process store.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Args {
    pub(crate) log_level: String,
    pub(crate) port: u16,
    pub(crate) kv_rest_url: Option<String>,
    pub(crate) kv_rest_token: Option<String>,
}
