use serde::Deserialize;

/// Reply to `/api/start` and `/api/stop`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub ok: bool,
    pub error: Option<String>,
    pub msg: Option<String>,
}

/// Reply to `/api/withdraw`.
///
/// A non-empty `txid` means the payout was already broadcast. Otherwise `id`
/// names a request waiting for manual processing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WithdrawReply {
    #[serde(default)]
    pub ok: bool,
    pub txid: Option<String>,
    pub id: Option<String>,
    pub error: Option<String>,
    pub note: Option<String>,
}

impl WithdrawReply {
    pub fn broadcast_txid(&self) -> Option<&str> {
        self.txid.as_deref().filter(|t| !t.is_empty())
    }
}

/// A raw GET response, as kept by the offline cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Asset {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
