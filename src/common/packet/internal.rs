use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WirePacket {
    #[serde(rename = "t")]
    pub sent_at: i64,

    #[serde(rename = "c")]
    pub command: u8,

    #[serde(rename = "s")]
    pub sender: WireContact,

    // Empty for queries.
    #[serde(rename = "r", with = "serde_bytes")]
    pub response_to: Vec<u8>,

    // Left out while hashing.
    #[serde(default)]
    #[serde(rename = "h", with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub message_hash: Option<Vec<u8>>,

    #[serde(default)]
    #[serde(rename = "a")]
    pub arguments: WireArguments,
}

impl WirePacket {
    pub fn from_bytes(bytes: &[u8]) -> Result<WirePacket, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireContact {
    #[serde(default)]
    #[serde(rename = "i", with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub id: Option<Vec<u8>>,

    #[serde(rename = "a")]
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct WireArguments {
    #[serde(default)]
    #[serde(rename = "k", with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub key: Option<Vec<u8>>,

    #[serde(default)]
    #[serde(rename = "v", with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,

    #[serde(default)]
    #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<WireContact>>,

    #[serde(default)]
    #[serde(rename = "ok", skip_serializing_if = "Option::is_none")]
    pub accepted: Option<i64>,
}
