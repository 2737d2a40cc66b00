/*
[INPUT]:  Proof address, claims and validity window
[OUTPUT]: AuthProof values and their EIP-712 typed-data encoding
[POS]:    Proof layer - proof data model
[UPDATE]: When claim fields or their typed-data layout change
*/

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::error::ProofError;
use crate::signing::typed_data::{self, TypeMap, TypedDataDomain, TypedField};

pub const ETHAUTH_DOMAIN_NAME: &str = "ETHAuth";
pub const ETHAUTH_VERSION: &str = "1";

const CLAIMS_TYPE: &str = "Claims";

/// Claims carried by a proof besides its validity window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub app: String,
    /// Origin of the relying party (`ogn` on the wire)
    #[serde(rename = "ogn", default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Caller-managed nonce (`n` on the wire)
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(rename = "v", default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    ETHAUTH_VERSION.to_string()
}

impl Claims {
    pub fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            origin: None,
            nonce: None,
            typ: None,
            version: default_version(),
        }
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Attach a random nonce
    pub fn with_random_nonce(self) -> Self {
        self.with_nonce(rand::random::<u64>())
    }
}

/// Self-issued authentication proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProof {
    pub address: Address,
    pub claims: Claims,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds, strictly after `issued_at`
    pub expires_at: i64,
    pub signature: Option<Bytes>,
}

impl AuthProof {
    /// Unsigned proof valid for `ttl_seconds` from `issued_at`
    pub fn new(
        address: Address,
        claims: Claims,
        issued_at: i64,
        ttl_seconds: i64,
    ) -> Result<Self, ProofError> {
        if ttl_seconds <= 0 {
            return Err(ProofError::InvalidTTL(ttl_seconds));
        }
        let expires_at = issued_at
            .checked_add(ttl_seconds)
            .ok_or(ProofError::InvalidTTL(ttl_seconds))?;
        Ok(Self {
            address,
            claims,
            issued_at,
            expires_at,
            signature: None,
        })
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Claims as EIP-712 typed data under the ETHAuth domain.
    ///
    /// Only present fields are declared, in the order app, iat, exp, n, typ, ogn, v.
    pub fn typed_data(&self) -> Result<TypedData, ProofError> {
        let mut fields = Vec::new();
        let mut message = serde_json::Map::new();

        if !self.claims.app.is_empty() {
            fields.push(TypedField::new("app", "string"));
            message.insert("app".to_string(), self.claims.app.clone().into());
        }
        fields.push(TypedField::new("iat", "int64"));
        message.insert("iat".to_string(), self.issued_at.to_string().into());
        fields.push(TypedField::new("exp", "int64"));
        message.insert("exp".to_string(), self.expires_at.to_string().into());
        if let Some(nonce) = self.claims.nonce {
            fields.push(TypedField::new("n", "uint64"));
            message.insert("n".to_string(), nonce.to_string().into());
        }
        if let Some(typ) = &self.claims.typ {
            fields.push(TypedField::new("typ", "string"));
            message.insert("typ".to_string(), typ.clone().into());
        }
        if let Some(origin) = &self.claims.origin {
            fields.push(TypedField::new("ogn", "string"));
            message.insert("ogn".to_string(), origin.clone().into());
        }
        fields.push(TypedField::new("v", "string"));
        message.insert("v".to_string(), self.claims.version.clone().into());

        let mut types = TypeMap::new();
        types.insert(CLAIMS_TYPE.to_string(), fields);

        let domain = TypedDataDomain {
            name: Some(ETHAUTH_DOMAIN_NAME.to_string()),
            version: Some(ETHAUTH_VERSION.to_string()),
            ..Default::default()
        };

        typed_data::build_with_primary(
            &domain,
            &types,
            CLAIMS_TYPE,
            serde_json::Value::Object(message),
        )
        .map_err(|e| ProofError::Malformed(e.to_string()))
    }

    /// Digest the proof signature covers
    pub fn digest(&self) -> Result<B256, ProofError> {
        let typed = self.typed_data()?;
        typed_data::signing_hash(&typed).map_err(|e| ProofError::Malformed(e.to_string()))
    }
}
