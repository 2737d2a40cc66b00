/*
[INPUT]:  Address, digest, signature bytes and chain id
[OUTPUT]: Boolean validity verdicts (never errors)
[POS]:    Signing layer - offline signature verification incl. counterfactual wallets
[UPDATE]: When wallet addressing or signature envelopes change
*/

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, Signature, keccak256};
use alloy_sol_types::SolValue;
use tracing::debug;

use crate::registry::ChainRegistry;
use crate::types::WalletContext;

/// Trailer marking an ERC-6492 wrapped signature
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] = [
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64,
    0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
    0x64, 0x92,
];

const DEPLOY_SIGNATURE: &str = "deploy(address,bytes32)";

/// Wrap an owner signature so it verifies for the not-yet-deployed wallet of `owner`.
///
/// Layout: `abi.encode(factory, factoryCalldata, innerSignature) ++ ERC6492_MAGIC_SUFFIX`.
pub fn wrap_counterfactual(context: &WalletContext, owner: Address, inner: &[u8]) -> Bytes {
    let salt = keccak256(owner.into_word());
    let mut calldata = keccak256(DEPLOY_SIGNATURE.as_bytes())[..4].to_vec();
    calldata.extend_from_slice(&(owner, salt).abi_encode_params());

    let mut wrapped = (
        context.factory,
        Bytes::from(calldata),
        Bytes::copy_from_slice(inner),
    )
        .abi_encode_params();
    wrapped.extend_from_slice(&ERC6492_MAGIC_SUFFIX);
    Bytes::from(wrapped)
}

fn unwrap_counterfactual(signature: &[u8]) -> Option<(Address, Bytes)> {
    let body = signature.strip_suffix(&ERC6492_MAGIC_SUFFIX[..])?;
    let (factory, _calldata, inner) = <(Address, Bytes, Bytes)>::abi_decode_params(body).ok()?;
    Some((factory, inner))
}

/// Verifies signatures without touching chain state
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    registry: Arc<ChainRegistry>,
    context: WalletContext,
}

impl SignatureValidator {
    pub fn new(registry: Arc<ChainRegistry>, context: WalletContext) -> Self {
        Self { registry, context }
    }

    pub fn context(&self) -> &WalletContext {
        &self.context
    }

    /// Check `signature` over `digest` for `address` on `chain_id`.
    ///
    /// Accepts a plain 65-byte ECDSA signature from the owner key (the address is the
    /// key itself or its counterfactual wallet) and ERC-6492 wrapped signatures that
    /// are byte-for-byte the envelope [`wrap_counterfactual`] builds for the recovered
    /// owner under the configured context. Any malformed input yields `false`.
    pub fn is_valid_signature(
        &self,
        address: Address,
        digest: B256,
        signature: &[u8],
        chain_id: u64,
    ) -> bool {
        if !self.registry.contains(chain_id) {
            debug!(chain_id, "signature check on unregistered chain");
            return false;
        }

        match unwrap_counterfactual(signature) {
            Some((factory, inner)) => {
                if factory != self.context.factory {
                    debug!(%factory, "counterfactual signature from foreign factory");
                    return false;
                }
                let Some(owner) = self.owner_of(address, digest, &inner) else {
                    return false;
                };
                // Binds the deploy calldata and rejects non-canonical ABI padding
                let canonical = wrap_counterfactual(&self.context, owner, &inner);
                if canonical.as_ref() != signature {
                    debug!(%owner, "counterfactual envelope differs from the canonical one");
                    return false;
                }
                true
            }
            None => self.owner_of(address, digest, signature).is_some(),
        }
    }

    /// Recovered owner key, if it controls `address`
    fn owner_of(&self, address: Address, digest: B256, signature: &[u8]) -> Option<Address> {
        let owner = recover_signer(digest, signature)?;
        (owner == address || self.context.counterfactual_address(owner) == address)
            .then_some(owner)
    }
}

fn recover_signer(digest: B256, signature: &[u8]) -> Option<Address> {
    // r || s || v with v in its plain (0/1) or legacy (27/28) form only
    if signature.len() != 65 || !matches!(signature[64], 0 | 1 | 27 | 28) {
        return None;
    }
    let signature = Signature::from_raw(signature).ok()?;
    signature.recover_address_from_prehash(&digest).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Network;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    fn validator() -> SignatureValidator {
        let registry = ChainRegistry::from_networks(vec![
            Network::new(137, "polygon", "https://polygon-rpc.com").as_default(),
        ])
        .unwrap();
        SignatureValidator::new(Arc::new(registry), WalletContext::default())
    }

    #[test]
    fn test_plain_signature_for_owner_and_wallet() {
        let validator = validator();
        let key = PrivateKeySigner::random();
        let digest = keccak256(b"payload");
        let sig = key.sign_hash_sync(&digest).unwrap().as_bytes();
        let wallet = validator.context().counterfactual_address(key.address());

        assert!(validator.is_valid_signature(key.address(), digest, &sig, 137));
        assert!(validator.is_valid_signature(wallet, digest, &sig, 137));
        assert!(!validator.is_valid_signature(Address::ZERO, digest, &sig, 137));
        assert!(!validator.is_valid_signature(wallet, digest, &sig, 1));
    }

    #[test]
    fn test_counterfactual_envelope() {
        let validator = validator();
        let key = PrivateKeySigner::random();
        let digest = keccak256(b"payload");
        let inner = key.sign_hash_sync(&digest).unwrap().as_bytes();
        let wallet = validator.context().counterfactual_address(key.address());

        let wrapped = wrap_counterfactual(validator.context(), key.address(), &inner);
        assert!(wrapped.ends_with(&ERC6492_MAGIC_SUFFIX));
        assert!(validator.is_valid_signature(wallet, digest, &wrapped, 137));

        let foreign = WalletContext {
            factory: Address::repeat_byte(0x11),
            ..WalletContext::default()
        };
        let wrapped = wrap_counterfactual(&foreign, key.address(), &inner);
        assert!(!validator.is_valid_signature(wallet, digest, &wrapped, 137));
    }

    #[test]
    fn test_any_flipped_byte_is_rejected() {
        let validator = validator();
        let key = PrivateKeySigner::random();
        let digest = keccak256(b"payload");
        let plain = key.sign_hash_sync(&digest).unwrap().as_bytes().to_vec();
        let wallet = validator.context().counterfactual_address(key.address());
        let wrapped = wrap_counterfactual(validator.context(), key.address(), &plain).to_vec();

        for signature in [plain, wrapped] {
            assert!(validator.is_valid_signature(wallet, digest, &signature, 137));
            for position in 0..signature.len() {
                for mask in [0x01u8, 0x20, 0x80] {
                    let mut mutated = signature.clone();
                    mutated[position] ^= mask;
                    assert!(
                        !validator.is_valid_signature(wallet, digest, &mutated, 137),
                        "byte {position} of {} flipped with {mask:#04x} still verifies",
                        signature.len()
                    );
                }
            }
        }
    }

    #[test]
    fn test_non_canonical_recovery_id() {
        let validator = validator();
        let key = PrivateKeySigner::random();
        let digest = keccak256(b"payload");
        let mut sig = key.sign_hash_sync(&digest).unwrap().as_bytes();
        // EIP-155 style v with the same parity
        sig[64] = if sig[64] == 27 { 37 } else { 38 };
        assert!(!validator.is_valid_signature(key.address(), digest, &sig, 137));
    }

    #[test]
    fn test_garbage_is_rejected_quietly() {
        let validator = validator();
        let digest = keccak256(b"payload");
        assert!(!validator.is_valid_signature(Address::ZERO, digest, &[], 137));
        assert!(!validator.is_valid_signature(Address::ZERO, digest, &[0u8; 65], 137));
        assert!(!validator.is_valid_signature(Address::ZERO, digest, &ERC6492_MAGIC_SUFFIX, 137));
    }
}
