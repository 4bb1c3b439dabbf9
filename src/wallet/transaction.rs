//! Source Transaction Union
//!
//! Transactions built by the attestation network arrive either in the legacy
//! encoding or the versioned one. The choice is made once, when the wire
//! payload is decoded, and everything downstream works on
//! [`SourceTransaction`].

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::{
    hash::Hash,
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::{Transaction, VersionedTransaction},
};
use thiserror::Error;

/// Errors building or repairing a source transaction
#[derive(Debug, Error)]
pub enum SourceTxError {
    #[error("invalid transaction encoding: {0}")]
    Decode(String),

    #[error("transaction has no account keys")]
    NoAccountKeys,

    #[error("fee payer {0} already appears in the account keys")]
    DuplicateFeePayer(Pubkey),

    #[error("failed to serialize transaction: {0}")]
    Serialize(String),

    #[error("invalid auxiliary signer: {0}")]
    InvalidSigner(String),
}

/// A source-chain transaction in one of its two encodings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTransaction {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

impl SourceTransaction {
    /// Decode a base64 wire transaction
    pub fn decode(data: &str, versioned: bool) -> Result<Self, SourceTxError> {
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| SourceTxError::Decode(e.to_string()))?;

        if versioned {
            bincode::deserialize::<VersionedTransaction>(&bytes)
                .map(Self::Versioned)
                .map_err(|e| SourceTxError::Decode(e.to_string()))
        } else {
            bincode::deserialize::<Transaction>(&bytes)
                .map(Self::Legacy)
                .map_err(|e| SourceTxError::Decode(e.to_string()))
        }
    }

    pub fn is_versioned(&self) -> bool {
        matches!(self, Self::Versioned(_))
    }

    pub fn num_required_signatures(&self) -> usize {
        match self {
            Self::Legacy(tx) => tx.message.header.num_required_signatures as usize,
            Self::Versioned(tx) => tx.message.header().num_required_signatures as usize,
        }
    }

    pub fn account_keys(&self) -> &[Pubkey] {
        match self {
            Self::Legacy(tx) => &tx.message.account_keys,
            Self::Versioned(tx) => tx.message.static_account_keys(),
        }
    }

    fn account_keys_mut(&mut self) -> &mut Vec<Pubkey> {
        match self {
            Self::Legacy(tx) => &mut tx.message.account_keys,
            Self::Versioned(tx) => match &mut tx.message {
                VersionedMessage::Legacy(message) => &mut message.account_keys,
                VersionedMessage::V0(message) => &mut message.account_keys,
            },
        }
    }

    pub fn signatures(&self) -> &[Signature] {
        match self {
            Self::Legacy(tx) => &tx.signatures,
            Self::Versioned(tx) => &tx.signatures,
        }
    }

    fn signatures_mut(&mut self) -> &mut Vec<Signature> {
        match self {
            Self::Legacy(tx) => &mut tx.signatures,
            Self::Versioned(tx) => &mut tx.signatures,
        }
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.account_keys()
            .first()
            .copied()
            .filter(|key| *key != Pubkey::default())
    }

    pub fn recent_blockhash(&self) -> Hash {
        match self {
            Self::Legacy(tx) => tx.message.recent_blockhash,
            Self::Versioned(tx) => *tx.message.recent_blockhash(),
        }
    }

    pub fn has_recent_blockhash(&self) -> bool {
        self.recent_blockhash() != Hash::default()
    }

    /// Replace the recency anchor; existing signatures no longer verify
    pub fn set_recent_blockhash(&mut self, blockhash: Hash) {
        match self {
            Self::Legacy(tx) => tx.message.recent_blockhash = blockhash,
            Self::Versioned(tx) => tx.message.set_recent_blockhash(blockhash),
        }
    }

    /// Size the signature list to the required-signature count
    ///
    /// Both encodings index signatures by signer position, so slots that are
    /// missing are filled with the default signature and extras dropped.
    pub fn ensure_signature_slots(&mut self) {
        let required = self.num_required_signatures();
        let signatures = self.signatures_mut();
        if signatures.len() != required {
            signatures.resize(required, Signature::default());
        }
    }

    /// Install `payer` when the fee-payer slot holds the placeholder key
    ///
    /// Returns whether the payer was replaced.
    pub fn ensure_fee_payer(&mut self, payer: Pubkey) -> Result<bool, SourceTxError> {
        let keys = self.account_keys_mut();
        let Some(first) = keys.first().copied() else {
            return Err(SourceTxError::NoAccountKeys);
        };
        if first != Pubkey::default() {
            return Ok(false);
        }
        if keys.contains(&payer) {
            return Err(SourceTxError::DuplicateFeePayer(payer));
        }
        keys[0] = payer;
        Ok(true)
    }

    /// Bytes every signer signs
    pub fn message_bytes(&self) -> Vec<u8> {
        match self {
            Self::Legacy(tx) => tx.message.serialize(),
            Self::Versioned(tx) => tx.message.serialize(),
        }
    }

    /// Position of `pubkey` among the required signers
    pub fn signer_position(&self, pubkey: &Pubkey) -> Option<usize> {
        let required = self.num_required_signatures();
        self.account_keys()
            .iter()
            .take(required)
            .position(|key| key == pubkey)
    }

    /// Add one signature in its slot; false when `signer` is not required
    pub fn sign_with(&mut self, signer: &dyn Signer) -> bool {
        let Some(position) = self.signer_position(&signer.pubkey()) else {
            return false;
        };
        self.ensure_signature_slots();
        let signature = signer.sign_message(&self.message_bytes());
        self.signatures_mut()[position] = signature;
        true
    }

    /// First signature, which the chain uses as the transaction id
    pub fn signature(&self) -> Option<Signature> {
        self.signatures()
            .first()
            .copied()
            .filter(|signature| *signature != Signature::default())
    }

    pub fn is_fully_signed(&self) -> bool {
        let required = self.num_required_signatures();
        let signatures = self.signatures();
        signatures.len() == required && signatures.iter().all(|s| *s != Signature::default())
    }

    /// Wire encoding for raw submission
    pub fn serialize(&self) -> Result<Vec<u8>, SourceTxError> {
        match self {
            Self::Legacy(tx) => bincode::serialize(tx),
            Self::Versioned(tx) => bincode::serialize(tx),
        }
        .map_err(|e| SourceTxError::Serialize(e.to_string()))
    }
}

/// A transaction plus the auxiliary keypairs that must co-sign it
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub transaction: SourceTransaction,
    pub signers: Vec<Arc<Keypair>>,
}

impl UnsignedTransaction {
    pub fn new(transaction: SourceTransaction) -> Self {
        Self {
            transaction,
            signers: Vec::new(),
        }
    }

    /// Attach base58-encoded auxiliary keypairs
    pub fn with_encoded_signers(mut self, encoded: &[String]) -> Result<Self, SourceTxError> {
        for key in encoded {
            self.signers.push(Arc::new(decode_keypair(key)?));
        }
        Ok(self)
    }
}

/// Decode a base58 64-byte keypair
pub fn decode_keypair(encoded: &str) -> Result<Keypair, SourceTxError> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| SourceTxError::InvalidSigner(e.to_string()))?;
    Keypair::try_from(bytes.as_slice()).map_err(|e| SourceTxError::InvalidSigner(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use solana_sdk::{
        message::{v0, Message},
        system_instruction,
    };

    /// Legacy transfer from `from`, fee payer left as the placeholder key
    pub(crate) fn legacy_without_payer(from: &Pubkey) -> SourceTransaction {
        let ix = system_instruction::transfer(from, &Pubkey::new_unique(), 1_000);
        let message = Message::new(&[ix], Some(&Pubkey::default()));
        SourceTransaction::Legacy(Transaction {
            signatures: Vec::new(),
            message,
        })
    }

    /// Versioned transfer paid and signed by `payer`, with no anchor yet
    pub(crate) fn versioned_for(payer: &Pubkey) -> SourceTransaction {
        let ix = system_instruction::transfer(payer, &Pubkey::new_unique(), 1_000);
        let message = v0::Message::try_compile(payer, &[ix], &[], Hash::default()).unwrap();
        SourceTransaction::Versioned(VersionedTransaction {
            signatures: Vec::new(),
            message: VersionedMessage::V0(message),
        })
    }

    #[test]
    fn test_signature_slots_sized_to_required_count() {
        let from = Pubkey::new_unique();
        let mut tx = legacy_without_payer(&from);
        assert!(tx.signatures().is_empty());

        tx.ensure_signature_slots();
        // placeholder payer + transfer source
        assert_eq!(tx.signatures().len(), 2);
        assert!(!tx.is_fully_signed());

        let payer = Pubkey::new_unique();
        let mut versioned = versioned_for(&payer);
        versioned.ensure_signature_slots();
        assert_eq!(versioned.signatures().len(), 1);
    }

    #[test]
    fn test_fee_payer_repair() {
        let from = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let mut tx = legacy_without_payer(&from);
        assert_eq!(tx.fee_payer(), None);

        assert!(tx.ensure_fee_payer(payer).unwrap());
        assert_eq!(tx.fee_payer(), Some(payer));
        assert!(!tx.ensure_fee_payer(Pubkey::new_unique()).unwrap());
    }

    #[test]
    fn test_fee_payer_repair_rejects_duplicate() {
        let from = Pubkey::new_unique();
        let mut tx = legacy_without_payer(&from);
        assert!(matches!(
            tx.ensure_fee_payer(from),
            Err(SourceTxError::DuplicateFeePayer(_))
        ));
    }

    #[test]
    fn test_sign_with_places_signature_by_position() {
        let payer = Keypair::new();
        let source = Keypair::new();
        let ix = system_instruction::transfer(&source.pubkey(), &Pubkey::new_unique(), 5);
        let message = Message::new(&[ix], Some(&payer.pubkey()));
        let mut tx = SourceTransaction::Legacy(Transaction::new_unsigned(message));
        tx.set_recent_blockhash(Hash::new_unique());

        assert!(tx.sign_with(&source));
        assert_eq!(tx.signer_position(&source.pubkey()), Some(1));
        assert_eq!(tx.signature(), None);

        assert!(tx.sign_with(&payer));
        assert!(tx.is_fully_signed());
        assert!(!tx.sign_with(&Keypair::new()));

        if let SourceTransaction::Legacy(inner) = &tx {
            assert!(inner.verify().is_ok());
        }
    }

    #[test]
    fn test_decode_by_discriminator() {
        let payer = Keypair::new();
        let mut versioned = versioned_for(&payer.pubkey());
        versioned.set_recent_blockhash(Hash::new_unique());
        let encoded = BASE64.encode(versioned.serialize().unwrap());

        let decoded = SourceTransaction::decode(&encoded, true).unwrap();
        assert!(decoded.is_versioned());
        assert_eq!(decoded.recent_blockhash(), versioned.recent_blockhash());

        assert!(SourceTransaction::decode("not base64!", false).is_err());
    }

    #[test]
    fn test_decode_keypair() {
        let keypair = Keypair::new();
        let encoded = keypair.to_base58_string();
        assert_eq!(decode_keypair(&encoded).unwrap().pubkey(), keypair.pubkey());
        assert!(decode_keypair("short").is_err());

        // A bare public key is the wrong length for a keypair
        let public_only = bs58::encode(keypair.pubkey().to_bytes()).into_string();
        assert!(matches!(
            decode_keypair(&public_only),
            Err(SourceTxError::InvalidSigner(_))
        ));
    }
}
