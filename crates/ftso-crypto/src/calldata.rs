//! Selector registry and submission calldata codec.
//!
//! [`ProtocolCodec`] is built once and handed to every component that reads
//! or writes submission transactions. Layouts:
//!
//! | function | calldata after the selector |
//! |---|---|
//! | `commit(bytes32)` | commit hash |
//! | `reveal()` | `random (32 bytes) ‖ packed values` |
//! | `signResult(uint32,bytes32,(uint8,bytes32,bytes32))` | ABI words |
//! | `finalize(uint32,bytes32,(uint8,bytes32,bytes32)[])` | ABI words, dynamic array |

use std::collections::HashMap;

use alloy_primitives::B256;
use ftso_types::ledger::function_names;
use ftso_types::voting::{EcdsaSignature, FinalizeData, RevealData, SignatureData};
use ftso_types::VotingRoundId;

use crate::abi::{read_word, uint_word, word_to_u64, WORD};
use crate::hash::function_selector;
use crate::{CryptoError, Result};

const SELECTOR_LEN: usize = 4;

const SIGNATURES: [(&str, &str); 4] = [
    (function_names::COMMIT, "commit(bytes32)"),
    (function_names::REVEAL, "reveal()"),
    (
        function_names::SIGN_RESULT,
        "signResult(uint32,bytes32,(uint8,bytes32,bytes32))",
    ),
    (
        function_names::FINALIZE,
        "finalize(uint32,bytes32,(uint8,bytes32,bytes32)[])",
    ),
];

/// Function selectors and calldata layouts of the submission contract.
#[derive(Clone, Debug)]
pub struct ProtocolCodec {
    selectors: HashMap<&'static str, [u8; SELECTOR_LEN]>,
    names: HashMap<[u8; SELECTOR_LEN], &'static str>,
}

impl Default for ProtocolCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec {
    /// Build the registry from the canonical function signatures.
    pub fn new() -> Self {
        let mut selectors = HashMap::new();
        let mut names = HashMap::new();
        for (name, signature) in SIGNATURES {
            let selector = function_selector(signature);
            selectors.insert(name, selector);
            names.insert(selector, name);
        }
        Self { selectors, names }
    }

    /// Selector of a function by name.
    pub fn selector(&self, function_name: &str) -> Result<[u8; SELECTOR_LEN]> {
        self.selectors
            .get(function_name)
            .copied()
            .ok_or_else(|| CryptoError::UnknownFunction(function_name.to_string()))
    }

    /// Function name whose selector prefixes `input`.
    pub fn function_for_input(&self, input: &[u8]) -> Option<&'static str> {
        let selector: [u8; SELECTOR_LEN] = input.get(..SELECTOR_LEN)?.try_into().ok()?;
        self.names.get(&selector).copied()
    }

    fn with_selector(&self, function_name: &str, body: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(SELECTOR_LEN + body.len());
        out.extend_from_slice(&self.selector(function_name)?);
        out.extend_from_slice(body);
        Ok(out)
    }

    fn body<'a>(&self, function_name: &str, input: &'a [u8]) -> Result<&'a [u8]> {
        let expected = self.selector(function_name)?;
        match input.get(..SELECTOR_LEN) {
            Some(selector) if selector == expected => Ok(&input[SELECTOR_LEN..]),
            found => {
                tracing::debug!(
                    function = function_name,
                    expected = %hex::encode(expected),
                    found = %found.map(hex::encode).unwrap_or_default(),
                    "calldata selector mismatch"
                );
                Err(CryptoError::InvalidCalldata(format!(
                    "input is not a {function_name} call"
                )))
            }
        }
    }

    /// Calldata of a commit transaction.
    pub fn encode_commit(&self, commit_hash: &B256) -> Result<Vec<u8>> {
        self.with_selector(function_names::COMMIT, commit_hash.as_slice())
    }

    /// Commit hash carried by a commit transaction.
    pub fn decode_commit(&self, input: &[u8]) -> Result<B256> {
        let body = self.body(function_names::COMMIT, input)?;
        let word = read_word(body, 0)
            .ok_or_else(|| CryptoError::InvalidCalldata("commit hash missing".to_string()))?;
        Ok(B256::from(word))
    }

    /// Calldata of a reveal transaction.
    pub fn encode_reveal(&self, reveal: &RevealData) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(WORD + reveal.encoded_values.len());
        body.extend_from_slice(reveal.random.as_slice());
        body.extend_from_slice(&reveal.encoded_values);
        self.with_selector(function_names::REVEAL, &body)
    }

    /// Reveal payload carried by a reveal transaction.
    pub fn decode_reveal(&self, input: &[u8]) -> Result<RevealData> {
        let body = self.body(function_names::REVEAL, input)?;
        if body.len() < WORD {
            return Err(CryptoError::InvalidCalldata(format!(
                "reveal payload too short: {} bytes",
                body.len()
            )));
        }
        Ok(RevealData {
            random: B256::from_slice(&body[..WORD]),
            encoded_values: body[WORD..].to_vec(),
        })
    }

    /// Calldata of a result-signature transaction.
    pub fn encode_sign_result(&self, data: &SignatureData) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(5 * WORD);
        body.extend_from_slice(&uint_word(u64::from(data.epoch_id)));
        body.extend_from_slice(data.merkle_root.as_slice());
        push_signature(&mut body, &data.signature);
        self.with_selector(function_names::SIGN_RESULT, &body)
    }

    /// Signature payload carried by a result-signature transaction.
    pub fn decode_sign_result(&self, input: &[u8]) -> Result<SignatureData> {
        let body = self.body(function_names::SIGN_RESULT, input)?;
        Ok(SignatureData {
            epoch_id: read_round(body, 0)?,
            merkle_root: B256::from(word(body, 1)?),
            signature: read_signature(body, 2)?,
        })
    }

    /// Calldata of a finalization transaction.
    pub fn encode_finalize(&self, data: &FinalizeData) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity((4 + 3 * data.signatures.len()) * WORD);
        body.extend_from_slice(&uint_word(u64::from(data.epoch_id)));
        body.extend_from_slice(data.merkle_root.as_slice());
        body.extend_from_slice(&uint_word((3 * WORD) as u64));
        body.extend_from_slice(&uint_word(data.signatures.len() as u64));
        for signature in &data.signatures {
            push_signature(&mut body, signature);
        }
        self.with_selector(function_names::FINALIZE, &body)
    }

    /// Finalization payload carried by a finalization transaction.
    pub fn decode_finalize(&self, input: &[u8]) -> Result<FinalizeData> {
        let body = self.body(function_names::FINALIZE, input)?;
        let epoch_id = read_round(body, 0)?;
        let merkle_root = B256::from(word(body, 1)?);

        let offset = read_usize(body, 2)?;
        if offset % WORD != 0 {
            return Err(CryptoError::InvalidCalldata(format!(
                "unaligned array offset {offset}"
            )));
        }
        let array_start = offset / WORD;
        let count = read_usize(body, array_start)?;
        let mut signatures = Vec::with_capacity(count.min(1024));
        for i in 0..count {
            signatures.push(read_signature(body, array_start + 1 + 3 * i)?);
        }

        Ok(FinalizeData {
            epoch_id,
            merkle_root,
            signatures,
        })
    }
}

fn push_signature(out: &mut Vec<u8>, signature: &EcdsaSignature) {
    out.extend_from_slice(&uint_word(u64::from(signature.v)));
    out.extend_from_slice(signature.r.as_slice());
    out.extend_from_slice(signature.s.as_slice());
}

fn word(body: &[u8], index: usize) -> Result<[u8; WORD]> {
    read_word(body, index)
        .ok_or_else(|| CryptoError::InvalidCalldata(format!("missing word {index}")))
}

fn read_usize(body: &[u8], index: usize) -> Result<usize> {
    word_to_u64(&word(body, index)?)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| CryptoError::InvalidCalldata(format!("word {index} out of range")))
}

fn read_round(body: &[u8], index: usize) -> Result<VotingRoundId> {
    word_to_u64(&word(body, index)?)
        .and_then(|v| VotingRoundId::try_from(v).ok())
        .ok_or_else(|| CryptoError::InvalidCalldata(format!("round id at word {index} out of range")))
}

fn read_signature(body: &[u8], index: usize) -> Result<EcdsaSignature> {
    let v = word_to_u64(&word(body, index)?)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| CryptoError::InvalidCalldata(format!("v at word {index} out of range")))?;
    Ok(EcdsaSignature {
        v,
        r: B256::from(word(body, index + 1)?),
        s: B256::from(word(body, index + 2)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(n: u8) -> EcdsaSignature {
        EcdsaSignature {
            v: 27 + (n % 2),
            r: B256::repeat_byte(n),
            s: B256::repeat_byte(n.wrapping_add(100)),
        }
    }

    #[test]
    fn test_selectors_are_distinct_and_resolvable() {
        let codec = ProtocolCodec::new();
        for (name, _) in SIGNATURES {
            let selector = codec.selector(name).expect("selector");
            assert_eq!(codec.function_for_input(&selector), Some(name));
        }
        assert!(matches!(
            codec.selector("transfer"),
            Err(CryptoError::UnknownFunction(_))
        ));
        assert_eq!(codec.function_for_input(&[1, 2]), None);
    }

    #[test]
    fn test_commit_calldata() {
        let codec = ProtocolCodec::new();
        let hash = B256::repeat_byte(7);
        let input = codec.encode_commit(&hash).expect("encode");
        assert_eq!(input.len(), 36);
        assert_eq!(&input[..4], &function_selector("commit(bytes32)"));
        assert_eq!(codec.decode_commit(&input).expect("decode"), hash);
    }

    #[test]
    fn test_reveal_payload_is_random_then_values() {
        let codec = ProtocolCodec::new();
        let reveal = RevealData {
            random: B256::repeat_byte(9),
            encoded_values: vec![0x80, 0, 0, 1, 0x80, 0, 0, 2],
        };
        let input = codec.encode_reveal(&reveal).expect("encode");
        assert_eq!(&input[4..36], reveal.random.as_slice());
        assert_eq!(&input[36..], reveal.encoded_values.as_slice());
        assert_eq!(codec.decode_reveal(&input).expect("decode"), reveal);
    }

    #[test]
    fn test_short_reveal_rejected() {
        let codec = ProtocolCodec::new();
        let mut input = codec.selector(function_names::REVEAL).expect("selector").to_vec();
        input.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            codec.decode_reveal(&input),
            Err(CryptoError::InvalidCalldata(_))
        ));
    }

    #[test]
    fn test_wrong_selector_rejected() {
        let codec = ProtocolCodec::new();
        let input = codec.encode_commit(&B256::ZERO).expect("encode");
        assert!(codec.decode_reveal(&input).is_err());
        assert!(codec.decode_finalize(&input).is_err());
        // shorter than a selector
        assert!(matches!(
            codec.decode_commit(&[0x01, 0x02]),
            Err(CryptoError::InvalidCalldata(_))
        ));
    }

    #[test]
    fn test_sign_result_calldata() {
        let codec = ProtocolCodec::new();
        let data = SignatureData {
            epoch_id: 1234,
            merkle_root: B256::repeat_byte(0xcc),
            signature: sig(3),
        };
        let input = codec.encode_sign_result(&data).expect("encode");
        assert_eq!(input.len(), 4 + 5 * 32);
        assert_eq!(codec.decode_sign_result(&input).expect("decode"), data);
    }

    #[test]
    fn test_finalize_calldata_layout() {
        let codec = ProtocolCodec::new();
        let data = FinalizeData {
            epoch_id: 77,
            merkle_root: B256::repeat_byte(0xdd),
            signatures: vec![sig(1), sig(2), sig(3)],
        };
        let input = codec.encode_finalize(&data).expect("encode");
        assert_eq!(input.len(), 4 + (4 + 9) * 32);
        let body = &input[4..];
        assert_eq!(word_to_u64(&read_word(body, 2).expect("offset")), Some(96));
        assert_eq!(word_to_u64(&read_word(body, 3).expect("len")), Some(3));
        assert_eq!(codec.decode_finalize(&input).expect("decode"), data);
    }

    #[test]
    fn test_finalize_truncated_rejected() {
        let codec = ProtocolCodec::new();
        let data = FinalizeData {
            epoch_id: 1,
            merkle_root: B256::ZERO,
            signatures: vec![sig(1), sig(2)],
        };
        let mut input = codec.encode_finalize(&data).expect("encode");
        input.truncate(input.len() - 32);
        assert!(codec.decode_finalize(&input).is_err());
    }
}
