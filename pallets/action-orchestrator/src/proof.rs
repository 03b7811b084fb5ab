//! Capability-proof validation.
//!
//! A proof is a signature over a 32-byte hash. The signer is recovered from the
//! proof and accepted when it holds an orchestrator role. Signers that are
//! programmable identities get a second chance: the check is delegated to the
//! identity itself, and anything but an explicit "valid" answer is a rejection.

use crate::adapters::{ProgrammableIdentities, SignerRecovery};
use core::marker::PhantomData;
use polkadot_sdk::{sp_io, sp_runtime::traits::Convert};

/// Verdict code of an accepted proof, shared with programmable identities.
pub const PROOF_VALID_CODE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];
pub const PROOF_INVALID_CODE: [u8; 4] = [0xff, 0xff, 0xff, 0xff];
/// Interface id a programmable identity must declare to be asked for a verdict.
pub const PROOF_VALIDATION_INTERFACE: [u8; 4] = PROOF_VALID_CODE;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProofVerdict {
  Accepted,
  Rejected,
}

impl ProofVerdict {
  pub fn is_accepted(self) -> bool {
    self == ProofVerdict::Accepted
  }

  pub fn code(self) -> [u8; 4] {
    match self {
      ProofVerdict::Accepted => PROOF_VALID_CODE,
      ProofVerdict::Rejected => PROOF_INVALID_CODE,
    }
  }
}

/// How a recovered signer's proof is judged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProofValidator<AccountId> {
  /// Key-controlled identity: only role membership counts.
  PlainKey(AccountId),
  /// Programmable identity: role membership, then the identity's own verdict.
  DelegatedExternal(AccountId),
}

impl<AccountId> ProofValidator<AccountId> {
  pub fn for_signer<P: ProgrammableIdentities<AccountId>>(signer: AccountId) -> Self {
    if P::is_programmable(&signer) {
      ProofValidator::DelegatedExternal(signer)
    } else {
      ProofValidator::PlainKey(signer)
    }
  }

  pub fn signer(&self) -> &AccountId {
    match self {
      ProofValidator::PlainKey(who) | ProofValidator::DelegatedExternal(who) => who,
    }
  }

  pub fn verify<P: ProgrammableIdentities<AccountId>>(
    &self,
    hash: &[u8; 32],
    proof: &[u8],
    authorized: impl Fn(&AccountId) -> bool,
  ) -> ProofVerdict {
    if authorized(self.signer()) {
      return ProofVerdict::Accepted;
    }
    match self {
      ProofValidator::PlainKey(_) => ProofVerdict::Rejected,
      ProofValidator::DelegatedExternal(who) => {
        if !P::supports_interface(who, PROOF_VALIDATION_INTERFACE) {
          return ProofVerdict::Rejected;
        }
        match P::validate_proof(who, hash, proof) {
          Ok(code) if code == PROOF_VALID_CODE => ProofVerdict::Accepted,
          _ => ProofVerdict::Rejected,
        }
      }
    }
  }
}

/// secp256k1 recovery of 65-byte `r || s || v` proofs, `v` in {0, 1, 27, 28}.
///
/// `C` maps the recovered compressed public key to an account.
pub struct EcdsaRecovery<C>(PhantomData<C>);

impl<AccountId, C: Convert<[u8; 33], AccountId>> SignerRecovery<AccountId> for EcdsaRecovery<C> {
  fn recover(hash: &[u8; 32], proof: &[u8]) -> Option<AccountId> {
    let mut signature: [u8; 65] = proof.try_into().ok()?;
    signature[64] = match signature[64] {
      0 | 27 => 0,
      1 | 28 => 1,
      _ => return None,
    };
    sp_io::crypto::secp256k1_ecdsa_recover_compressed(&signature, hash)
      .ok()
      .map(C::convert)
  }
}
