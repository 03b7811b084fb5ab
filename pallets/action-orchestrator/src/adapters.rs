//! Adapter traits for the orchestrator's external collaborators.
//!
//! Each trait stands in for one service the orchestrator talks to but does not own:
//! the resource ledger, protocol handlers, the price oracle, the delegated-transfer
//! service and programmable identities. Runtimes wire real implementations; the `()`
//! impls keep the pallet usable where a collaborator is absent.

use crate::types::{
  BatchDelegatedTransferAuthorization, DelegatedTransferAuthorization, TransferTarget,
};
use alloc::vec::Vec;
use core::marker::PhantomData;
use frame::prelude::*;
use polkadot_sdk::frame_support::traits::{fungibles, tokens::Preservation};

/// Resource holdings, native and fungible, under one asset id space.
pub trait ResourceLedger<AccountId, AssetId, Balance> {
  fn balance(who: &AccountId, resource: AssetId) -> Balance;

  fn transfer(
    from: &AccountId,
    to: &AccountId,
    resource: AssetId,
    amount: Balance,
  ) -> Result<(), DispatchError>;
}

/// Invokes a handler with opaque parameters on behalf of `origin`.
///
/// `Ok` carries the handler's return data, `Err` its raw failure data. Any native
/// `value` has already been moved to the handler when this is called.
pub trait ActionHandler<AccountId, Balance> {
  fn invoke(
    handler: &AccountId,
    origin: &AccountId,
    params: &[u8],
    value: Balance,
  ) -> Result<Vec<u8>, Vec<u8>>;
}

/// Price-staleness and deviation checks.
pub trait PriceOracle<AccountId, Balance> {
  /// Returns the validated price, or the reason the price was rejected.
  fn validate_price(
    oracle: &AccountId,
    asset: &[u8],
    reference_price: Balance,
    max_slippage_bp: u32,
  ) -> Result<Balance, DispatchError>;
}

/// One-time authorizations that let the orchestrator move an owner's resources.
///
/// The service owns signature, nonce and deadline checks. The orchestrator only
/// observes the resulting balance deltas.
pub trait DelegatedTransferService<AccountId, AssetId, Balance, BlockNumber> {
  fn pull(
    authorization: &DelegatedTransferAuthorization<AccountId, AssetId, Balance, BlockNumber>,
    proof: &[u8],
  ) -> DispatchResult;

  fn pull_batch(
    authorization: &BatchDelegatedTransferAuthorization<AccountId, AssetId, Balance, BlockNumber>,
    targets: &[TransferTarget<AccountId, Balance>],
    proof: &[u8],
  ) -> DispatchResult;
}

/// Identities that validate proofs with their own logic instead of a plain key.
pub trait ProgrammableIdentities<AccountId> {
  fn is_programmable(who: &AccountId) -> bool;

  fn supports_interface(who: &AccountId, interface: [u8; 4]) -> bool;

  /// Returns the identity's 4-byte verdict for `proof` over `hash`.
  fn validate_proof(
    who: &AccountId,
    hash: &[u8; 32],
    proof: &[u8],
  ) -> Result<[u8; 4], DispatchError>;
}

/// Recovers the signing identity of a proof. `None` when the proof is malformed.
pub trait SignerRecovery<AccountId> {
  fn recover(hash: &[u8; 32], proof: &[u8]) -> Option<AccountId>;
}

/// `ResourceLedger` over any `fungibles` implementation, e.g. a `UnionOf` of the
/// native currency and an assets pallet.
pub struct FungiblesLedger<F>(PhantomData<F>);

type LedgerAsset<F, AccountId> = <F as fungibles::Inspect<AccountId>>::AssetId;
type LedgerBalance<F, AccountId> = <F as fungibles::Inspect<AccountId>>::Balance;

impl<AccountId, F> ResourceLedger<AccountId, LedgerAsset<F, AccountId>, LedgerBalance<F, AccountId>>
  for FungiblesLedger<F>
where
  F: fungibles::Inspect<AccountId> + fungibles::Mutate<AccountId>,
  AccountId: Eq,
{
  fn balance(who: &AccountId, resource: LedgerAsset<F, AccountId>) -> LedgerBalance<F, AccountId> {
    <F as fungibles::Inspect<AccountId>>::balance(resource, who)
  }

  fn transfer(
    from: &AccountId,
    to: &AccountId,
    resource: LedgerAsset<F, AccountId>,
    amount: LedgerBalance<F, AccountId>,
  ) -> Result<(), DispatchError> {
    <F as fungibles::Mutate<AccountId>>::transfer(
      resource,
      from,
      to,
      amount,
      Preservation::Expendable,
    )
    .map(|_| ())
  }
}

/// No-op `ResourceLedger`: every account holds nothing and transfers succeed.
impl<AccountId, AssetId, Balance: Default> ResourceLedger<AccountId, AssetId, Balance> for () {
  fn balance(_: &AccountId, _: AssetId) -> Balance {
    Balance::default()
  }

  fn transfer(_: &AccountId, _: &AccountId, _: AssetId, _: Balance) -> Result<(), DispatchError> {
    Ok(())
  }
}

impl<AccountId, Balance> ActionHandler<AccountId, Balance> for () {
  fn invoke(_: &AccountId, _: &AccountId, _: &[u8], _: Balance) -> Result<Vec<u8>, Vec<u8>> {
    Err(b"ActionHandler not configured".to_vec())
  }
}

impl<AccountId, Balance> PriceOracle<AccountId, Balance> for () {
  fn validate_price(_: &AccountId, _: &[u8], _: Balance, _: u32) -> Result<Balance, DispatchError> {
    Err(DispatchError::Other("PriceOracle not configured"))
  }
}

impl<AccountId, AssetId, Balance, BlockNumber>
  DelegatedTransferService<AccountId, AssetId, Balance, BlockNumber> for ()
{
  fn pull(
    _: &DelegatedTransferAuthorization<AccountId, AssetId, Balance, BlockNumber>,
    _: &[u8],
  ) -> DispatchResult {
    Err(DispatchError::Other("DelegatedTransferService not configured"))
  }

  fn pull_batch(
    _: &BatchDelegatedTransferAuthorization<AccountId, AssetId, Balance, BlockNumber>,
    _: &[TransferTarget<AccountId, Balance>],
    _: &[u8],
  ) -> DispatchResult {
    Err(DispatchError::Other("DelegatedTransferService not configured"))
  }
}

impl<AccountId> ProgrammableIdentities<AccountId> for () {
  fn is_programmable(_: &AccountId) -> bool {
    false
  }

  fn supports_interface(_: &AccountId, _: [u8; 4]) -> bool {
    false
  }

  fn validate_proof(_: &AccountId, _: &[u8; 32], _: &[u8]) -> Result<[u8; 4], DispatchError> {
    Err(DispatchError::Other("ProgrammableIdentities not configured"))
  }
}

impl<AccountId> SignerRecovery<AccountId> for () {
  fn recover(_: &[u8; 32], _: &[u8]) -> Option<AccountId> {
    None
  }
}
