//! Action Orchestrator Pallet
//!
//! Single trusted entry point that routes caller-submitted actions to registered
//! protocol handlers, enforcing authorization, reentrancy, price and slippage checks
//! around every handler call.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod adapters;
pub use adapters::{
  ActionHandler, DelegatedTransferService, FungiblesLedger, PriceOracle, ProgrammableIdentities,
  ResourceLedger, SignerRecovery,
};

pub mod proof;
pub use proof::{
  EcdsaRecovery, PROOF_INVALID_CODE, PROOF_VALID_CODE, PROOF_VALIDATION_INTERFACE, ProofValidator,
  ProofVerdict,
};

pub mod types;
pub use types::*;

pub mod weights;
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

use alloc::vec::Vec;

pub(crate) const LOG_TARGET: &str = "runtime::orchestrator";

#[frame::pallet]
pub mod pallet {
  use super::*;
  use frame::prelude::*;
  use polkadot_sdk::{
    frame_support::{
      PalletId,
      storage::{TransactionOutcome, with_transaction},
      traits::EnsureOrigin,
    },
    sp_runtime::traits::{AccountIdConversion, CheckedAdd, Saturating, Zero},
  };

  pub type ActionOf<T> =
    Action<<T as frame_system::Config>::AccountId, <T as Config>::AssetId, <T as Config>::Balance>;
  pub type ConditionalActionOf<T> = ConditionalAction<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;
  pub type OrchestratorCallOf<T> = OrchestratorCall<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;
  pub type DelegatedTransferAuthorizationOf<T> = DelegatedTransferAuthorization<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
    BlockNumberFor<T>,
  >;
  pub type BatchDelegatedTransferAuthorizationOf<T> = BatchDelegatedTransferAuthorization<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
    BlockNumberFor<T>,
  >;
  pub type TransferTargetOf<T> =
    TransferTarget<<T as frame_system::Config>::AccountId, <T as Config>::Balance>;
  pub type ContextOf<T> =
    InvocationContext<<T as frame_system::Config>::AccountId, <T as Config>::Balance>;
  pub type FailureOf<T> = ExecutionFailure<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;

  #[pallet::config]
  pub trait Config: frame_system::Config {
    type AssetId: Parameter + Member + Copy + MaybeSerializeDeserialize + MaxEncodedLen;

    type Balance: Parameter
      + Member
      + AtLeast32BitUnsigned
      + Default
      + Copy
      + MaybeSerializeDeserialize
      + MaxEncodedLen;

    /// Asset id of the native currency, used for attached value
    #[pallet::constant]
    type NativeAsset: Get<Self::AssetId>;

    type Ledger: ResourceLedger<Self::AccountId, Self::AssetId, Self::Balance>;

    /// Invoker for registered handlers and allow-listed direct-call targets
    type Handlers: ActionHandler<Self::AccountId, Self::Balance>;

    type PriceOracle: PriceOracle<Self::AccountId, Self::Balance>;

    type DelegatedTransfers: DelegatedTransferService<
        Self::AccountId,
        Self::AssetId,
        Self::Balance,
        BlockNumberFor<Self>,
      >;

    type SignerRecovery: SignerRecovery<Self::AccountId>;

    type ProgrammableIdentities: ProgrammableIdentities<Self::AccountId>;

    /// Governance origin, also accepted wherever the primary authority is
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    #[pallet::constant]
    type PalletId: Get<PalletId>;

    #[pallet::constant]
    type MaxBatchLength: Get<u32>;

    #[pallet::constant]
    type MaxMulticallLength: Get<u32>;

    /// Oracle deviation bound applied when an action leaves `max_slippage_bp` at zero
    #[pallet::constant]
    type DefaultMaxSlippageBp: Get<u32>;

    /// Rounding drift tolerated between requested and received delegated pulls
    #[pallet::constant]
    type PullTolerance: Get<Self::Balance>;

    type WeightInfo: WeightInfo;

    /// Helper for benchmarking
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::types::BenchmarkHelper<
        Self::AccountId,
        Self::AssetId,
        Self::Balance,
      >;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  /// Capability registry: protocol name to handler
  #[pallet::storage]
  pub type Protocols<T: Config> =
    StorageMap<_, Blake2_128Concat, ProtocolName, T::AccountId, OptionQuery>;

  /// Handlers that may be called, by name or directly
  #[pallet::storage]
  pub type AllowedHandlers<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

  #[pallet::storage]
  pub type PrimaryAuthority<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

  #[pallet::storage]
  pub type ApprovedAuthorities<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

  #[pallet::storage]
  pub type EmergencyOperators<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

  #[pallet::storage]
  pub type Paused<T: Config> = StorageValue<_, bool, ValueQuery>;

  /// Reentrancy latch, `Active` while a standalone invocation is running
  #[pallet::storage]
  pub type ActivityLatch<T: Config> = StorageValue<_, LatchState, ValueQuery>;

  #[pallet::storage]
  pub type PriceOracleAccount<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    ProtocolRegistered {
      name: ProtocolName,
      handler: T::AccountId,
    },
    ProtocolUnregistered {
      name: ProtocolName,
      handler: T::AccountId,
    },
    HandlerAllowanceSet {
      handler: T::AccountId,
      allowed: bool,
    },
    ApprovedAuthoritySet {
      who: T::AccountId,
      approved: bool,
    },
    EmergencyOperatorSet {
      who: T::AccountId,
      enabled: bool,
    },
    PrimaryAuthorityTransferred {
      previous: Option<T::AccountId>,
      new: T::AccountId,
    },
    PriceOracleSet {
      oracle: Option<T::AccountId>,
    },
    PauseToggled {
      paused: bool,
      by: T::AccountId,
      reason: PauseReason,
    },
    /// A handler was invoked for an action, successfully or not
    ActionExecuted {
      protocol: ProtocolName,
      method: MethodLabel,
      success: bool,
    },
    PriceValidated {
      asset: PriceLabel,
      price: T::Balance,
      min_output: T::Balance,
    },
    /// Output fell short of the action's floor; the invocation aborts right after
    SlippageDetected {
      protocol: ProtocolName,
      resource: T::AssetId,
      expected: T::Balance,
      actual: T::Balance,
    },
    ResourceForwarded {
      resource: T::AssetId,
      recipient: T::AccountId,
      amount: T::Balance,
    },
    BatchExecuted {
      total: u32,
      succeeded: u32,
    },
    ConditionNotExecuted {
      protocol: ProtocolName,
      guard_resource: T::AssetId,
      required: T::Balance,
      available: T::Balance,
    },
    MulticallExecuted {
      calls: u32,
      total_value: T::Balance,
    },
    DirectCallExecuted {
      target: T::AccountId,
      success: bool,
    },
    DelegatedTransferCompleted {
      owner: T::AccountId,
      resource: T::AssetId,
      destination: T::AccountId,
      requested: T::Balance,
      received: T::Balance,
    },
    FundsRecovered {
      resource: T::AssetId,
      amount: T::Balance,
      destination: T::AccountId,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// No handler is registered under the protocol name
    ProtocolNotFound,
    /// Caller is neither an approved authority nor the orchestrator itself
    OnlySolver,
    OnlyEmergencyOperator,
    OnlyPrimaryAuthority,
    ContractPaused,
    /// A standalone invocation is already running
    ReentrantCall,
    /// A handler reported failure for an action that may not fail
    ActionFailed,
    DirectCallFailed,
    SlippageExceeded,
    PriceValidationFailed,
    /// Delegated pull delivered less than requested beyond the tolerance
    InsufficientPull,
    ConditionNotMet,
    LengthMismatch,
    ValueMismatch,
    BatchTooLarge,
    HandlerNotAllowed,
    InvalidDestination,
    NotAuthorizationOwner,
  }

  impl<T: Config> From<Error<T>> for ExecutionFailure<T::AccountId, T::AssetId, T::Balance> {
    fn from(error: Error<T>) -> Self {
      ExecutionFailure::new(error, FailureContext::None)
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Dispatch one action; a handler failure aborts unless the action is skippable
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::execute_action())]
    pub fn execute_action(origin: OriginFor<T>, action: ActionOf<T>) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_execute_action(&ContextOf::<T>::standalone(who), &action)
        .map(|_| ())
        .map_err(Self::report)
    }

    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::execute_batch(actions.len() as u32))]
    pub fn execute_batch(
      origin: OriginFor<T>,
      actions: BoundedVec<ActionOf<T>, T::MaxBatchLength>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_execute_batch(&ContextOf::<T>::standalone(who), &actions)
        .map(|_| ())
        .map_err(Self::report)
    }

    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::execute_conditional())]
    pub fn execute_conditional(
      origin: OriginFor<T>,
      conditional: ConditionalActionOf<T>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_execute_conditional(&ContextOf::<T>::standalone(who), &conditional)
        .map(|_| ())
        .map_err(Self::report)
    }

    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::execute_conditional_batch(conditionals.len() as u32))]
    pub fn execute_conditional_batch(
      origin: OriginFor<T>,
      conditionals: BoundedVec<ConditionalActionOf<T>, T::MaxBatchLength>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_execute_conditional_batch(&ContextOf::<T>::standalone(who), &conditionals)
        .map(|_| ())
        .map_err(Self::report)
    }

    /// Run several orchestrator entry points in one invocation, funding them with
    /// `total_value` of the caller's native balance.
    #[pallet::call_index(4)]
    #[pallet::weight(Pallet::<T>::multicall_weight(calls))]
    pub fn multicall_with_value(
      origin: OriginFor<T>,
      calls: BoundedVec<OrchestratorCallOf<T>, T::MaxMulticallLength>,
      values: BoundedVec<T::Balance, T::MaxMulticallLength>,
      total_value: T::Balance,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_multicall_with_value(&ContextOf::<T>::standalone(who), &calls, &values, total_value)
        .map_err(Self::report)
    }

    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::direct_call())]
    pub fn direct_call(
      origin: OriginFor<T>,
      target: T::AccountId,
      data: EncodedParams,
      value: T::Balance,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_direct_call(&ContextOf::<T>::standalone(who), &target, &data, value)
        .map(|_| ())
        .map_err(Self::report)
    }

    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::direct_call_with_forwarding())]
    pub fn direct_call_with_forwarding(
      origin: OriginFor<T>,
      target: T::AccountId,
      data: EncodedParams,
      value: T::Balance,
      resource: T::AssetId,
      recipient: Option<T::AccountId>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_direct_call_with_forwarding(
        &ContextOf::<T>::standalone(who),
        &target,
        &data,
        value,
        resource,
        recipient,
      )
      .map(|_| ())
      .map_err(Self::report)
    }

    /// Pull the owner's resources through a delegated authorization, then dispatch
    #[pallet::call_index(7)]
    #[pallet::weight(T::WeightInfo::execute_with_delegated_transfer())]
    pub fn execute_with_delegated_transfer(
      origin: OriginFor<T>,
      authorization: DelegatedTransferAuthorizationOf<T>,
      proof: ProofBytes,
      action: ActionOf<T>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_execute_with_delegated_transfer(
        &ContextOf::<T>::standalone(who),
        &authorization,
        &proof,
        &action,
      )
      .map(|_| ())
      .map_err(Self::report)
    }

    #[pallet::call_index(8)]
    #[pallet::weight(T::WeightInfo::execute_batch_with_delegated_transfer(actions.len() as u32))]
    pub fn execute_batch_with_delegated_transfer(
      origin: OriginFor<T>,
      authorization: BatchDelegatedTransferAuthorizationOf<T>,
      targets: BoundedVec<TransferTargetOf<T>, ConstU32<16>>,
      proof: ProofBytes,
      actions: BoundedVec<ActionOf<T>, T::MaxBatchLength>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_execute_batch_with_delegated_transfer(
        &ContextOf::<T>::standalone(who),
        &authorization,
        &targets,
        &proof,
        &actions,
      )
      .map(|_| ())
      .map_err(Self::report)
    }

    /// Map `name` to `handler` and allow-list the handler, overwriting any previous entry
    #[pallet::call_index(10)]
    #[pallet::weight(T::WeightInfo::register_protocol())]
    pub fn register_protocol(
      origin: OriginFor<T>,
      name: ProtocolName,
      handler: T::AccountId,
    ) -> DispatchResult {
      Self::ensure_admin(origin)?;
      Protocols::<T>::insert(&name, &handler);
      AllowedHandlers::<T>::insert(&handler, ());
      Self::deposit_event(Event::ProtocolRegistered { name, handler });
      Ok(())
    }

    #[pallet::call_index(11)]
    #[pallet::weight(T::WeightInfo::unregister_protocol())]
    pub fn unregister_protocol(origin: OriginFor<T>, name: ProtocolName) -> DispatchResult {
      Self::ensure_admin(origin)?;
      let handler = Protocols::<T>::take(&name).ok_or(Error::<T>::ProtocolNotFound)?;
      AllowedHandlers::<T>::remove(&handler);
      Self::deposit_event(Event::ProtocolUnregistered { name, handler });
      Ok(())
    }

    #[pallet::call_index(12)]
    #[pallet::weight(T::WeightInfo::set_handler_allowed())]
    pub fn set_handler_allowed(
      origin: OriginFor<T>,
      handler: T::AccountId,
      allowed: bool,
    ) -> DispatchResult {
      Self::ensure_admin(origin)?;
      if allowed {
        AllowedHandlers::<T>::insert(&handler, ());
      } else {
        AllowedHandlers::<T>::remove(&handler);
      }
      Self::deposit_event(Event::HandlerAllowanceSet { handler, allowed });
      Ok(())
    }

    #[pallet::call_index(13)]
    #[pallet::weight(T::WeightInfo::set_approved_authority())]
    pub fn set_approved_authority(
      origin: OriginFor<T>,
      who: T::AccountId,
      approved: bool,
    ) -> DispatchResult {
      Self::ensure_admin(origin)?;
      if approved {
        ApprovedAuthorities::<T>::insert(&who, ());
      } else {
        ApprovedAuthorities::<T>::remove(&who);
      }
      Self::deposit_event(Event::ApprovedAuthoritySet { who, approved });
      Ok(())
    }

    #[pallet::call_index(14)]
    #[pallet::weight(T::WeightInfo::set_emergency_operator())]
    pub fn set_emergency_operator(
      origin: OriginFor<T>,
      who: T::AccountId,
      enabled: bool,
    ) -> DispatchResult {
      Self::ensure_admin(origin)?;
      if enabled {
        EmergencyOperators::<T>::insert(&who, ());
      } else {
        EmergencyOperators::<T>::remove(&who);
      }
      Self::deposit_event(Event::EmergencyOperatorSet { who, enabled });
      Ok(())
    }

    /// Set or clear the oracle consulted for actions that carry a price label
    #[pallet::call_index(15)]
    #[pallet::weight(T::WeightInfo::set_price_oracle())]
    pub fn set_price_oracle(origin: OriginFor<T>, oracle: Option<T::AccountId>) -> DispatchResult {
      Self::ensure_admin(origin)?;
      PriceOracleAccount::<T>::set(oracle.clone());
      Self::deposit_event(Event::PriceOracleSet { oracle });
      Ok(())
    }

    #[pallet::call_index(16)]
    #[pallet::weight(T::WeightInfo::pause())]
    pub fn pause(origin: OriginFor<T>, reason: PauseReason) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::set_paused(who, true, reason)
    }

    #[pallet::call_index(17)]
    #[pallet::weight(T::WeightInfo::unpause())]
    pub fn unpause(origin: OriginFor<T>, reason: PauseReason) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::set_paused(who, false, reason)
    }

    /// Move stray holdings out of the orchestrator account
    #[pallet::call_index(18)]
    #[pallet::weight(T::WeightInfo::recover_funds())]
    pub fn recover_funds(
      origin: OriginFor<T>,
      resource: T::AssetId,
      amount: T::Balance,
      destination: T::AccountId,
    ) -> DispatchResult {
      Self::ensure_admin(origin)?;
      T::Ledger::transfer(&Self::account_id(), &destination, resource, amount)?;
      Self::deposit_event(Event::FundsRecovered {
        resource,
        amount,
        destination,
      });
      Ok(())
    }

    #[pallet::call_index(19)]
    #[pallet::weight(T::WeightInfo::transfer_primary_authority())]
    pub fn transfer_primary_authority(origin: OriginFor<T>, new: T::AccountId) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let previous = PrimaryAuthority::<T>::get();
      PrimaryAuthority::<T>::put(&new);
      Self::deposit_event(Event::PrimaryAuthorityTransferred { previous, new });
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    pub fn lookup_protocol(name: &ProtocolName) -> Option<T::AccountId> {
      Protocols::<T>::get(name)
    }

    pub fn is_allowed_handler(who: &T::AccountId) -> bool {
      AllowedHandlers::<T>::contains_key(who)
    }

    pub fn is_primary_authority(who: &T::AccountId) -> bool {
      PrimaryAuthority::<T>::get().as_ref() == Some(who)
    }

    /// Primary authority, approved authorities and the orchestrator's own account
    pub fn is_authority(who: &T::AccountId) -> bool {
      Self::is_primary_authority(who)
        || ApprovedAuthorities::<T>::contains_key(who)
        || *who == Self::account_id()
    }

    pub fn is_emergency_operator(who: &T::AccountId) -> bool {
      EmergencyOperators::<T>::contains_key(who) || Self::is_primary_authority(who)
    }

    pub fn is_paused() -> bool {
      Paused::<T>::get()
    }

    fn holds_any_role(who: &T::AccountId) -> bool {
      Self::is_primary_authority(who)
        || ApprovedAuthorities::<T>::contains_key(who)
        || EmergencyOperators::<T>::contains_key(who)
    }

    pub fn ensure_authority(who: &T::AccountId) -> Result<(), Error<T>> {
      ensure!(Self::is_authority(who), Error::<T>::OnlySolver);
      Ok(())
    }

    pub fn ensure_emergency_authority(who: &T::AccountId) -> Result<(), Error<T>> {
      ensure!(
        Self::is_emergency_operator(who),
        Error::<T>::OnlyEmergencyOperator
      );
      Ok(())
    }

    pub fn ensure_not_paused() -> Result<(), Error<T>> {
      ensure!(!Self::is_paused(), Error::<T>::ContractPaused);
      Ok(())
    }

    fn ensure_admin(origin: OriginFor<T>) -> DispatchResult {
      match T::AdminOrigin::try_origin(origin) {
        Ok(_) => Ok(()),
        Err(origin) => {
          let who = ensure_signed(origin)?;
          ensure!(
            Self::is_primary_authority(&who),
            Error::<T>::OnlyPrimaryAuthority
          );
          Ok(())
        }
      }
    }

    fn set_paused(who: T::AccountId, paused: bool, reason: PauseReason) -> DispatchResult {
      Self::ensure_emergency_authority(&who)?;
      Paused::<T>::put(paused);
      Self::deposit_event(Event::PauseToggled {
        paused,
        by: who,
        reason,
      });
      Ok(())
    }

    /// Logs the failure context and keeps the error kind for the dispatch result.
    fn report(failure: FailureOf<T>) -> DispatchError {
      log::warn!(
        target: LOG_TARGET,
        "invocation aborted with {:?}: {:?}",
        failure.error,
        failure.context
      );
      failure.error
    }

    /// Accepts `proof` over `hash` when its signer holds a role, or when the signer is
    /// a programmable identity that vouches for the proof itself.
    ///
    /// Delegated-transfer signers are drawn from the same role sets, so role membership
    /// covers them too. Membership is checked regardless of the pause flag.
    pub fn validate_proof(hash: &[u8; 32], proof: &[u8]) -> ProofVerdict {
      let Some(signer) = T::SignerRecovery::recover(hash, proof) else {
        return ProofVerdict::Rejected;
      };
      ProofValidator::for_signer::<T::ProgrammableIdentities>(signer)
        .verify::<T::ProgrammableIdentities>(hash, proof, Self::holds_any_role)
    }

    /// Proof check in the programmable-identity convention.
    pub fn is_valid_signature(hash: &[u8; 32], proof: &[u8]) -> [u8; 4] {
      Self::validate_proof(hash, proof).code()
    }

    /// Weight of a multicall, its own overhead plus every sub-call.
    pub fn multicall_weight(calls: &[OrchestratorCallOf<T>]) -> Weight {
      calls.iter().fold(
        T::WeightInfo::multicall_with_value(calls.len() as u32),
        |total, call| total.saturating_add(Self::call_weight(call)),
      )
    }

    fn call_weight(call: &OrchestratorCallOf<T>) -> Weight {
      match call {
        OrchestratorCall::ExecuteAction { .. } => T::WeightInfo::execute_action(),
        OrchestratorCall::ExecuteBatch { actions } => {
          T::WeightInfo::execute_batch(actions.len() as u32)
        }
        OrchestratorCall::ExecuteConditional { .. } => T::WeightInfo::execute_conditional(),
        OrchestratorCall::ExecuteConditionalBatch { conditionals } => {
          T::WeightInfo::execute_conditional_batch(conditionals.len() as u32)
        }
        OrchestratorCall::DirectCall { .. } => T::WeightInfo::direct_call(),
        OrchestratorCall::DirectCallWithForwarding { .. } => {
          T::WeightInfo::direct_call_with_forwarding()
        }
      }
    }

    /// Native value the sub-call hands to handlers.
    fn native_value_of(call: &OrchestratorCallOf<T>) -> T::Balance {
      match call {
        OrchestratorCall::ExecuteAction { action } => action.value,
        OrchestratorCall::ExecuteBatch { actions } => actions
          .iter()
          .fold(T::Balance::zero(), |acc, action| acc.saturating_add(action.value)),
        OrchestratorCall::ExecuteConditional { conditional } => conditional.action.value,
        OrchestratorCall::ExecuteConditionalBatch { conditionals } => conditionals
          .iter()
          .fold(T::Balance::zero(), |acc, c| acc.saturating_add(c.action.value)),
        OrchestratorCall::DirectCall { value, .. }
        | OrchestratorCall::DirectCallWithForwarding { value, .. } => *value,
      }
    }

    /// Reentrancy latch. Sub-calls of a running multicall pass straight through.
    fn guarded<R>(
      ctx: &ContextOf<T>,
      f: impl FnOnce() -> Result<R, FailureOf<T>>,
    ) -> Result<R, FailureOf<T>> {
      if ctx.in_batch() {
        return f();
      }
      ensure!(
        ActivityLatch::<T>::get() == LatchState::Idle,
        Error::<T>::ReentrantCall
      );
      ActivityLatch::<T>::put(LatchState::Active);
      let result = f();
      ActivityLatch::<T>::put(LatchState::Idle);
      result
    }

    /// Latch, pause and authority gates shared by every dispatching entry point.
    fn entry<R>(
      ctx: &ContextOf<T>,
      f: impl FnOnce() -> Result<R, FailureOf<T>>,
    ) -> Result<R, FailureOf<T>> {
      Self::guarded(ctx, || {
        Self::ensure_not_paused()?;
        Self::ensure_authority(&ctx.caller)?;
        f()
      })
    }

    pub fn do_execute_action(
      ctx: &ContextOf<T>,
      action: &ActionOf<T>,
    ) -> Result<ActionOutcome, FailureOf<T>> {
      Self::entry(ctx, || Self::dispatch_action(ctx, action, false))
    }

    /// Returns the number of actions that succeeded.
    pub fn do_execute_batch(
      ctx: &ContextOf<T>,
      actions: &[ActionOf<T>],
    ) -> Result<u32, FailureOf<T>> {
      Self::entry(ctx, || Self::run_batch(ctx, actions))
    }

    pub fn do_execute_conditional(
      ctx: &ContextOf<T>,
      conditional: &ConditionalActionOf<T>,
    ) -> Result<ActionOutcome, FailureOf<T>> {
      Self::entry(ctx, || {
        Self::dispatch_guarded(ctx, &conditional.action, Some(conditional), false)
      })
    }

    pub fn do_execute_conditional_batch(
      ctx: &ContextOf<T>,
      conditionals: &[ConditionalActionOf<T>],
    ) -> Result<u32, FailureOf<T>> {
      Self::entry(ctx, || {
        ensure!(
          conditionals.len() as u32 <= T::MaxBatchLength::get(),
          Error::<T>::BatchTooLarge
        );
        let mut succeeded = 0u32;
        for conditional in conditionals {
          match Self::dispatch_batch_item(ctx, &conditional.action, Some(conditional)) {
            Ok(true) => succeeded = succeeded.saturating_add(1),
            Ok(false) => {}
            // An unmet guard is skipped like a failed handler call
            Err(failure)
              if conditional.action.skip_on_failure
                && matches!(failure.context, FailureContext::Guard { .. }) => {}
            Err(failure) => return Err(failure),
          }
        }
        Self::deposit_event(Event::BatchExecuted {
          total: conditionals.len() as u32,
          succeeded,
        });
        Ok(succeeded)
      })
    }

    pub fn do_multicall_with_value(
      ctx: &ContextOf<T>,
      calls: &[OrchestratorCallOf<T>],
      values: &[T::Balance],
      total_value: T::Balance,
    ) -> Result<(), FailureOf<T>> {
      Self::entry(ctx, || {
        ensure!(calls.len() == values.len(), Error::<T>::LengthMismatch);
        ensure!(
          calls.len() as u32 <= T::MaxMulticallLength::get(),
          Error::<T>::BatchTooLarge
        );
        let supplied = values
          .iter()
          .try_fold(T::Balance::zero(), |acc, value| acc.checked_add(value));
        if supplied != Some(total_value) {
          return Err(ExecutionFailure::new(
            Error::<T>::ValueMismatch,
            FailureContext::Value {
              expected: total_value,
              supplied,
            },
          ));
        }
        if !total_value.is_zero() {
          T::Ledger::transfer(
            &ctx.caller,
            &Self::account_id(),
            T::NativeAsset::get(),
            total_value,
          )?;
        }
        for (call, value) in calls.iter().zip(values) {
          let sub_ctx = ContextOf::<T>::batched(ctx.caller.clone(), *value);
          Self::dispatch_orchestrator_call(&sub_ctx, call)?;
        }
        Self::deposit_event(Event::MulticallExecuted {
          calls: calls.len() as u32,
          total_value,
        });
        Ok(())
      })
    }

    /// Runs one multicall item through the matching entry point. The item may not hand
    /// handlers more native value than was attached to it.
    fn dispatch_orchestrator_call(
      ctx: &ContextOf<T>,
      call: &OrchestratorCallOf<T>,
    ) -> Result<(), FailureOf<T>> {
      let spent = Self::native_value_of(call);
      ensure!(
        spent <= ctx.attached_value,
        ExecutionFailure::new(
          Error::<T>::ValueMismatch,
          FailureContext::Value {
            expected: spent,
            supplied: Some(ctx.attached_value),
          },
        )
      );
      match call {
        OrchestratorCall::ExecuteAction { action } => {
          Self::do_execute_action(ctx, action).map(|_| ())
        }
        OrchestratorCall::ExecuteBatch { actions } => {
          Self::do_execute_batch(ctx, actions).map(|_| ())
        }
        OrchestratorCall::ExecuteConditional { conditional } => {
          Self::do_execute_conditional(ctx, conditional).map(|_| ())
        }
        OrchestratorCall::ExecuteConditionalBatch { conditionals } => {
          Self::do_execute_conditional_batch(ctx, conditionals).map(|_| ())
        }
        OrchestratorCall::DirectCall {
          target,
          data,
          value,
        } => Self::do_direct_call(ctx, target, data, *value).map(|_| ()),
        OrchestratorCall::DirectCallWithForwarding {
          target,
          data,
          value,
          resource,
          recipient,
        } => Self::do_direct_call_with_forwarding(
          ctx,
          target,
          data,
          *value,
          *resource,
          recipient.clone(),
        )
        .map(|_| ()),
      }
    }

    pub fn do_direct_call(
      ctx: &ContextOf<T>,
      target: &T::AccountId,
      data: &[u8],
      value: T::Balance,
    ) -> Result<Vec<u8>, FailureOf<T>> {
      Self::entry(ctx, || Self::run_direct_call(target, data, value))
    }

    /// Direct call, then the orchestrator's whole `resource` balance goes to `recipient`
    /// (the caller when unset).
    pub fn do_direct_call_with_forwarding(
      ctx: &ContextOf<T>,
      target: &T::AccountId,
      data: &[u8],
      value: T::Balance,
      resource: T::AssetId,
      recipient: Option<T::AccountId>,
    ) -> Result<Vec<u8>, FailureOf<T>> {
      Self::entry(ctx, || {
        let return_data = Self::run_direct_call(target, data, value)?;
        let recipient = recipient.unwrap_or_else(|| ctx.caller.clone());
        Self::forward_balance(resource, &recipient)?;
        Ok(return_data)
      })
    }

    pub fn do_execute_with_delegated_transfer(
      ctx: &ContextOf<T>,
      authorization: &DelegatedTransferAuthorizationOf<T>,
      proof: &[u8],
      action: &ActionOf<T>,
    ) -> Result<ActionOutcome, FailureOf<T>> {
      Self::entry(ctx, || {
        Self::pull_delegated(&ctx.caller, authorization, proof)?;
        Self::dispatch_action(ctx, action, false)
      })
    }

    pub fn do_execute_batch_with_delegated_transfer(
      ctx: &ContextOf<T>,
      authorization: &BatchDelegatedTransferAuthorizationOf<T>,
      targets: &[TransferTargetOf<T>],
      proof: &[u8],
      actions: &[ActionOf<T>],
    ) -> Result<u32, FailureOf<T>> {
      Self::entry(ctx, || {
        Self::pull_delegated_batch(&ctx.caller, authorization, targets, proof)?;
        Self::run_batch(ctx, actions)
      })
    }

    fn run_batch(ctx: &ContextOf<T>, actions: &[ActionOf<T>]) -> Result<u32, FailureOf<T>> {
      ensure!(
        actions.len() as u32 <= T::MaxBatchLength::get(),
        Error::<T>::BatchTooLarge
      );
      let mut succeeded = 0u32;
      for action in actions {
        if Self::dispatch_batch_item(ctx, action, None)? {
          succeeded = succeeded.saturating_add(1);
        }
      }
      Self::deposit_event(Event::BatchExecuted {
        total: actions.len() as u32,
        succeeded,
      });
      Ok(succeeded)
    }

    /// Batch items never abort inside the dispatcher; a failed item aborts the batch
    /// here unless it is skippable. Returns whether the item succeeded.
    fn dispatch_batch_item(
      ctx: &ContextOf<T>,
      action: &ActionOf<T>,
      guard: Option<&ConditionalActionOf<T>>,
    ) -> Result<bool, FailureOf<T>> {
      match Self::dispatch_guarded(ctx, action, guard, true)? {
        ActionOutcome::Succeeded { .. } => Ok(true),
        ActionOutcome::Failed { .. } if action.skip_on_failure => Ok(false),
        ActionOutcome::Failed { return_data } => Err(ExecutionFailure::new(
          Error::<T>::ActionFailed,
          FailureContext::Action {
            protocol: action.protocol.clone(),
            method: action.method.clone(),
            return_data,
          },
        )),
      }
    }

    /// Emits `ConditionNotExecuted` and fails with `ConditionNotMet` when the
    /// orchestrator holds less of the guard resource than required.
    fn check_guard(conditional: &ConditionalActionOf<T>) -> Result<(), FailureOf<T>> {
      let available = T::Ledger::balance(&Self::account_id(), conditional.guard_resource);
      if available >= conditional.guard_min_balance {
        return Ok(());
      }
      Self::deposit_event(Event::ConditionNotExecuted {
        protocol: conditional.action.protocol.clone(),
        guard_resource: conditional.guard_resource,
        required: conditional.guard_min_balance,
        available,
      });
      Err(ExecutionFailure::new(
        Error::<T>::ConditionNotMet,
        FailureContext::Guard {
          resource: conditional.guard_resource,
          required: conditional.guard_min_balance,
          available,
        },
      ))
    }

    /// Core dispatch of one action: resolve, price check, handler call, then the
    /// output floor and forwarding. With `allow_failure` a handler failure is
    /// reported as `ActionOutcome::Failed` instead of aborting.
    pub fn dispatch_action(
      ctx: &ContextOf<T>,
      action: &ActionOf<T>,
      allow_failure: bool,
    ) -> Result<ActionOutcome, FailureOf<T>> {
      Self::dispatch_guarded(ctx, action, None, allow_failure)
    }

    /// [`Self::dispatch_action`] with an optional balance guard. The guard is read after
    /// the oracle call, so no external call sits between it and the handler.
    fn dispatch_guarded(
      ctx: &ContextOf<T>,
      action: &ActionOf<T>,
      guard: Option<&ConditionalActionOf<T>>,
      allow_failure: bool,
    ) -> Result<ActionOutcome, FailureOf<T>> {
      let handler =
        Self::lookup_protocol(&action.protocol).ok_or(Error::<T>::ProtocolNotFound)?;
      if let Some(asset) = &action.price_asset {
        Self::check_price(asset, action)?;
      }
      if let Some(conditional) = guard {
        Self::check_guard(conditional)?;
      }
      let me = Self::account_id();
      let snapshot = match action.resource {
        Some(resource) if !action.min_output_amount.is_zero() => {
          Some((resource, T::Ledger::balance(&me, resource)))
        }
        _ => None,
      };

      let return_data = match Self::invoke_handler(&handler, &action.params, action.value)? {
        Ok(return_data) => return_data,
        Err(return_data) => {
          Self::deposit_event(Event::ActionExecuted {
            protocol: action.protocol.clone(),
            method: action.method.clone(),
            success: false,
          });
          if allow_failure || action.skip_on_failure {
            log::debug!(
              target: LOG_TARGET,
              "tolerated failure of {:?} via handler {:?}",
              action.protocol,
              handler
            );
            return Ok(ActionOutcome::Failed { return_data });
          }
          return Err(ExecutionFailure::new(
            Error::<T>::ActionFailed,
            FailureContext::Action {
              protocol: action.protocol.clone(),
              method: action.method.clone(),
              return_data,
            },
          ));
        }
      };

      if let Some((resource, before)) = snapshot {
        let actual = T::Ledger::balance(&me, resource).saturating_sub(before);
        if actual < action.min_output_amount {
          Self::deposit_event(Event::SlippageDetected {
            protocol: action.protocol.clone(),
            resource,
            expected: action.min_output_amount,
            actual,
          });
          return Err(ExecutionFailure::new(
            Error::<T>::SlippageExceeded,
            FailureContext::Slippage {
              protocol: action.protocol.clone(),
              resource,
              expected: action.min_output_amount,
              actual,
            },
          ));
        }
      }

      if let (true, Some(resource)) = (action.forward_resource_balance, action.resource) {
        let recipient = action.recipient.clone().unwrap_or_else(|| ctx.caller.clone());
        Self::forward_balance(resource, &recipient)?;
      }

      Self::deposit_event(Event::ActionExecuted {
        protocol: action.protocol.clone(),
        method: action.method.clone(),
        success: true,
      });
      Ok(ActionOutcome::Succeeded { return_data })
    }

    /// Consults the configured oracle, if any. A zero bound selects the default.
    fn check_price(asset: &PriceLabel, action: &ActionOf<T>) -> Result<(), FailureOf<T>> {
      let Some(oracle) = PriceOracleAccount::<T>::get() else {
        return Ok(());
      };
      let max_slippage_bp = if action.max_slippage_bp == 0 {
        T::DefaultMaxSlippageBp::get()
      } else {
        action.max_slippage_bp
      };
      let validated =
        T::PriceOracle::validate_price(&oracle, asset, action.reference_price, max_slippage_bp);
      match validated {
        Ok(price) => {
          Self::deposit_event(Event::PriceValidated {
            asset: asset.clone(),
            price,
            min_output: action.min_output_amount,
          });
          Ok(())
        }
        Err(reason) => Err(ExecutionFailure::new(
          Error::<T>::PriceValidationFailed,
          FailureContext::Price {
            asset: asset.clone(),
            reason,
          },
        )),
      }
    }

    /// Calls `handler` inside a nested transaction that is rolled back when the
    /// handler fails, so a tolerated failure leaves no trace. The outer error only
    /// reports an exhausted transaction depth.
    fn invoke_handler(
      handler: &T::AccountId,
      params: &[u8],
      value: T::Balance,
    ) -> Result<Result<Vec<u8>, Vec<u8>>, DispatchError> {
      let me = Self::account_id();
      with_transaction(|| {
        if !value.is_zero() {
          if let Err(error) = T::Ledger::transfer(&me, handler, T::NativeAsset::get(), value) {
            return TransactionOutcome::Rollback(Ok(Err(error.encode())));
          }
        }
        match T::Handlers::invoke(handler, &me, params, value) {
          Ok(return_data) => TransactionOutcome::Commit(Ok(Ok(return_data))),
          Err(return_data) => TransactionOutcome::Rollback(Ok(Err(return_data))),
        }
      })
    }

    fn run_direct_call(
      target: &T::AccountId,
      data: &[u8],
      value: T::Balance,
    ) -> Result<Vec<u8>, FailureOf<T>> {
      ensure!(
        Self::is_allowed_handler(target),
        Error::<T>::HandlerNotAllowed
      );
      let result = Self::invoke_handler(target, data, value)?;
      Self::deposit_event(Event::DirectCallExecuted {
        target: target.clone(),
        success: result.is_ok(),
      });
      result.map_err(|return_data| {
        ExecutionFailure::new(
          Error::<T>::DirectCallFailed,
          FailureContext::DirectCall {
            target: target.clone(),
            return_data,
          },
        )
      })
    }

    /// Sends the orchestrator's entire `resource` balance to `recipient`.
    fn forward_balance(resource: T::AssetId, recipient: &T::AccountId) -> DispatchResult {
      let me = Self::account_id();
      let amount = T::Ledger::balance(&me, resource);
      if amount.is_zero() || *recipient == me {
        return Ok(());
      }
      T::Ledger::transfer(&me, recipient, resource, amount)?;
      Self::deposit_event(Event::ResourceForwarded {
        resource,
        recipient: recipient.clone(),
        amount,
      });
      Ok(())
    }

    fn is_valid_destination(destination: &T::AccountId, owner: &T::AccountId) -> bool {
      *destination == Self::account_id()
        || Self::is_allowed_handler(destination)
        || destination == owner
    }

    fn ensure_pulled(
      resource: T::AssetId,
      requested: T::Balance,
      received: T::Balance,
    ) -> Result<(), FailureOf<T>> {
      if received.saturating_add(T::PullTolerance::get()) < requested {
        return Err(ExecutionFailure::new(
          Error::<T>::InsufficientPull,
          FailureContext::Pull {
            resource,
            requested,
            received,
          },
        ));
      }
      Ok(())
    }

    /// Executes a delegated pull and verifies the destination's balance moved by the
    /// requested amount, less the tolerance. Returns the amount received.
    pub fn pull_delegated(
      caller: &T::AccountId,
      authorization: &DelegatedTransferAuthorizationOf<T>,
      proof: &[u8],
    ) -> Result<T::Balance, FailureOf<T>> {
      ensure!(
        *caller == authorization.owner,
        Error::<T>::NotAuthorizationOwner
      );
      ensure!(
        Self::is_valid_destination(&authorization.destination, &authorization.owner),
        Error::<T>::InvalidDestination
      );
      let resource = authorization.permission.resource;
      let before = T::Ledger::balance(&authorization.destination, resource);
      T::DelegatedTransfers::pull(authorization, proof)?;
      let received =
        T::Ledger::balance(&authorization.destination, resource).saturating_sub(before);
      Self::ensure_pulled(resource, authorization.requested_amount, received)?;
      Self::deposit_event(Event::DelegatedTransferCompleted {
        owner: authorization.owner.clone(),
        resource,
        destination: authorization.destination.clone(),
        requested: authorization.requested_amount,
        received,
      });
      Ok(received)
    }

    /// Batch form of [`Self::pull_delegated`] with one service call. Targets sharing a
    /// destination and resource are checked against their summed request.
    pub fn pull_delegated_batch(
      caller: &T::AccountId,
      authorization: &BatchDelegatedTransferAuthorizationOf<T>,
      targets: &[TransferTargetOf<T>],
      proof: &[u8],
    ) -> Result<(), FailureOf<T>> {
      ensure!(
        *caller == authorization.owner,
        Error::<T>::NotAuthorizationOwner
      );
      ensure!(
        authorization.permissions.len() == targets.len(),
        Error::<T>::LengthMismatch
      );
      let mut expected: Vec<(T::AccountId, T::AssetId, T::Balance, T::Balance)> = Vec::new();
      for (permission, target) in authorization.permissions.iter().zip(targets) {
        ensure!(
          Self::is_valid_destination(&target.destination, &authorization.owner),
          Error::<T>::InvalidDestination
        );
        let group = expected.iter_mut().find(|(destination, resource, ..)| {
          *destination == target.destination && *resource == permission.resource
        });
        match group {
          Some((_, _, requested, _)) => {
            *requested = requested.saturating_add(target.requested_amount)
          }
          None => expected.push((
            target.destination.clone(),
            permission.resource,
            target.requested_amount,
            T::Ledger::balance(&target.destination, permission.resource),
          )),
        }
      }
      T::DelegatedTransfers::pull_batch(authorization, targets, proof)?;
      for (destination, resource, requested, before) in expected {
        let received = T::Ledger::balance(&destination, resource).saturating_sub(before);
        Self::ensure_pulled(resource, requested, received)?;
        Self::deposit_event(Event::DelegatedTransferCompleted {
          owner: authorization.owner.clone(),
          resource,
          destination,
          requested,
          received,
        });
      }
      Ok(())
    }
  }

  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub primary_authority: Option<T::AccountId>,
    pub approved_authorities: Vec<T::AccountId>,
    pub emergency_operators: Vec<T::AccountId>,
    pub protocols: Vec<(Vec<u8>, T::AccountId)>,
    pub price_oracle: Option<T::AccountId>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      if let Some(primary) = &self.primary_authority {
        PrimaryAuthority::<T>::put(primary);
      }
      for who in &self.approved_authorities {
        ApprovedAuthorities::<T>::insert(who, ());
      }
      for who in &self.emergency_operators {
        EmergencyOperators::<T>::insert(who, ());
      }
      for (name, handler) in &self.protocols {
        let name: ProtocolName = name
          .clone()
          .try_into()
          .expect("Protocol name exceeds label limit");
        Protocols::<T>::insert(&name, handler);
        AllowedHandlers::<T>::insert(handler, ());
      }
      if let Some(oracle) = &self.price_oracle {
        PriceOracleAccount::<T>::put(oracle);
      }
      // Orchestrator account survives zero native balance
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
    }
  }
}
