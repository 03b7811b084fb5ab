//! Payload types accepted by the orchestrator's entry points.

use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::sp_runtime::traits::Zero;

pub const MAX_LABEL_LEN: u32 = 64;
pub const MAX_PARAMS_LEN: u32 = 4096;
pub const MAX_PROOF_LEN: u32 = 1024;
pub const MAX_REASON_LEN: u32 = 128;

/// Name a handler is registered under in the capability registry.
pub type ProtocolName = BoundedVec<u8, ConstU32<MAX_LABEL_LEN>>;
/// Human-readable method tag, carried for telemetry only.
pub type MethodLabel = BoundedVec<u8, ConstU32<MAX_LABEL_LEN>>;
/// Asset identifier understood by the price oracle.
pub type PriceLabel = BoundedVec<u8, ConstU32<MAX_LABEL_LEN>>;
/// Opaque call payload forwarded to a handler untouched.
pub type EncodedParams = BoundedVec<u8, ConstU32<MAX_PARAMS_LEN>>;
pub type ProofBytes = BoundedVec<u8, ConstU32<MAX_PROOF_LEN>>;
pub type PauseReason = BoundedVec<u8, ConstU32<MAX_REASON_LEN>>;

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct Action<AccountId, AssetId, Balance> {
  pub protocol: ProtocolName,
  pub method: MethodLabel,
  pub params: EncodedParams,
  /// Native value moved from the orchestrator to the handler with the call.
  pub value: Balance,
  pub skip_on_failure: bool,
  pub resource: Option<AssetId>,
  /// Receiver of forwarded balances, the caller when unset.
  pub recipient: Option<AccountId>,
  pub forward_resource_balance: bool,
  /// Floor on the orchestrator's own `resource` balance delta. Zero disables the check.
  pub min_output_amount: Balance,
  pub price_asset: Option<PriceLabel>,
  /// Caller-side reference price handed to the oracle, zero when the caller has none.
  pub reference_price: Balance,
  /// Zero selects the runtime default bound.
  pub max_slippage_bp: u32,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct ConditionalAction<AccountId, AssetId, Balance> {
  pub action: Action<AccountId, AssetId, Balance>,
  pub guard_resource: AssetId,
  pub guard_min_balance: Balance,
}

#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct TransferPermission<AssetId, Balance> {
  pub resource: AssetId,
  /// Upper bound the owner signed for.
  pub amount: Balance,
  pub nonce: u64,
}

/// One-time permission for the delegated-transfer service to move `requested_amount`
/// of a resource from `owner` to `destination`.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct DelegatedTransferAuthorization<AccountId, AssetId, Balance, BlockNumber> {
  pub owner: AccountId,
  pub permission: TransferPermission<AssetId, Balance>,
  pub deadline: BlockNumber,
  pub destination: AccountId,
  pub requested_amount: Balance,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct BatchDelegatedTransferAuthorization<AccountId, AssetId, Balance, BlockNumber> {
  pub owner: AccountId,
  pub permissions: BoundedVec<TransferPermission<AssetId, Balance>, ConstU32<16>>,
  pub deadline: BlockNumber,
}

/// Destination half of a batch pull, matched to `permissions` by position.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct TransferTarget<AccountId, Balance> {
  pub destination: AccountId,
  pub requested_amount: Balance,
}

/// Entry points a multicall may re-enter.
#[derive(Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub enum OrchestratorCall<AccountId, AssetId, Balance> {
  ExecuteAction {
    action: Action<AccountId, AssetId, Balance>,
  },
  ExecuteBatch {
    actions: Vec<Action<AccountId, AssetId, Balance>>,
  },
  ExecuteConditional {
    conditional: ConditionalAction<AccountId, AssetId, Balance>,
  },
  ExecuteConditionalBatch {
    conditionals: Vec<ConditionalAction<AccountId, AssetId, Balance>>,
  },
  DirectCall {
    target: AccountId,
    data: EncodedParams,
    value: Balance,
  },
  DirectCallWithForwarding {
    target: AccountId,
    data: EncodedParams,
    value: Balance,
    resource: AssetId,
    recipient: Option<AccountId>,
  },
}

#[derive(Clone, Copy, Debug, Default, Decode, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen)]
pub enum LatchState {
  #[default]
  Idle,
  Active,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
  Standalone,
  /// Sub-call of a multicall the orchestrator itself is running.
  Batch,
}

/// Carried through the dispatch call graph instead of a global batch flag, so only
/// sub-calls issued by a running multicall can pass the reentrancy latch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvocationContext<AccountId, Balance> {
  pub caller: AccountId,
  pub attached_value: Balance,
  pub scope: Scope,
}

impl<AccountId, Balance: Zero> InvocationContext<AccountId, Balance> {
  pub fn standalone(caller: AccountId) -> Self {
    Self {
      caller,
      attached_value: Balance::zero(),
      scope: Scope::Standalone,
    }
  }

  pub fn batched(caller: AccountId, attached_value: Balance) -> Self {
    Self {
      caller,
      attached_value,
      scope: Scope::Batch,
    }
  }

  pub fn in_batch(&self) -> bool {
    self.scope == Scope::Batch
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
  Succeeded { return_data: Vec<u8> },
  /// Handler failed and the failure was tolerated; its effects were rolled back.
  Failed { return_data: Vec<u8> },
}

impl ActionOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, ActionOutcome::Succeeded { .. })
  }
}

/// Context attached to an aborted invocation. Module errors only carry their kind, so
/// the engine reports the amounts and raw handler output alongside it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureContext<AccountId, AssetId, Balance> {
  None,
  Action {
    protocol: ProtocolName,
    method: MethodLabel,
    return_data: Vec<u8>,
  },
  DirectCall {
    target: AccountId,
    return_data: Vec<u8>,
  },
  Slippage {
    protocol: ProtocolName,
    resource: AssetId,
    expected: Balance,
    actual: Balance,
  },
  Price {
    asset: PriceLabel,
    reason: DispatchError,
  },
  Pull {
    resource: AssetId,
    requested: Balance,
    received: Balance,
  },
  Guard {
    resource: AssetId,
    required: Balance,
    available: Balance,
  },
  Value {
    expected: Balance,
    supplied: Option<Balance>,
  },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionFailure<AccountId, AssetId, Balance> {
  pub error: DispatchError,
  pub context: FailureContext<AccountId, AssetId, Balance>,
}

impl<AccountId, AssetId, Balance> ExecutionFailure<AccountId, AssetId, Balance> {
  pub fn new(
    error: impl Into<DispatchError>,
    context: FailureContext<AccountId, AssetId, Balance>,
  ) -> Self {
    Self {
      error: error.into(),
      context,
    }
  }
}

impl<AccountId, AssetId, Balance> From<DispatchError>
  for ExecutionFailure<AccountId, AssetId, Balance>
{
  fn from(error: DispatchError) -> Self {
    Self {
      error,
      context: FailureContext::None,
    }
  }
}

impl<AccountId, AssetId, Balance> From<ExecutionFailure<AccountId, AssetId, Balance>>
  for DispatchError
{
  fn from(failure: ExecutionFailure<AccountId, AssetId, Balance>) -> Self {
    failure.error
  }
}

/// Helper for benchmarking
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId, AssetId, Balance> {
  /// Handler params the configured `ActionHandler` completes successfully
  fn succeeding_params() -> Vec<u8>;
  fn mint(asset: AssetId, to: &AccountId, amount: Balance) -> DispatchResult;
}
