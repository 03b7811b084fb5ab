extern crate alloc;

use super::*;
use crate::types::BenchmarkHelper;
use alloc::{vec, vec::Vec};
use polkadot_sdk::frame_benchmarking::{account, v2::*};
use polkadot_sdk::frame_support::{
  BoundedVec,
  traits::{EnsureOrigin, Get},
};
use polkadot_sdk::frame_system::{RawOrigin, pallet_prelude::BlockNumberFor};
use polkadot_sdk::sp_runtime::traits::{Bounded, Saturating, Zero};

const PROTOCOL: &[u8] = b"bench";
const PULL_AMOUNT: u32 = 1_000;

fn protocol() -> ProtocolName {
  BoundedVec::truncate_from(PROTOCOL.to_vec())
}

fn handler<T: Config>() -> T::AccountId {
  account("handler", 0, 0)
}

fn params<T: Config>() -> EncodedParams {
  BoundedVec::truncate_from(T::BenchmarkHelper::succeeding_params())
}

/// Whitelisted caller as an approved authority, with one registered protocol.
fn solver<T: Config>() -> T::AccountId {
  let caller: T::AccountId = whitelisted_caller();
  ApprovedAuthorities::<T>::insert(&caller, ());
  Protocols::<T>::insert(protocol(), handler::<T>());
  AllowedHandlers::<T>::insert(handler::<T>(), ());
  caller
}

/// Whitelisted caller as primary authority. Admin calls try `AdminOrigin` first,
/// so a signed primary takes the longer path.
fn primary<T: Config>() -> T::AccountId {
  let caller: T::AccountId = whitelisted_caller();
  PrimaryAuthority::<T>::put(&caller);
  caller
}

fn bench_action<T: Config>() -> ActionOf<T> {
  Action {
    protocol: protocol(),
    method: BoundedVec::truncate_from(b"run".to_vec()),
    params: params::<T>(),
    value: Zero::zero(),
    skip_on_failure: false,
    resource: None,
    recipient: None,
    forward_resource_balance: false,
    min_output_amount: Zero::zero(),
    price_asset: None,
    reference_price: Zero::zero(),
    max_slippage_bp: 0,
  }
}

fn bench_conditional<T: Config>() -> ConditionalActionOf<T> {
  ConditionalAction {
    action: bench_action::<T>(),
    guard_resource: T::NativeAsset::get(),
    guard_min_balance: Zero::zero(),
  }
}

fn proof() -> ProofBytes {
  BoundedVec::truncate_from(vec![1u8; 65])
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn execute_action() {
    let caller = solver::<T>();
    let action = bench_action::<T>();

    #[extrinsic_call]
    execute_action(RawOrigin::Signed(caller), action);

    assert_eq!(ActivityLatch::<T>::get(), LatchState::Idle);
  }

  #[benchmark]
  fn execute_batch(n: Linear<1, { T::MaxBatchLength::get() }>) {
    let caller = solver::<T>();
    let actions = BoundedVec::truncate_from(vec![bench_action::<T>(); n as usize]);

    #[extrinsic_call]
    execute_batch(RawOrigin::Signed(caller), actions);
  }

  #[benchmark]
  fn execute_conditional() {
    let caller = solver::<T>();
    let conditional = bench_conditional::<T>();

    #[extrinsic_call]
    execute_conditional(RawOrigin::Signed(caller), conditional);
  }

  #[benchmark]
  fn execute_conditional_batch(n: Linear<1, { T::MaxBatchLength::get() }>) {
    let caller = solver::<T>();
    let conditionals = BoundedVec::truncate_from(vec![bench_conditional::<T>(); n as usize]);

    #[extrinsic_call]
    execute_conditional_batch(RawOrigin::Signed(caller), conditionals);
  }

  #[benchmark]
  fn multicall_with_value(n: Linear<1, { T::MaxMulticallLength::get() }>) {
    let caller = solver::<T>();
    let calls = vec![
      OrchestratorCall::DirectCall {
        target: handler::<T>(),
        data: params::<T>(),
        value: Zero::zero(),
      };
      n as usize
    ];
    let values = vec![T::Balance::zero(); n as usize];

    #[extrinsic_call]
    multicall_with_value(
      RawOrigin::Signed(caller),
      BoundedVec::truncate_from(calls),
      BoundedVec::truncate_from(values),
      Zero::zero(),
    );
  }

  #[benchmark]
  fn direct_call() {
    let caller = solver::<T>();

    #[extrinsic_call]
    direct_call(
      RawOrigin::Signed(caller),
      handler::<T>(),
      params::<T>(),
      Zero::zero(),
    );
  }

  #[benchmark]
  fn direct_call_with_forwarding() {
    let caller = solver::<T>();
    let resource = T::NativeAsset::get();
    T::BenchmarkHelper::mint(resource, &Pallet::<T>::account_id(), PULL_AMOUNT.into())
      .expect("Failed to fund orchestrator");

    #[extrinsic_call]
    direct_call_with_forwarding(
      RawOrigin::Signed(caller),
      handler::<T>(),
      params::<T>(),
      Zero::zero(),
      resource,
      None,
    );
  }

  #[benchmark]
  fn execute_with_delegated_transfer() {
    let caller = solver::<T>();
    let resource = T::NativeAsset::get();
    let amount: T::Balance = PULL_AMOUNT.into();
    T::BenchmarkHelper::mint(resource, &caller, amount.saturating_mul(2u32.into()))
      .expect("Failed to fund owner");
    let authorization = DelegatedTransferAuthorization {
      owner: caller.clone(),
      permission: TransferPermission {
        resource,
        amount,
        nonce: 0,
      },
      deadline: BlockNumberFor::<T>::max_value(),
      destination: Pallet::<T>::account_id(),
      requested_amount: amount,
    };

    #[extrinsic_call]
    execute_with_delegated_transfer(
      RawOrigin::Signed(caller),
      authorization,
      proof(),
      bench_action::<T>(),
    );
  }

  #[benchmark]
  fn execute_batch_with_delegated_transfer(n: Linear<1, { T::MaxBatchLength::get() }>) {
    let caller = solver::<T>();
    let resource = T::NativeAsset::get();
    let amount: T::Balance = PULL_AMOUNT.into();
    // Every permission slot in use
    let slots = 16u32;
    T::BenchmarkHelper::mint(resource, &caller, amount.saturating_mul((slots * 2).into()))
      .expect("Failed to fund owner");
    let permissions = (0..slots)
      .map(|nonce| TransferPermission {
        resource,
        amount,
        nonce: u64::from(nonce),
      })
      .collect::<Vec<_>>();
    let targets = (0..slots)
      .map(|_| TransferTarget {
        destination: Pallet::<T>::account_id(),
        requested_amount: amount,
      })
      .collect::<Vec<_>>();
    let authorization = BatchDelegatedTransferAuthorization {
      owner: caller.clone(),
      permissions: BoundedVec::truncate_from(permissions),
      deadline: BlockNumberFor::<T>::max_value(),
    };
    let actions = BoundedVec::truncate_from(vec![bench_action::<T>(); n as usize]);

    #[extrinsic_call]
    execute_batch_with_delegated_transfer(
      RawOrigin::Signed(caller),
      authorization,
      BoundedVec::truncate_from(targets),
      proof(),
      actions,
    );
  }

  #[benchmark]
  fn register_protocol() {
    let caller = primary::<T>();

    #[extrinsic_call]
    register_protocol(RawOrigin::Signed(caller), protocol(), handler::<T>());

    assert_eq!(Pallet::<T>::lookup_protocol(&protocol()), Some(handler::<T>()));
  }

  #[benchmark]
  fn unregister_protocol() {
    solver::<T>();
    let caller = primary::<T>();

    #[extrinsic_call]
    unregister_protocol(RawOrigin::Signed(caller), protocol());

    assert!(!Pallet::<T>::is_allowed_handler(&handler::<T>()));
  }

  #[benchmark]
  fn set_handler_allowed() {
    let caller = primary::<T>();

    #[extrinsic_call]
    set_handler_allowed(RawOrigin::Signed(caller), handler::<T>(), true);
  }

  #[benchmark]
  fn set_approved_authority() {
    let caller = primary::<T>();
    let who: T::AccountId = account("solver", 0, 0);

    #[extrinsic_call]
    set_approved_authority(RawOrigin::Signed(caller), who.clone(), true);

    assert!(Pallet::<T>::is_authority(&who));
  }

  #[benchmark]
  fn set_emergency_operator() {
    let caller = primary::<T>();
    let who: T::AccountId = account("operator", 0, 0);

    #[extrinsic_call]
    set_emergency_operator(RawOrigin::Signed(caller), who.clone(), true);

    assert!(Pallet::<T>::is_emergency_operator(&who));
  }

  #[benchmark]
  fn set_price_oracle() {
    let caller = primary::<T>();
    let oracle: T::AccountId = account("oracle", 0, 0);

    #[extrinsic_call]
    set_price_oracle(RawOrigin::Signed(caller), Some(oracle));
  }

  #[benchmark]
  fn pause() {
    let caller = primary::<T>();

    #[extrinsic_call]
    pause(RawOrigin::Signed(caller), BoundedVec::truncate_from(b"bench".to_vec()));

    assert!(Pallet::<T>::is_paused());
  }

  #[benchmark]
  fn unpause() {
    let caller = primary::<T>();
    Paused::<T>::put(true);

    #[extrinsic_call]
    unpause(RawOrigin::Signed(caller), BoundedVec::truncate_from(b"bench".to_vec()));

    assert!(!Pallet::<T>::is_paused());
  }

  #[benchmark]
  fn recover_funds() {
    let caller = primary::<T>();
    let resource = T::NativeAsset::get();
    let amount: T::Balance = PULL_AMOUNT.into();
    T::BenchmarkHelper::mint(resource, &Pallet::<T>::account_id(), amount)
      .expect("Failed to fund orchestrator");
    let destination: T::AccountId = account("destination", 0, 0);

    #[extrinsic_call]
    recover_funds(RawOrigin::Signed(caller), resource, amount, destination);
  }

  #[benchmark]
  fn transfer_primary_authority() -> Result<(), BenchmarkError> {
    let origin =
      T::AdminOrigin::try_successful_origin().map_err(|_| BenchmarkError::Weightless)?;
    let new: T::AccountId = account("primary", 0, 0);

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, new.clone());

    assert!(Pallet::<T>::is_primary_authority(&new));
    Ok(())
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
