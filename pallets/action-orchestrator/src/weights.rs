#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn execute_action() -> Weight;
  fn execute_batch(n: u32) -> Weight;
  fn execute_conditional() -> Weight;
  fn execute_conditional_batch(n: u32) -> Weight;
  fn multicall_with_value(n: u32) -> Weight;
  fn direct_call() -> Weight;
  fn direct_call_with_forwarding() -> Weight;
  fn execute_with_delegated_transfer() -> Weight;
  fn execute_batch_with_delegated_transfer(n: u32) -> Weight;
  fn register_protocol() -> Weight;
  fn unregister_protocol() -> Weight;
  fn set_handler_allowed() -> Weight;
  fn set_approved_authority() -> Weight;
  fn set_emergency_operator() -> Weight;
  fn set_price_oracle() -> Weight;
  fn pause() -> Weight;
  fn unpause() -> Weight;
  fn recover_funds() -> Weight;
  fn transfer_primary_authority() -> Weight;
}

// Gates: latch, paused flag and authority sets
const GATE_READS: u64 = 4;
// Per action: registry, oracle account, output snapshot and forwarding
const ACTION_READS: u64 = 4;
const ACTION_WRITES: u64 = 3;

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config + crate::Config> WeightInfo for SubstrateWeight<T> {
  fn execute_action() -> Weight {
    Weight::from_parts(30_000_000, 2500)
      .saturating_add(T::DbWeight::get().reads(GATE_READS + ACTION_READS))
      .saturating_add(T::DbWeight::get().writes(ACTION_WRITES + 2))
  }

  fn execute_batch(n: u32) -> Weight {
    let bounded = u64::from(n.min(T::MaxBatchLength::get()));
    Weight::from_parts(
      12_000_000u64.saturating_add(bounded.saturating_mul(25_000_000)),
      1200u64.saturating_add(bounded.saturating_mul(1300)),
    )
    .saturating_add(T::DbWeight::get().reads(GATE_READS.saturating_add(bounded.saturating_mul(ACTION_READS))))
    .saturating_add(T::DbWeight::get().writes(bounded.saturating_mul(ACTION_WRITES).saturating_add(2)))
  }

  fn execute_conditional() -> Weight {
    Weight::from_parts(32_000_000, 2600)
      .saturating_add(T::DbWeight::get().reads(GATE_READS + ACTION_READS + 1))
      .saturating_add(T::DbWeight::get().writes(ACTION_WRITES + 2))
  }

  fn execute_conditional_batch(n: u32) -> Weight {
    let bounded = u64::from(n.min(T::MaxBatchLength::get()));
    Weight::from_parts(
      12_000_000u64.saturating_add(bounded.saturating_mul(27_000_000)),
      1200u64.saturating_add(bounded.saturating_mul(1400)),
    )
    .saturating_add(T::DbWeight::get().reads(GATE_READS.saturating_add(bounded.saturating_mul(ACTION_READS + 1))))
    .saturating_add(T::DbWeight::get().writes(bounded.saturating_mul(ACTION_WRITES).saturating_add(2)))
  }

  fn multicall_with_value(n: u32) -> Weight {
    // Sub-call weights are added by the caller
    let bounded = u64::from(n.min(T::MaxMulticallLength::get()));
    Weight::from_parts(
      20_000_000u64.saturating_add(bounded.saturating_mul(1_000_000)),
      1500,
    )
    .saturating_add(T::DbWeight::get().reads_writes(GATE_READS + 2, 4))
  }

  fn direct_call() -> Weight {
    Weight::from_parts(22_000_000, 1800)
      .saturating_add(T::DbWeight::get().reads(GATE_READS + 1))
      .saturating_add(T::DbWeight::get().writes(3))
  }

  fn direct_call_with_forwarding() -> Weight {
    Weight::from_parts(30_000_000, 2400)
      .saturating_add(T::DbWeight::get().reads(GATE_READS + 3))
      .saturating_add(T::DbWeight::get().writes(5))
  }

  fn execute_with_delegated_transfer() -> Weight {
    Weight::from_parts(55_000_000, 3500)
      .saturating_add(T::DbWeight::get().reads(GATE_READS + ACTION_READS + 4))
      .saturating_add(T::DbWeight::get().writes(ACTION_WRITES + 5))
  }

  fn execute_batch_with_delegated_transfer(n: u32) -> Weight {
    let bounded = u64::from(n.min(T::MaxBatchLength::get()));
    Weight::from_parts(
      40_000_000u64.saturating_add(bounded.saturating_mul(25_000_000)),
      3000u64.saturating_add(bounded.saturating_mul(1300)),
    )
    // Up to 16 delegated pulls, each snapshot and re-read
    .saturating_add(T::DbWeight::get().reads(GATE_READS.saturating_add(32).saturating_add(bounded.saturating_mul(ACTION_READS))))
    .saturating_add(T::DbWeight::get().writes(bounded.saturating_mul(ACTION_WRITES).saturating_add(34)))
  }

  fn register_protocol() -> Weight {
    Weight::from_parts(12_000_000, 900)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn unregister_protocol() -> Weight {
    Weight::from_parts(12_000_000, 900)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn set_handler_allowed() -> Weight {
    Weight::from_parts(9_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn set_approved_authority() -> Weight {
    Weight::from_parts(9_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn set_emergency_operator() -> Weight {
    Weight::from_parts(9_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn set_price_oracle() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn pause() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn unpause() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn recover_funds() -> Weight {
    Weight::from_parts(20_000_000, 1800)
      .saturating_add(T::DbWeight::get().reads_writes(3, 2))
  }

  fn transfer_primary_authority() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().reads_writes(1, 1))
  }
}

impl WeightInfo for () {
  fn execute_action() -> Weight { Weight::from_parts(30_000_000, 2500) }
  fn execute_batch(n: u32) -> Weight {
    Weight::from_parts(12_000_000u64.saturating_add(u64::from(n).saturating_mul(25_000_000)), 1200)
  }
  fn execute_conditional() -> Weight { Weight::from_parts(32_000_000, 2600) }
  fn execute_conditional_batch(n: u32) -> Weight {
    Weight::from_parts(12_000_000u64.saturating_add(u64::from(n).saturating_mul(27_000_000)), 1200)
  }
  fn multicall_with_value(n: u32) -> Weight {
    Weight::from_parts(20_000_000u64.saturating_add(u64::from(n).saturating_mul(1_000_000)), 1500)
  }
  fn direct_call() -> Weight { Weight::from_parts(22_000_000, 1800) }
  fn direct_call_with_forwarding() -> Weight { Weight::from_parts(30_000_000, 2400) }
  fn execute_with_delegated_transfer() -> Weight { Weight::from_parts(55_000_000, 3500) }
  fn execute_batch_with_delegated_transfer(n: u32) -> Weight {
    Weight::from_parts(40_000_000u64.saturating_add(u64::from(n).saturating_mul(25_000_000)), 3000)
  }
  fn register_protocol() -> Weight { Weight::from_parts(12_000_000, 900) }
  fn unregister_protocol() -> Weight { Weight::from_parts(12_000_000, 900) }
  fn set_handler_allowed() -> Weight { Weight::from_parts(9_000_000, 600) }
  fn set_approved_authority() -> Weight { Weight::from_parts(9_000_000, 600) }
  fn set_emergency_operator() -> Weight { Weight::from_parts(9_000_000, 600) }
  fn set_price_oracle() -> Weight { Weight::from_parts(8_000_000, 600) }
  fn pause() -> Weight { Weight::from_parts(8_000_000, 600) }
  fn unpause() -> Weight { Weight::from_parts(8_000_000, 600) }
  fn recover_funds() -> Weight { Weight::from_parts(20_000_000, 1800) }
  fn transfer_primary_authority() -> Weight { Weight::from_parts(8_000_000, 600) }
}
