use crate as pallet_action_orchestrator;
use crate::{
  Action, ActionHandler, BatchDelegatedTransferAuthorization, DelegatedTransferAuthorization,
  DelegatedTransferService, EcdsaRecovery, FungiblesLedger, PROOF_VALID_CODE,
  PROOF_VALIDATION_INTERFACE, PriceOracle, ProgrammableIdentities, TransferTarget,
};

use codec::{Decode, Encode};
use polkadot_sdk::frame_support::traits::fungibles::Mutate as FungiblesMutate;
use polkadot_sdk::frame_support::traits::tokens::Preservation;
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl, ensure, parameter_types,
  storage::unhashed,
  traits::{ConstU32, ConstU128, Currency},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError, DispatchResult, Either,
  testing::H256,
  traits::{BlakeTwo256, Convert, IdentityLookup},
};

use std::cell::RefCell;
use std::collections::BTreeMap;

pub const PRIMARY: u64 = 1;
pub const SOLVER: u64 = 2;
pub const OPERATOR: u64 = 3;
pub const USER: u64 = 4;
pub const DEX: u64 = 100;
pub const LENDING: u64 = 101;
/// Allow-listed for direct calls, not registered under a protocol name
pub const VAULT: u64 = 102;
pub const ORACLE: u64 = 200;

pub const NATIVE: u32 = 0;
pub const TOKEN_A: u32 = 1;
pub const TOKEN_B: u32 = 2;

pub const INITIAL_BALANCE: u128 = 1_000_000;
pub const ORCHESTRATOR_FLOAT: u128 = 10_000;

// State containers for stateful mocks
thread_local! {
  // Handler invocations: (handler, attached value)
  pub static INVOCATIONS: RefCell<Vec<(u64, u128)>> = const { RefCell::new(Vec::new()) };

  // Oracle answer and the deviation bounds it was asked with
  pub static ORACLE_ANSWER: RefCell<Result<u128, &'static str>> =
    const { RefCell::new(Ok(1_000)) };
  pub static ORACLE_BOUNDS: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };

  // Units the delegated-transfer service withholds from every pull
  pub static PULL_SHORTFALL: RefCell<u128> = const { RefCell::new(0) };

  // Programmable identities: account -> (declares proof validation, verdict)
  pub static PROGRAMMABLE: RefCell<BTreeMap<u64, (bool, IdentityVerdict)>> =
    const { RefCell::new(BTreeMap::new()) };
  pub static DELEGATED_PROOFS: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
}

pub fn invocations() -> Vec<(u64, u128)> {
  INVOCATIONS.with(|i| i.borrow().clone())
}

pub fn set_oracle_answer(answer: Result<u128, &'static str>) {
  ORACLE_ANSWER.with(|a| *a.borrow_mut() = answer);
}

pub fn oracle_bounds() -> Vec<u32> {
  ORACLE_BOUNDS.with(|b| b.borrow().clone())
}

pub fn set_pull_shortfall(units: u128) {
  PULL_SHORTFALL.with(|s| *s.borrow_mut() = units);
}

pub fn set_programmable(who: u64, declares_support: bool, verdict: IdentityVerdict) {
  PROGRAMMABLE.with(|p| {
    p.borrow_mut().insert(who, (declares_support, verdict));
  });
}

pub fn delegated_proofs() -> Vec<Vec<u8>> {
  DELEGATED_PROOFS.with(|p| p.borrow().clone())
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    Orchestrator: pallet_action_orchestrator,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<u32, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> u32 {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

/// Asset id 0 is the native currency, everything else lives in the assets pallet.
pub struct NativeOrAssetIdConverter;
impl Convert<u32, Either<(), u32>> for NativeOrAssetIdConverter {
  fn convert(id: u32) -> Either<(), u32> {
    if id == NATIVE {
      Either::Left(())
    } else {
      Either::Right(id)
    }
  }
}

pub type UnifiedAssets = polkadot_sdk::frame_support::traits::fungible::UnionOf<
  Balances,
  Assets,
  NativeOrAssetIdConverter,
  u32,
  u64,
>;

/// Scripted handler behaviour, SCALE-encoded into an action's params.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq)]
pub enum HandlerOp {
  /// Succeed and return the bytes
  Echo(Vec<u8>),
  /// Mint `amount` of `asset` to the calling orchestrator
  Pay { asset: u32, amount: u128 },
  /// Mint like `Pay`, then report failure
  PayAndFail {
    asset: u32,
    amount: u128,
    reason: Vec<u8>,
  },
  Fail(Vec<u8>),
  /// Call back into the orchestrator's public entry point
  Reenter,
}

pub struct MockHandlers;
impl ActionHandler<u64, u128> for MockHandlers {
  fn invoke(handler: &u64, origin: &u64, params: &[u8], value: u128) -> Result<Vec<u8>, Vec<u8>> {
    INVOCATIONS.with(|i| i.borrow_mut().push((*handler, value)));
    let op = HandlerOp::decode(&mut &params[..]).map_err(|_| b"undecodable params".to_vec())?;
    match op {
      HandlerOp::Echo(data) => Ok(data),
      HandlerOp::Pay { asset, amount } => {
        UnifiedAssets::mint_into(asset, origin, amount).map_err(|e| e.encode())?;
        Ok(amount.encode())
      }
      HandlerOp::PayAndFail {
        asset,
        amount,
        reason,
      } => {
        UnifiedAssets::mint_into(asset, origin, amount).map_err(|e| e.encode())?;
        Err(reason)
      }
      HandlerOp::Fail(reason) => Err(reason),
      HandlerOp::Reenter => Orchestrator::execute_action(
        RuntimeOrigin::signed(SOLVER),
        action(b"dex", HandlerOp::Echo(vec![])),
      )
      .map(|_| Vec::new())
      .map_err(|e| e.encode()),
    }
  }
}

pub struct MockOracle;
impl PriceOracle<u64, u128> for MockOracle {
  fn validate_price(
    oracle: &u64,
    _asset: &[u8],
    _reference_price: u128,
    max_slippage_bp: u32,
  ) -> Result<u128, DispatchError> {
    ensure!(*oracle == ORACLE, DispatchError::Other("unknown oracle"));
    ORACLE_BOUNDS.with(|b| b.borrow_mut().push(max_slippage_bp));
    ORACLE_ANSWER
      .with(|a| *a.borrow())
      .map_err(DispatchError::Other)
  }
}

/// Permit-style service: checks proof presence, deadline, bound and nonce, then
/// delivers the requested amount less the configured shortfall.
pub struct MockDelegatedTransfers;

impl MockDelegatedTransfers {
  fn pull_one(
    owner: u64,
    resource: u32,
    limit: u128,
    nonce: u64,
    deadline: u64,
    destination: u64,
    requested: u128,
  ) -> DispatchResult {
    ensure!(
      System::block_number() <= deadline,
      DispatchError::Other("authorization expired")
    );
    ensure!(requested <= limit, DispatchError::Other("amount exceeds permission"));
    let key = (b"mock/delegated-nonce", owner, nonce).encode();
    ensure!(!unhashed::exists(&key), DispatchError::Other("nonce already used"));
    unhashed::put(&key, &true);
    let delivered = requested.saturating_sub(PULL_SHORTFALL.with(|s| *s.borrow()));
    <UnifiedAssets as FungiblesMutate<u64>>::transfer(
      resource,
      &owner,
      &destination,
      delivered,
      Preservation::Expendable,
    )?;
    Ok(())
  }
}

impl DelegatedTransferService<u64, u32, u128, u64> for MockDelegatedTransfers {
  fn pull(
    authorization: &DelegatedTransferAuthorization<u64, u32, u128, u64>,
    proof: &[u8],
  ) -> DispatchResult {
    ensure!(!proof.is_empty(), DispatchError::Other("missing proof"));
    Self::pull_one(
      authorization.owner,
      authorization.permission.resource,
      authorization.permission.amount,
      authorization.permission.nonce,
      authorization.deadline,
      authorization.destination,
      authorization.requested_amount,
    )
  }

  fn pull_batch(
    authorization: &BatchDelegatedTransferAuthorization<u64, u32, u128, u64>,
    targets: &[TransferTarget<u64, u128>],
    proof: &[u8],
  ) -> DispatchResult {
    ensure!(!proof.is_empty(), DispatchError::Other("missing proof"));
    for (permission, target) in authorization.permissions.iter().zip(targets) {
      Self::pull_one(
        authorization.owner,
        permission.resource,
        permission.amount,
        permission.nonce,
        authorization.deadline,
        target.destination,
        target.requested_amount,
      )?;
    }
    Ok(())
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdentityVerdict {
  Valid,
  Invalid,
  /// The identity's validator itself errors out
  Faulty,
}

pub struct MockIdentities;
impl ProgrammableIdentities<u64> for MockIdentities {
  fn is_programmable(who: &u64) -> bool {
    PROGRAMMABLE.with(|p| p.borrow().contains_key(who))
  }

  fn supports_interface(who: &u64, interface: [u8; 4]) -> bool {
    interface == PROOF_VALIDATION_INTERFACE
      && PROGRAMMABLE.with(|p| p.borrow().get(who).is_some_and(|(declares, _)| *declares))
  }

  fn validate_proof(who: &u64, _hash: &[u8; 32], proof: &[u8]) -> Result<[u8; 4], DispatchError> {
    DELEGATED_PROOFS.with(|p| p.borrow_mut().push(proof.to_vec()));
    match PROGRAMMABLE.with(|p| p.borrow().get(who).map(|(_, verdict)| *verdict)) {
      Some(IdentityVerdict::Valid) => Ok(PROOF_VALID_CODE),
      Some(IdentityVerdict::Invalid) => Ok([0u8; 4]),
      Some(IdentityVerdict::Faulty) | None => Err(DispatchError::Other("validator trapped")),
    }
  }
}

/// Accounts are the first eight bytes of the blake2 hash of the compressed key.
pub struct PublicKeyToAccount;
impl Convert<[u8; 33], u64> for PublicKeyToAccount {
  fn convert(public: [u8; 33]) -> u64 {
    let hash = polkadot_sdk::sp_io::hashing::blake2_256(&public);
    u64::from_le_bytes(hash[..8].try_into().expect("hash is 32 bytes"))
  }
}

parameter_types! {
  pub const OrchestratorPalletId: PalletId = PalletId(*b"py/orchs");
}

impl pallet_action_orchestrator::Config for Test {
  type AssetId = u32;
  type Balance = u128;
  type NativeAsset = ConstU32<NATIVE>;
  type Ledger = FungiblesLedger<UnifiedAssets>;
  type Handlers = MockHandlers;
  type PriceOracle = MockOracle;
  type DelegatedTransfers = MockDelegatedTransfers;
  type SignerRecovery = EcdsaRecovery<PublicKeyToAccount>;
  type ProgrammableIdentities = MockIdentities;
  type AdminOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type PalletId = OrchestratorPalletId;
  type MaxBatchLength = ConstU32<8>;
  type MaxMulticallLength = ConstU32<4>;
  type DefaultMaxSlippageBp = ConstU32<500>;
  type PullTolerance = ConstU128<2>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = OrchestratorBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct OrchestratorBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::types::BenchmarkHelper<u64, u32, u128> for OrchestratorBenchmarkHelper {
  fn succeeding_params() -> Vec<u8> {
    HandlerOp::Echo(Vec::new()).encode()
  }

  fn mint(asset: u32, to: &u64, amount: u128) -> DispatchResult {
    UnifiedAssets::mint_into(asset, to, amount).map(|_| ())
  }
}

/// Strict action against `protocol` with no resource handling.
pub fn action(protocol: &[u8], op: HandlerOp) -> Action<u64, u32, u128> {
  Action {
    protocol: protocol.to_vec().try_into().expect("protocol name fits"),
    method: b"call".to_vec().try_into().expect("method label fits"),
    params: op.encode().try_into().expect("params fit"),
    value: 0,
    skip_on_failure: false,
    resource: None,
    recipient: None,
    forward_resource_balance: false,
    min_output_amount: 0,
    price_asset: None,
    reference_price: 0,
    max_slippage_bp: 0,
  }
}

pub fn orchestrator() -> u64 {
  Orchestrator::account_id()
}

pub fn balance_of(who: u64, asset: u32) -> u128 {
  <UnifiedAssets as polkadot_sdk::frame_support::traits::fungibles::Inspect<u64>>::balance(
    asset, &who,
  )
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut storage = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();
  pallet_action_orchestrator::GenesisConfig::<Test> {
    primary_authority: Some(PRIMARY),
    approved_authorities: vec![SOLVER],
    emergency_operators: vec![OPERATOR],
    protocols: vec![(b"dex".to_vec(), DEX), (b"lending".to_vec(), LENDING)],
    price_oracle: None,
  }
  .assimilate_storage(&mut storage)
  .unwrap();
  let mut ext: polkadot_sdk::sp_io::TestExternalities = storage.into();

  // Reset thread locals
  INVOCATIONS.with(|i| i.borrow_mut().clear());
  ORACLE_ANSWER.with(|a| *a.borrow_mut() = Ok(1_000));
  ORACLE_BOUNDS.with(|b| b.borrow_mut().clear());
  PULL_SHORTFALL.with(|s| *s.borrow_mut() = 0);
  PROGRAMMABLE.with(|p| p.borrow_mut().clear());
  DELEGATED_PROOFS.with(|p| p.borrow_mut().clear());

  ext.execute_with(|| {
    System::set_block_number(1);
    for who in [PRIMARY, SOLVER, OPERATOR, USER] {
      let _ = Balances::deposit_creating(&who, INITIAL_BALANCE);
    }
    let _ = Balances::deposit_creating(&Orchestrator::account_id(), ORCHESTRATOR_FLOAT);
    pallet_action_orchestrator::AllowedHandlers::<Test>::insert(VAULT, ());

    for asset_id in [TOKEN_A, TOKEN_B] {
      Assets::force_create(RuntimeOrigin::root(), asset_id, PRIMARY, true, 1).unwrap();
      for who in [SOLVER, USER] {
        Assets::mint_into(asset_id, &who, INITIAL_BALANCE).unwrap();
      }
    }
  });
  ext
}
