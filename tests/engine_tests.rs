use chrono::NaiveDate;
use fincore::core::{
    Account, AccountKind, AllocationTarget, ContributionFrequency, LedgerStore, MemoryStore,
    PolicyError, PolicySettings,
};
use fincore::discipline::{DisciplineEngine, InstructionError, Stage};
use fincore::import::{CategoryMapper, CommitOverrides, DedupConfig, RawRow};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn policy() -> PolicySettings {
    PolicySettings {
        monthly_income: dec!(30000),
        monthly_expense: dec!(8000),
        cash_reserve_target: dec!(50000),
        buffer_reserve_target: dec!(100000),
        base_investment_amount: dec!(5000),
        contribution_frequency: ContributionFrequency::Monthly,
        allocation_targets: vec![
            AllocationTarget {
                asset_class: "equity".into(),
                ratio: dec!(0.6),
            },
            AllocationTarget {
                asset_class: "bond".into(),
                ratio: dec!(0.3),
            },
            AllocationTarget {
                asset_class: "gold".into(),
                ratio: dec!(0.1),
            },
        ],
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn engine_with_balance(balance: rust_decimal::Decimal) -> DisciplineEngine<MemoryStore> {
    let bank = Account::new("招商银行储蓄卡", AccountKind::Bank, "CNY").with_balance(balance);
    let brokerage =
        Account::new("中信证券", AccountKind::Brokerage, "CNY").with_balance(dec!(120000));
    let store = MemoryStore::new(vec![bank, brokerage], vec![], vec![]);
    DisciplineEngine::new(store, policy()).unwrap()
}

#[test]
fn invalid_policy_refuses_to_start() {
    let mut bad = policy();
    bad.allocation_targets[2].ratio = dec!(0.2);
    let store = MemoryStore::default();
    match DisciplineEngine::new(store, bad) {
        Err(PolicyError::AllocationSum(_)) => {}
        other => panic!("expected construction failure, got {:?}", other.is_ok()),
    }
}

#[test]
fn brokerage_balance_does_not_count_as_liquid() {
    // ¥62,500 liquid; the ¥120,000 brokerage balance is ignored.
    let engine = engine_with_balance(dec!(62500));
    let status = engine.status();
    assert_eq!(status.stage, Stage::BuildingBuffer);
    assert_eq!(status.progress, dec!(0.125));
    assert_eq!(status.target, dec!(100000));
}

#[test]
fn reserve_boundary_promotes_to_buffer_stage() {
    let engine = engine_with_balance(dec!(50000));
    assert_eq!(engine.status().stage, Stage::BuildingBuffer);
}

#[test]
fn generation_is_idempotent_per_period() {
    let engine = engine_with_balance(dec!(62500));
    let first = engine.run_generation(date(2023, 10, 24));
    assert_eq!(first.len(), 1);
    let second = engine.run_generation(date(2023, 10, 28));
    assert!(second.is_empty());
    assert_eq!(engine.status().pending_instructions.len(), 1);
}

#[test]
fn executing_an_instruction_is_monotonic() {
    let engine = engine_with_balance(dec!(62500));
    let fresh = engine.run_generation(date(2023, 10, 24));
    let id = fresh[0].id;

    engine.mark_executed(id, date(2023, 10, 25)).unwrap();
    assert_eq!(
        engine.mark_executed(id, date(2023, 10, 30)),
        Err(InstructionError::AlreadyExecuted)
    );

    let status = engine.status();
    let executed = status.history.iter().find(|i| i.id == id).unwrap();
    assert!(executed.executed);
    // The original execution date survives the failed re-invocation.
    assert_eq!(executed.executed_date, Some(date(2023, 10, 25)));
    assert!(status.pending_instructions.is_empty());
}

#[test]
fn unknown_instruction_is_not_found() {
    let engine = engine_with_balance(dec!(62500));
    assert_eq!(
        engine.mark_executed(Uuid::new_v4(), date(2023, 10, 25)),
        Err(InstructionError::NotFound)
    );
}

#[test]
fn history_is_reverse_chronological() {
    let engine = engine_with_balance(dec!(62500));
    let october = engine.run_generation(date(2023, 10, 24));
    engine
        .mark_executed(october[0].id, date(2023, 10, 25))
        .unwrap();
    let november = engine.run_generation(date(2023, 11, 1));
    assert_eq!(november.len(), 1);

    let status = engine.status();
    assert_eq!(status.history.len(), 2);
    assert_eq!(status.history[0].created, date(2023, 11, 1));
    assert_eq!(status.history[1].created, date(2023, 10, 24));
}

#[test]
fn active_investing_emits_scaled_allocations() {
    let engine = engine_with_balance(dec!(160000));
    let fresh = engine.run_generation(date(2023, 10, 1));
    assert_eq!(fresh.len(), 3);
    assert_eq!(fresh[0].stage, Stage::ActiveInvesting);
}

#[test]
fn committed_import_moves_the_stage() {
    // ¥49,999 liquid: one yuan short of the reserve target.
    let engine = engine_with_balance(dec!(49999));
    assert_eq!(engine.status().stage, Stage::AccumulatingCashReserve);

    let account_id = engine.with_store(|s| {
        s.accounts()
            .iter()
            .find(|a| a.kind == AccountKind::Bank)
            .map(|a| a.id)
            .unwrap()
    });
    let mapper = CategoryMapper::new(vec![], vec!["工资".to_string()], 0.34);
    let rows = vec![RawRow {
        date: "2023-10-23".into(),
        amount: "20000.00".into(),
        kind: "income".into(),
        category: "工资".into(),
        merchant: "公司".into(),
        description: "10月工资".into(),
    }];
    let batch = engine.reconcile(&rows, account_id, &mapper, &DedupConfig::default());
    assert_eq!(batch.summary.ready, 1);
    engine
        .commit_import(&batch, account_id, &CommitOverrides::default())
        .unwrap();

    let status = engine.status();
    assert_eq!(status.stage, Stage::BuildingBuffer);
}

#[test]
fn reconciling_never_mutates_the_ledger() {
    let engine = engine_with_balance(dec!(62500));
    let account_id = engine.with_store(|s| s.accounts()[0].id);
    let mapper = CategoryMapper::new(vec![], vec!["餐饮".to_string()], 0.34);
    let rows = vec![RawRow {
        date: "2023-10-24".into(),
        amount: "55.00".into(),
        kind: String::new(),
        category: "餐饮".into(),
        merchant: "瑞幸咖啡".into(),
        description: "早咖啡".into(),
    }];
    let _ = engine.reconcile(&rows, account_id, &mapper, &DedupConfig::default());
    assert_eq!(engine.status().stage, Stage::BuildingBuffer);
    let txns = engine.with_store(|s| s.transactions());
    assert!(txns.is_empty());
}
