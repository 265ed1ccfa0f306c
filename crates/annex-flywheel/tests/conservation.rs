// crates/annex-flywheel/tests/conservation.rs
//
// Randomized transaction streams against a two-market comptroller. After
// every step the books must balance:
//
//   paid + accrued          <= emitted - discarded
//   pool balance            == funding - paid
//   ANN total supply        == genesis allocation
//   market activity total   == sum of account activity
//
// Rejected transactions must leave the state untouched.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use annex_core::{AccountId, ActivityKind, MarketId};
use annex_flywheel::{
    ActivitySource, Allocation, ClaimRequest, Comptroller, Exp, GenesisConfig, MarketListing,
    RewardVault, Transaction, EXP_SCALE,
};

const ACCOUNTS: u8 = 6;
const STEPS: usize = 400;
const POOL_FUNDING: u128 = 10_000 * EXP_SCALE;

fn admin() -> AccountId {
    AccountId::repeat_byte(0xad)
}

fn pool() -> AccountId {
    AccountId::repeat_byte(0xcc)
}

fn borrow_market() -> MarketId {
    MarketId::new("borrow-vbnb")
}

fn listings(with_borrow: bool) -> Vec<MarketListing> {
    let mut out = vec![MarketListing {
        id: MarketId::vai_mint(),
        kind: ActivityKind::Mint,
    }];
    if with_borrow {
        out.push(MarketListing {
            id: borrow_market(),
            kind: ActivityKind::Borrow,
        });
    }
    out
}

fn genesis() -> Comptroller {
    Comptroller::genesis(GenesisConfig {
        admin: admin(),
        emission_rate: Exp::from_mantissa(EXP_SCALE / 2),
        reward_pool: pool(),
        treasury_account: AccountId::repeat_byte(0x7e),
        treasury_owner: admin(),
        markets: listings(true),
        allocations: vec![Allocation {
            account: pool(),
            amount: POOL_FUNDING,
        }],
        start_block: 0,
    })
    .unwrap()
}

fn users() -> Vec<AccountId> {
    (1..=ACCOUNTS).map(AccountId::repeat_byte).collect()
}

fn pick_market(rng: &mut StdRng) -> MarketId {
    if rng.gen_bool(0.5) {
        MarketId::vai_mint()
    } else {
        borrow_market()
    }
}

fn random_tx(rng: &mut StdRng, c: &Comptroller, borrow_listed: &mut bool) -> Transaction {
    let users = users();
    let who = users[rng.gen_range(0..users.len())];
    match rng.gen_range(0..100) {
        0..=34 => Transaction::Mint {
            account: who,
            amount: rng.gen_range(1..=50) * EXP_SCALE / 10,
            market: pick_market(rng),
        },
        35..=49 => {
            let market = pick_market(rng);
            let held = c.activity().account_activity(&market, &who);
            // Occasionally ask for more than is held.
            let amount = if held == 0 || rng.gen_bool(0.1) {
                held + 1
            } else {
                rng.gen_range(1..=held)
            };
            Transaction::Redeem {
                account: who,
                amount,
                market,
            }
        }
        50..=59 => {
            let market = pick_market(rng);
            let held = c.activity().account_activity(&market, &who);
            Transaction::Transfer {
                from: who,
                to: users[rng.gen_range(0..users.len())],
                amount: held / 2,
                market,
            }
        }
        60..=84 => {
            let count = rng.gen_range(1..=4);
            let accounts = (0..count)
                .map(|_| users[rng.gen_range(0..users.len())])
                .collect();
            Transaction::Claim(ClaimRequest {
                accounts,
                markets: vec![],
                include_borrow: rng.gen_bool(0.5),
                include_supply: false,
            })
        }
        85..=92 => Transaction::SetEmissionRate {
            caller: if rng.gen_bool(0.9) { admin() } else { who },
            rate: Exp::from_mantissa(rng.gen_range(0..=20u128) * EXP_SCALE / 10),
        },
        _ => {
            *borrow_listed = !*borrow_listed;
            Transaction::SetEligibleMarkets {
                caller: admin(),
                markets: listings(*borrow_listed),
            }
        }
    }
}

fn assert_books_balance(c: &Comptroller) {
    let totals = c.totals();
    let owed = c.ledger().total_accrued().unwrap();
    assert!(
        totals.paid + owed <= totals.emitted - totals.discarded,
        "paid {} + owed {} exceeds distributable {}",
        totals.paid,
        owed,
        totals.emitted - totals.discarded
    );

    assert_eq!(c.token().balance_of(&pool()), POOL_FUNDING - totals.paid);
    assert_eq!(c.token().total_supply(), POOL_FUNDING);
    let held: u128 = users().iter().map(|u| c.token().balance_of(u)).sum();
    assert_eq!(held, totals.paid);

    for market in [MarketId::vai_mint(), borrow_market()] {
        let sum: u128 = users()
            .iter()
            .map(|u| c.activity().account_activity(&market, u))
            .sum();
        assert_eq!(c.activity().total_activity(&market), sum);

        let entry = c.ledger().market(&market).unwrap();
        if entry.eligible {
            assert_eq!(entry.state.block, c.height());
        }
    }
}

fn run(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut c = genesis();
    let mut borrow_listed = true;
    let mut height = 0u64;

    for _ in 0..STEPS {
        height += rng.gen_range(0..5);
        let listed_before = borrow_listed;
        let tx = random_tx(&mut rng, &c, &mut borrow_listed);
        let before = c.clone();
        if let Err(err) = c.apply(height, tx) {
            assert!(!err.is_fatal(), "invariant fault at height {}: {}", height, err);
            assert_eq!(c, before, "rejected transaction changed state");
            borrow_listed = listed_before;
        }
        assert_books_balance(&c);
    }
}

#[test]
fn test_conservation_seed_1() {
    run(1);
}

#[test]
fn test_conservation_seed_2() {
    run(2);
}

#[test]
fn test_conservation_seed_3() {
    run(3);
}

#[test]
fn test_replicas_agree() {
    // Two comptrollers fed the same stream end in the same state.
    let mut rng_a = StdRng::seed_from_u64(42);
    let mut rng_b = StdRng::seed_from_u64(42);
    let (mut a, mut b) = (genesis(), genesis());
    let (mut listed_a, mut listed_b) = (true, true);
    let mut height = 0u64;

    for _ in 0..100 {
        height += 1;
        let tx_a = random_tx(&mut rng_a, &a, &mut listed_a);
        let tx_b = random_tx(&mut rng_b, &b, &mut listed_b);
        assert_eq!(tx_a, tx_b);
        for result in [a.apply(height, tx_a), b.apply(height, tx_b)] {
            if let Err(err) = result {
                assert!(!err.is_fatal(), "invariant fault at height {}: {}", height, err);
            }
        }
    }

    let digest_a = annex_flywheel::LedgerSnapshot::capture(&a).digest().unwrap();
    let digest_b = annex_flywheel::LedgerSnapshot::capture(&b).digest().unwrap();
    assert_eq!(digest_a, digest_b);
}
