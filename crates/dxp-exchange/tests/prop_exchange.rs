// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS - dxp-exchange
//
// Reserve product, share accounting and custody for arbitrary swap and
// liquidity sequences.
// Run: cargo test -p dxp-exchange --test prop_exchange
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dxp_core::{Address, WAD};
use dxp_exchange::{math, ExchangeConfig, ExchangeLedger, PairKey, SwapRoute};
use dxp_token::{FungibleAsset, Token, TokenRegistry};
use proptest::prelude::*;

const PROVIDERS: usize = 3;

fn addr(label: &str) -> Address {
    Address::derive(label.as_bytes())
}

fn provider(i: usize) -> Address {
    Address::derive(&[b'p', i as u8])
}

/// Two tokens, every provider funded with 10_000 of each and unlimited
/// approval to the exchange.
fn setup(fee_bps: u128) -> (ExchangeLedger, TokenRegistry) {
    let owner = addr("owner");
    let dex = addr("dex");
    let mut bank = TokenRegistry::new();
    for label in ["tta", "ttb"] {
        let mut t = Token::deploy(addr(label), label, label, 18, 1_000_000 * WAD, owner.clone()).unwrap();
        for i in 0..PROVIDERS {
            t.transfer(&owner, &provider(i), 10_000 * WAD).unwrap();
            t.approve(&provider(i), &dex, u128::MAX).unwrap();
        }
        bank.insert(t).unwrap();
    }
    let ledger = ExchangeLedger::new(dex, ExchangeConfig { fee_bps }).unwrap();
    (ledger, bank)
}

#[derive(Debug, Clone)]
enum Op {
    Add { who: usize, a: u128, b: u128 },
    Remove { who: usize, pct: u128 },
    Swap { who: usize, a_to_b: bool, amount: u128 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    let who = 0usize..PROVIDERS;
    let amount = 1u128..=500 * WAD;
    prop_oneof![
        (who.clone(), amount.clone(), amount.clone()).prop_map(|(who, a, b)| Op::Add { who, a, b }),
        (who.clone(), 1u128..=100).prop_map(|(who, pct)| Op::Remove { who, pct }),
        (who, any::<bool>(), amount).prop_map(|(who, a_to_b, amount)| Op::Swap { who, a_to_b, amount }),
    ]
}

fn apply(ledger: &mut ExchangeLedger, bank: &mut TokenRegistry, op: &Op) {
    let (tta, ttb) = (addr("tta"), addr("ttb"));
    // Failures are fine; they are checked to leave no trace elsewhere.
    let _ = match op {
        Op::Add { who, a, b } => ledger
            .add_liquidity(bank, &tta, &ttb, *a, *b, 0, &provider(*who))
            .map(|_| ()),
        Op::Remove { who, pct } => {
            let held = ledger.position(&provider(*who), &tta, &ttb);
            let shares = held * pct / 100;
            ledger
                .remove_liquidity_shares(bank, &tta, &ttb, shares, 0, 0, &provider(*who))
                .map(|_| ())
        }
        Op::Swap { who, a_to_b, amount } => {
            let route = if *a_to_b {
                SwapRoute::single(tta, ttb)
            } else {
                SwapRoute::single(ttb, tta)
            }
            .unwrap();
            ledger
                .swap_exact_in(bank, &route, *amount, 0, &provider(*who))
                .map(|_| ())
        }
    };
}

proptest! {
    /// PROPERTY: shares outstanding equal the sum of positions, and the
    /// exchange's token balances equal its reserves.
    #[test]
    fn prop_shares_and_custody_consistent(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let (mut ledger, mut bank) = setup(30);
        for op in &ops {
            apply(&mut ledger, &mut bank, op);
            let key = PairKey::new(&addr("tta"), &addr("ttb")).unwrap();
            if let Some(pair) = ledger.pair(&addr("tta"), &addr("ttb")) {
                let sum: u128 = ledger.positions(&key).iter().map(|(_, s)| *s).sum();
                prop_assert_eq!(sum, pair.total_shares);
                let held_a = bank.balance_of(&addr("tta"), ledger.address()).unwrap();
                let held_b = bank.balance_of(&addr("ttb"), ledger.address()).unwrap();
                prop_assert_eq!(pair.reserve_of(&addr("tta")), Some(held_a));
                prop_assert_eq!(pair.reserve_of(&addr("ttb")), Some(held_b));
                if pair.total_shares == 0 {
                    prop_assert_eq!(pair.k(), 0u128.into());
                }
            }
        }
    }

    /// PROPERTY: a swap never lowers the reserve product.
    #[test]
    fn prop_swap_never_lowers_k(
        ra in 1u128..=5_000 * WAD,
        rb in 1u128..=5_000 * WAD,
        amount in 1u128..=5_000 * WAD,
        fee_bps in 0u128..=1_000,
        a_to_b in any::<bool>(),
    ) {
        let (mut ledger, mut bank) = setup(fee_bps);
        let (tta, ttb) = (addr("tta"), addr("ttb"));
        prop_assume!(math::sqrt_product(ra, rb) > 0);
        ledger.add_liquidity(&mut bank, &tta, &ttb, ra, rb, 0, &provider(0)).unwrap();
        let k_before = ledger.pair(&tta, &ttb).unwrap().k();

        let route = if a_to_b { SwapRoute::single(tta.clone(), ttb.clone()) } else { SwapRoute::single(ttb.clone(), tta.clone()) }.unwrap();
        if ledger.swap_exact_in(&mut bank, &route, amount, 0, &provider(1)).is_ok() {
            prop_assert!(ledger.pair(&tta, &ttb).unwrap().k() >= k_before);
        } else {
            prop_assert_eq!(ledger.pair(&tta, &ttb).unwrap().k(), k_before);
        }
    }

    /// PROPERTY: a sole provider's add followed by a full remove returns
    /// exactly what was deposited.
    #[test]
    fn prop_sole_provider_round_trip(a in 1u128..=5_000 * WAD, b in 1u128..=5_000 * WAD) {
        let (mut ledger, mut bank) = setup(30);
        let (tta, ttb) = (addr("tta"), addr("ttb"));
        let p = provider(0);
        prop_assume!(math::sqrt_product(a, b) > 0);
        let added = ledger.add_liquidity(&mut bank, &tta, &ttb, a, b, 0, &p).unwrap();
        prop_assert_eq!((added.amount_a, added.amount_b), (a, b));
        let removed = ledger.remove_liquidity(&mut bank, &tta, &ttb, &p).unwrap();
        prop_assert_eq!((removed.amount_a, removed.amount_b), (a, b));
        prop_assert_eq!(bank.balance_of(&tta, &p).unwrap(), 10_000 * WAD);
        prop_assert_eq!(bank.balance_of(&ttb, &p).unwrap(), 10_000 * WAD);
    }

    /// PROPERTY: a later provider never withdraws more than they put in when
    /// no swaps happen in between.
    #[test]
    fn prop_late_provider_cannot_extract_value(
        ra in WAD..=2_000 * WAD,
        rb in WAD..=2_000 * WAD,
        a in 1u128..=2_000 * WAD,
        b in 1u128..=2_000 * WAD,
    ) {
        let (mut ledger, mut bank) = setup(30);
        let (tta, ttb) = (addr("tta"), addr("ttb"));
        ledger.add_liquidity(&mut bank, &tta, &ttb, ra, rb, 0, &provider(0)).unwrap();
        if let Ok(added) = ledger.add_liquidity(&mut bank, &tta, &ttb, a, b, 0, &provider(1)) {
            prop_assert!(added.amount_a <= a && added.amount_b <= b);
            let removed = ledger.remove_liquidity(&mut bank, &tta, &ttb, &provider(1)).unwrap();
            prop_assert!(removed.amount_a <= added.amount_a);
            prop_assert!(removed.amount_b <= added.amount_b);
        }
    }
}
