mod support;

use campus_ride_core::slot_catalog::{SlotCatalog, SlotId};
use campus_ride_core::time_context::Direction;
use proptest::prelude::*;
use support::{config, test_date};

#[derive(Debug, Clone, Copy)]
enum Op {
    Reserve(bool),
    Release(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Reserve),
        any::<bool>().prop_map(Op::Release),
    ]
}

proptest! {
    /// §8 invariant 1: for any interleaving of reserve/release on a single
    /// slot, `0 <= used <= max` holds after every operation.
    #[test]
    fn slot_counters_stay_within_bounds(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let catalog = SlotCatalog::new(config());
        catalog.initialize_slots_for_date(test_date(), 5);
        let id = SlotId::new(test_date(), Direction::HomeToCampus, 8 * 60);

        for op in ops {
            match op {
                Op::Reserve(is_premium) => {
                    catalog.reserve_slot_capacity(&id, is_premium);
                }
                Op::Release(is_premium) => {
                    catalog.release_slot_capacity(&id, is_premium);
                }
            }
            let slot = catalog.get_slot_by_id(&id).unwrap();
            prop_assert!(slot.used_riders_premium <= slot.max_riders_premium);
            prop_assert!(slot.used_riders_non_premium <= slot.max_riders_non_premium);
        }
    }

    /// §8 invariant 5 (capacity half): a reserve immediately undone by a
    /// release restores the prior counter value, regardless of how many
    /// such round trips are interleaved.
    #[test]
    fn reserve_release_round_trips_restore_counters(rounds in 0usize..50) {
        let catalog = SlotCatalog::new(config());
        catalog.initialize_slots_for_date(test_date(), 5);
        let id = SlotId::new(test_date(), Direction::HomeToCampus, 8 * 60);

        let before = catalog.get_slot_by_id(&id).unwrap().used_riders_premium;
        for _ in 0..rounds {
            catalog.reserve_slot_capacity(&id, true);
            catalog.release_slot_capacity(&id, true);
        }
        let after = catalog.get_slot_by_id(&id).unwrap().used_riders_premium;
        prop_assert_eq!(before, after);
    }
}
