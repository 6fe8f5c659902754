//! Property tests for limit semantics.

use proptest::prelude::*;
use tiergate_types::Limit;

proptest! {
    /// A counted limit allows exactly while usage is strictly below it.
    #[test]
    fn count_allows_iff_below(max in 0u64..10_000, used in 0u64..20_000) {
        prop_assert_eq!(Limit::Count(max).allows(used), used < max);
    }

    /// Remaining plus used never exceeds the limit once usage is within it.
    #[test]
    fn remaining_complements_usage(max in 0u64..10_000, used in 0u64..10_000) {
        let remaining = Limit::Count(max).remaining(used).unwrap();
        if used <= max {
            prop_assert_eq!(remaining + used, max);
        } else {
            prop_assert_eq!(remaining, 0);
        }
        prop_assert_eq!(remaining > 0, Limit::Count(max).allows(used));
    }

    #[test]
    fn unlimited_always_allows(used in any::<u64>()) {
        prop_assert!(Limit::Unlimited.allows(used));
    }

    #[test]
    fn display_parses_back(max in any::<u64>()) {
        let limit = Limit::Count(max);
        prop_assert_eq!(limit.to_string().parse::<Limit>().unwrap(), limit);
    }
}
