use firewall_core::dns::{filter, FilterOutcome, IPScope, RRCache, RR};
use firewall_core::profile::{Capability, ProfileMode, ProfileSet};

/// A Global-scoped resolver response gets its loopback and site-local
/// answers stripped by the scope filter; the global address survives.
#[test]
fn global_resolver_strips_loopback_and_site_local() {
    let cache = RRCache::new(
        vec![
            RR::A("127.0.0.1".parse().unwrap()),
            RR::A("192.168.1.5".parse().unwrap()),
            RR::A("8.8.8.8".parse().unwrap()),
        ],
        IPScope::Global,
        0,
    );
    let profile_set = ProfileSet::new(
        ProfileMode::Blacklist,
        vec![Capability::Internet, Capability::LAN, Capability::Localhost],
        "app",
    );

    match filter(&cache, "example.com.", &profile_set, true, false) {
        FilterOutcome::Filtered(result) => {
            assert_eq!(result.answer, vec![RR::A("8.8.8.8".parse().unwrap())]);
            assert!(result.filtered);
            assert_eq!(
                result.filtered_entries,
                vec!["A 127.0.0.1".to_string(), "A 192.168.1.5".to_string()]
            );
        }
        FilterOutcome::Unchanged(_) => panic!("expected Filtered, got Unchanged"),
        FilterOutcome::Suppressed => panic!("expected Filtered, got Suppressed"),
    }
}
