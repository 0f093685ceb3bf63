//! Property-based tests for parsing, classification and host key invariants.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use rigger_cli::domain::classify::{ClassifierKind, ProgressEvent};
use rigger_cli::domain::config::ExtraFile;
use rigger_cli::domain::remote::{remote_join, shell_quote};
use rigger_cli::domain::ssh::{sha256_fingerprint, verify_fingerprint};
use rigger_cli::domain::status::parse_service_ls;

// ============================================================================
// Stack classifier
// ============================================================================

proptest! {
    /// Each service id converges at most once, however often swarm repeats it.
    #[test]
    fn prop_each_service_converges_once(ids in prop::collection::vec("[a-z][a-z0-9]{0,5}", 1..20)) {
        let mut classifier = ClassifierKind::Stack.build();
        let mut events = Vec::new();
        for id in &ids {
            events.extend(classifier.feed(&format!("verify: Service {id} converged")));
        }
        events.extend(classifier.finish());

        let converged = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ServiceConverged { .. }))
            .count();
        let distinct: std::collections::HashSet<_> = ids.iter().collect();
        prop_assert_eq!(converged, distinct.len());
    }

    /// Classifiers accept any input without panicking.
    #[test]
    fn prop_classifiers_accept_arbitrary_lines(lines in prop::collection::vec(".{0,80}", 0..30)) {
        for kind in [ClassifierKind::Compose, ClassifierKind::Stack] {
            let mut classifier = kind.build();
            for line in &lines {
                let _ = classifier.feed(line);
            }
            let _ = classifier.finish();
        }
    }
}

// ============================================================================
// Host key fingerprints
// ============================================================================

proptest! {
    /// A key always verifies against its own fingerprint.
    #[test]
    fn prop_fingerprint_verifies_itself(key in prop::collection::vec(any::<u8>(), 1..512)) {
        let fp = sha256_fingerprint(&key);
        prop_assert!(fp.starts_with("SHA256:"));
        prop_assert_eq!(fp.len(), "SHA256:".len() + 43);
        prop_assert!(verify_fingerprint(&key, &fp).is_ok());
        let padded = format!("  {fp}\n");
        prop_assert!(verify_fingerprint(&key, &padded).is_ok());
    }

    /// Changing any byte of the key breaks verification.
    #[test]
    fn prop_altered_key_is_rejected(
        key in prop::collection::vec(any::<u8>(), 1..256),
        idx in any::<prop::sample::Index>(),
    ) {
        let fp = sha256_fingerprint(&key);
        let mut altered = key.clone();
        let i = idx.index(altered.len());
        altered[i] ^= 0x01;
        prop_assert!(verify_fingerprint(&altered, &fp).is_err());
    }
}

// ============================================================================
// Remote paths and quoting
// ============================================================================

proptest! {
    /// Joined paths stay absolute and never contain empty segments.
    #[test]
    fn prop_remote_join_normalises(
        base in "(/[a-z]{1,8}){1,4}/?",
        rest in "(\\./)?([a-z]{1,8}/){0,3}[a-z.]{1,8}",
    ) {
        let joined = remote_join(&base, &rest);
        prop_assert!(joined.starts_with('/'));
        prop_assert!(!joined.contains("//"), "got {}", joined);
        prop_assert!(!joined.contains("/./"), "got {}", joined);
    }

    /// Quoted values are either untouched safe words or fully single-quoted.
    #[test]
    fn prop_shell_quote_is_safe_or_wrapped(value in ".{0,40}") {
        let quoted = shell_quote(&value);
        if quoted == value {
            prop_assert!(!value.is_empty());
            prop_assert!(!value.contains(['\'', ' ', ';', '$', '`', '&', '|']));
        } else {
            prop_assert!(quoted.starts_with('\'') && quoted.ends_with('\''));
        }
    }
}

// ============================================================================
// Input parsing
// ============================================================================

proptest! {
    /// `[flatten ]src[:dst]` round-trips through the parser.
    #[test]
    fn prop_extra_file_entry_parses(
        flatten in any::<bool>(),
        src in "[a-z./*]{1,20}",
        dst in prop::option::of("[a-z/]{1,12}"),
    ) {
        let mut line = String::new();
        if flatten {
            line.push_str("flatten ");
        }
        line.push_str(&src);
        if let Some(dst) = &dst {
            line.push(':');
            line.push_str(dst);
        }
        let parsed: ExtraFile = line.parse().expect("valid entry");
        prop_assert_eq!(parsed.flatten, flatten);
        prop_assert_eq!(parsed.src, src);
        prop_assert_eq!(parsed.dst, dst);
    }

    /// Replica columns parse back to the counts they were printed from.
    #[test]
    fn prop_service_rows_parse(running in 0u32..50, desired in 0u32..50, name in "[a-z_]{1,12}") {
        let row = format!("{name}\t{running}/{desired}\tnginx:1\n");
        let services = parse_service_ls(&row);
        prop_assert_eq!(services.len(), 1);
        prop_assert_eq!(services[0].running, running);
        prop_assert_eq!(services[0].desired, desired);
        prop_assert_eq!(services[0].is_converged(), running == desired);
    }
}
