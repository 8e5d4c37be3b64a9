// tests/version_test.rs
use esphome_release::domain::{Version, VersionFields};
use esphome_release::ReleaseError;

/// Every version with components 0..=2 and beta 0..=2, plus dev builds
fn grid() -> Vec<Version> {
    let mut versions = Vec::new();
    for major in 0..=2 {
        for minor in 0..=2 {
            for patch in 0..=2 {
                versions.push(Version::new(major, minor, patch));
                versions.push(Version::new_dev(major, minor, patch));
                for beta in 1..=2 {
                    versions.push(Version::new_beta(major, minor, patch, beta).unwrap());
                }
            }
        }
    }
    versions
}

#[test]
fn test_display_parses_back() {
    for version in grid() {
        let text = version.to_string();
        assert_eq!(Version::parse(&text).unwrap(), version, "{}", text);
        assert_eq!(text.parse::<Version>().unwrap(), version);
    }
}

#[test]
fn test_ordering_is_total_and_consistent() {
    let versions = grid();
    for a in &versions {
        for b in &versions {
            assert_eq!(a == b, a.cmp(b).is_eq(), "{} vs {}", a, b);
            assert_eq!(a.cmp(b), b.cmp(a).reverse(), "{} vs {}", a, b);
        }
    }

    let mut sorted = versions.clone();
    sorted.sort();
    for pair in sorted.windows(2) {
        assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
    }
}

#[test]
fn test_dev_before_beta_before_final() {
    let dev = Version::parse("2024.6.0-dev").unwrap();
    let beta1 = Version::parse("2024.6.0b1").unwrap();
    let beta2 = Version::parse("2024.6.0b2").unwrap();
    let full = Version::parse("2024.6.0").unwrap();
    let next_patch = Version::parse("2024.6.1").unwrap();
    assert!(dev < beta1);
    assert!(beta1 < beta2);
    assert!(beta2 < full);
    assert!(full < next_patch);
    assert!(Version::parse("2024.5.9").unwrap() < dev);
}

#[test]
fn test_transitions_move_forward() {
    for version in grid() {
        let dev = version.next_dev().unwrap();
        let patch = version.next_patch().unwrap();
        assert!(dev > version, "next_dev of {}", version);
        assert!(patch > version, "next_patch of {}", version);
        assert!(dev.dev());
        assert!(!patch.is_prerelease());
    }
}

#[test]
fn test_beta_steps_are_inverse() {
    for version in grid().into_iter().filter(Version::is_prerelease) {
        let next = version.next_beta().unwrap();
        assert!(next > version);
        assert_eq!(next.previous_beta().unwrap(), version);
    }
}

#[test]
fn test_patch_steps_are_inverse_for_releases() {
    for version in grid()
        .into_iter()
        .filter(|v| !v.is_prerelease() && !v.dev())
    {
        assert_eq!(version.next_patch().unwrap().previous_patch().unwrap(), version);
    }
}

#[test]
fn test_release_line_is_idempotent() {
    for version in grid() {
        let line = version.release_line();
        assert_eq!(line.release_line(), line);
        assert!(line.is_first_release());
        assert_eq!((line.major(), line.minor()), (version.major(), version.minor()));
    }
}

#[test]
fn test_transition_preconditions() {
    let full = Version::parse("2024.6.0").unwrap();
    assert!(matches!(
        full.next_beta(),
        Err(ReleaseError::InvalidTransition { .. })
    ));
    assert!(matches!(
        full.previous_beta(),
        Err(ReleaseError::InvalidTransition { .. })
    ));
    assert!(matches!(
        full.previous_patch(),
        Err(ReleaseError::InvalidTransition { .. })
    ));
    assert_eq!(
        Version::parse("2024.6.0b1")
            .unwrap()
            .previous_beta()
            .unwrap(),
        full
    );
}

#[test]
fn test_replace_keeps_invariant() {
    let dev = Version::parse("2024.7.0-dev").unwrap();
    let first_beta = dev
        .replace(VersionFields {
            beta: Some(1),
            dev: Some(false),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(first_beta.to_string(), "2024.7.0b1");
    assert!(first_beta.is_first_beta());

    assert!(dev
        .replace(VersionFields {
            beta: Some(1),
            ..Default::default()
        })
        .is_err());
}

#[test]
fn test_tag_prefix() {
    assert_eq!(Version::parse("2024.6.2").unwrap().tag(), "v2024.6.2");
    assert_eq!(Version::parse("2024.6.0b3").unwrap().tag(), "v2024.6.0b3");
}

#[test]
fn test_malformed_versions() {
    for text in ["", "2024", "2024.6", "2024.6.0b", "2024.6.0b0", "v2024.6.0", "2024.6.0b1-dev", "2024.6.0-beta"] {
        let err = Version::parse(text).unwrap_err();
        assert!(
            matches!(err, ReleaseError::InvalidVersionFormat { .. }),
            "{}",
            text
        );
    }
}
