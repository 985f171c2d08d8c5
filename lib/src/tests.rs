/*! End-to-end tests.

The module-level tests cover each component in isolation; the tests here
exercise the public API and check that every accelerated strategy reports
exactly the matches the general evaluator reports.
*/

use pretty_assertions::assert_eq;

use crate::eval;
use crate::literals;
use crate::parser::Parser;
use crate::{automaton::Automaton, Error, Regex, RegexBuilder};

/// Patterns spanning every strategy the dispatcher can pick.
const PATTERNS: &[&str] = &[
    "foobar",
    "Tom|Sawyer|Huckleberry|Finn",
    "doc[il1]ment",
    "(foo|bar)test",
    "(runn|jump|walk)ing",
    "a+",
    "a*",
    "a+?",
    "[0-9]{2,4}",
    "[a-z]+test",
    "[a-z]+[0-9]+",
    "(ab|cd)+x",
    "(ax|bx|cx|dx|ex|fx|gx|hx|ix|jx|kx|lx|mx|nx|ox|px|qx)",
];

/// Fragments embedded into haystacks at varying offsets, so matches fall
/// on both sides of the 16 and 32 byte vector-chunk boundaries.
const FRAGMENTS: &[&str] = &[
    "foobar",
    "footest",
    "bartest",
    "doc1ment",
    "Huckleberry",
    "walking",
    "aaa",
    "xyz1234",
    "abcdx",
    "qx",
];

fn corpus() -> Vec<Vec<u8>> {
    let mut haystacks: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"no occurrence at all".to_vec(),
        b"....".to_vec(),
    ];
    // Padding uses '.', which no pattern in the corpus can consume, so
    // matches stay within the lookback window of the prefiltered paths.
    for fragment in FRAGMENTS {
        for offset in [0usize, 1, 7, 15, 16, 17, 31, 32, 45] {
            let mut hay = vec![b'.'; offset];
            hay.extend_from_slice(fragment.as_bytes());
            hay.extend_from_slice(b"....");
            haystacks.push(hay);
        }
    }
    haystacks
}

/// Reference result: the evaluator, unaided by any acceleration.
fn reference_find(pattern: &str, haystack: &[u8]) -> Option<(usize, usize)> {
    let hir = Parser::new().parse(pattern).unwrap();
    eval::find(&hir, haystack, 0)
}

#[test]
fn strategies_agree_with_the_evaluator() {
    for pattern in PATTERNS {
        let re = Regex::new(pattern).unwrap();
        for haystack in corpus() {
            let expected = reference_find(pattern, &haystack);
            let found = re.find(&haystack).map(|m| (m.start(), m.end()));
            assert_eq!(
                found,
                expected,
                "pattern {:?} ({}) on {:?}",
                pattern,
                re.strategy_name(),
                String::from_utf8_lossy(&haystack),
            );
        }
    }
}

#[test]
fn anchored_matching_agrees_with_the_evaluator() {
    // The whole-input entry point runs on the bit-parallel automaton
    // when the dispatcher picked it, and on the evaluator otherwise;
    // both must answer identically.
    for pattern in PATTERNS {
        let hir = Parser::new().parse(pattern).unwrap();
        let re = Regex::new(pattern).unwrap();
        for haystack in corpus() {
            assert_eq!(
                re.matches(&haystack),
                eval::matches(&hir, &haystack),
                "pattern {:?} ({}) on {:?}",
                pattern,
                re.strategy_name(),
                String::from_utf8_lossy(&haystack),
            );
        }
    }
    let re = Regex::new("(ax|bx|cx|dx|ex|fx|gx|hx|ix|jx|kx|lx|mx|nx|ox|px|qx)")
        .unwrap();
    assert_eq!(re.strategy_name(), "bitnfa");
    assert!(re.matches(b"dx"));
    assert!(!re.matches(b"..dx.."));
}

#[test]
fn extracted_literals_are_mandatory() {
    // Every match of the pattern must contain the extracted literal;
    // otherwise prefiltering would produce false negatives.
    for pattern in PATTERNS {
        let hir = Parser::new().parse(pattern).unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        let lits = literals::extract(&automaton, &hir);
        let Some(best) = lits.best else { continue };
        for haystack in corpus() {
            if let Some((start, end)) = reference_find(pattern, &haystack) {
                let matched = &haystack[start..end];
                assert!(
                    matched
                        .windows(best.bytes.len())
                        .any(|w| w == best.bytes.as_slice()),
                    "pattern {:?}: match {:?} lacks literal {:?}",
                    pattern,
                    String::from_utf8_lossy(matched),
                    best.bytes,
                );
            }
        }
    }
}

#[test]
fn prefilter_requires_no_occurrence_to_reject() {
    let re = Regex::new("[a-z]+test").unwrap();
    assert_eq!(re.strategy_name(), "prefilter");
    assert!(!re.is_match(b"plenty of lowercase but nothing else"));
    let m = re.find(b"00 footest 11").unwrap();
    assert_eq!(m.range(), 3..10);
}

#[test]
fn alternation_with_shared_suffix() {
    let re = Regex::new("(foo|bar)test").unwrap();
    assert!(re.is_match(b"== bartest =="));
    assert!(re.is_match(b"== footest =="));
    assert!(!re.is_match(b"== footes t =="));

    let re = Regex::new("(runn|jump|walk)ing").unwrap();
    let m = re.find(b"they were walking fast").unwrap();
    assert_eq!(m.as_bytes(), b"walking");
    assert!(!re.is_match(b"sing and swing"));
}

#[test]
fn literal_alternation_dispatch() {
    let re = Regex::new("Tom|Sawyer|Huckleberry|Finn").unwrap();
    assert_eq!(re.strategy_name(), "literal-set");
    let m = re.find(b"adventures of Huckleberry Finn").unwrap();
    assert_eq!(m.as_bytes(), b"Huckleberry");
    assert!(!re.is_match(b"NoMatch"));
}

#[test]
fn oversized_patterns_are_rejected() {
    let pattern = "a".repeat(600);
    assert!(matches!(
        Regex::new(&pattern),
        Err(Error::TooManyPositions { max: 512 })
    ));
    assert!(matches!(Regex::new("(foo"), Err(Error::Syntax(_))));
}

#[test]
fn large_exact_patterns_skip_the_bit_parallel_automaton() {
    // 150 positions: too many for the 128-state budget, fine for the
    // 512-position automaton. Preparation must succeed without BitNFA.
    let branches: Vec<String> =
        (0..50).map(|i| format!("x{:02}", i)).collect();
    let re = Regex::new(&branches.join("|")).unwrap();
    assert_eq!(re.strategy_name(), "evaluator");
    assert!(re.is_match(b"..x33.."));
    assert!(!re.is_match(b"..x77.."));
}

#[test]
fn find_iter_is_non_overlapping() {
    let re = Regex::new("a+").unwrap();
    let spans: Vec<_> =
        re.find_iter(b"aa b aaa").map(|m| m.range()).collect();
    assert_eq!(spans, vec![0..2, 5..8]);

    // Empty matches advance one byte at a time.
    let re = Regex::new("a*").unwrap();
    let spans: Vec<_> = re.find_iter(b"ab").map(|m| m.range()).collect();
    assert_eq!(spans, vec![0..1, 1..1, 2..2]);

    let re = Regex::new("Tom|Sawyer|Huckleberry|Finn").unwrap();
    let names: Vec<_> = re
        .find_iter(b"Tom, Huckleberry and Tom")
        .map(|m| m.as_bytes())
        .collect();
    assert_eq!(names, vec![b"Tom" as &[u8], b"Huckleberry", b"Tom"]);
}

#[test]
fn captures_through_the_public_api() {
    let re = Regex::new("(foo|bar)(test)").unwrap();
    let caps = re.captures(b"== bartest ==").unwrap();
    assert_eq!(caps.len(), 3);
    assert_eq!(caps.get(0).unwrap().as_bytes(), b"bartest");
    assert_eq!(caps.get(1).unwrap().as_bytes(), b"bar");
    assert_eq!(caps.get(2).unwrap().as_bytes(), b"test");
    assert_eq!(caps.get(3).map(|m| m.range()), None);
    assert!(re.captures(b"nothing").is_none());
}

#[test]
fn builder_flags() {
    let re = RegexBuilder::new()
        .case_insensitive(true)
        .build("test")
        .unwrap();
    assert!(re.is_match(b"== TeSt =="));
    assert!(!Regex::new("test").unwrap().is_match(b"== TeSt =="));

    let re = RegexBuilder::new()
        .dot_matches_new_line(true)
        .build("a.b")
        .unwrap();
    assert!(re.is_match(b"a\nb"));
    assert!(!Regex::new("a.b").unwrap().is_match(b"a\nb"));
}

#[test]
fn preparation_is_idempotent() {
    for pattern in PATTERNS {
        let first = Regex::new(pattern).unwrap();
        let second = Regex::new(pattern).unwrap();
        assert_eq!(first.strategy_name(), second.strategy_name());
        for haystack in corpus() {
            assert_eq!(
                first.find(&haystack).map(|m| m.range()),
                second.find(&haystack).map(|m| m.range()),
            );
        }
    }
}

#[test]
fn prepared_patterns_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Regex>();
}
