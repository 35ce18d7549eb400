// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sortwise::categories::{find_candidate, resolve_with_defaults, DEFAULT_CATEGORIES};
use sortwise::sorter::parse_reply;

#[derive(Arbitrary, Debug)]
struct Input {
    custom: Vec<String>,
    reply: String,
}

fuzz_target!(|input: Input| {
    let resolved = resolve_with_defaults(&input.custom, DEFAULT_CATEGORIES);

    // No two entries may collide after trimming and case folding
    for (i, a) in resolved.iter().enumerate() {
        assert!(!a.is_empty() && a.trim() == a);
        for b in &resolved[i + 1..] {
            assert!(!a.eq_ignore_ascii_case(b));
        }
    }
    assert!(resolved.len() >= DEFAULT_CATEGORIES.len());

    if let Some(answer) = parse_reply(&input.reply) {
        if let Some(hit) = find_candidate(&resolved, &answer) {
            assert!(resolved.iter().any(|c| c == hit));
        }
    }
});
