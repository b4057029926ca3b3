#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stacktrie::merkle::MerkleTrie;
use stacktrie::StackTrie;

#[derive(Arbitrary, Debug)]
struct Input {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

fuzz_target!(|input: Input| {
    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = input
        .entries
        .into_iter()
        .filter(|(key, value)| {
            !key.is_empty() && key.len() <= 64 && !value.is_empty() && value.len() <= 256
        })
        .collect();
    if entries.len() > 256 {
        entries.truncate(256);
    }

    // The streaming builder wants strictly increasing, prefix-free keys;
    // sorted order makes every prefix pair adjacent to its survivor.
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    entries.dedup_by(|next, kept| next.0.starts_with(&kept.0));

    let mut stack = StackTrie::new();
    let mut reference = MerkleTrie::new();
    for (key, value) in &entries {
        stack.update(key, value).expect("filtered keys are insertable");
        reference.insert(key, value.clone());
    }

    assert_eq!(stack.hash(), reference.root_hash());
});
