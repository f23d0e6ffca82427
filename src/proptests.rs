use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::HashMap;

const COUNT: usize = 0;
const SUM: usize = 1;
const KEY_ID: usize = 2;
const KEY_TAG: usize = 3;
const KEY_BUCKET: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Arbitrary)]
struct GroupKey {
    #[proptest(strategy = "0i32..6")]
    id: i32,
    #[proptest(strategy = "prop::option::of(\"[a-c]{0,3}\")")]
    tag: Option<String>,
    #[proptest(strategy = "-2i64..2")]
    bucket: i64,
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 12)]
    Add {
        key: GroupKey,
        #[proptest(strategy = "-100i64..100")]
        amount: i64,
    },
    #[proptest(weight = 6)]
    Find(GroupKey),
    #[proptest(weight = 1)]
    Clear,
}

fn new_map(page_size: usize, load_factor: f64) -> FastMap {
    FastMap::new(
        FastMapConfig::default()
            .with_page_size(page_size)
            .with_key_capacity(1)
            .with_load_factor(load_factor),
        [ColumnType::Int, ColumnType::String, ColumnType::Long],
        [ColumnType::Long, ColumnType::Long],
    )
    .unwrap()
}

fn write_key<'a>(map: &'a mut FastMap, key: &GroupKey) -> MapKey<'a, Xxh3> {
    let mut k = map.with_key();
    k.put_int(key.id)
        .unwrap()
        .put_str(key.tag.as_deref())
        .unwrap()
        .put_long(key.bucket)
        .unwrap();
    k
}

fn read_key(record: &MapRecord<'_>) -> GroupKey {
    GroupKey {
        id: record.get_int(KEY_ID),
        tag: record.get_str(KEY_TAG).map(str::to_string),
        bucket: record.get_long(KEY_BUCKET),
    }
}

fn validate_map(map: &FastMap) {
    let live: Vec<usize> = map.directory.live().collect();
    assert_eq!(live.len(), map.size(), "live slots must match size");
    assert!(map.capacity().is_power_of_two());
    assert!(
        (map.size() as f64) < map.capacity() as f64 * map.load_factor() || map.size() == 0,
        "occupancy must stay under the load factor"
    );
    for offset in live {
        assert!(offset < map.arena.size(), "record offset past the durable tail");
    }
}

fn snapshot(map: &FastMap) -> HashMap<GroupKey, (i64, i64)> {
    map.cursor()
        .map(|r| (read_key(&r), (r.get_long(COUNT), r.get_long(SUM))))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_hash_map(ops in prop::collection::vec(any::<Op>(), 0..=600)) {
        // Small page and low load factor so both the arena and the directory grow.
        let mut m = new_map(16, 0.3);
        let mut model: HashMap<GroupKey, (i64, i64)> = HashMap::new();

        for op in ops {
            match op {
                Op::Add { key, amount } => {
                    let mut v = write_key(&mut m, &key).create().unwrap();
                    let expected_new = !model.contains_key(&key);
                    prop_assert_eq!(v.is_new(), expected_new);
                    v.add_long(COUNT, 1);
                    v.add_long(SUM, amount);

                    let entry = model.entry(key).or_insert((0, 0));
                    entry.0 += 1;
                    entry.1 += amount;
                }
                Op::Find(key) => {
                    let got = write_key(&mut m, &key)
                        .find()
                        .unwrap()
                        .map(|v| (v.get_long(COUNT), v.get_long(SUM)));
                    prop_assert_eq!(got, model.get(&key).copied());
                }
                Op::Clear => {
                    m.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(m.size(), model.len());
        }

        validate_map(&m);
        prop_assert_eq!(snapshot(&m), model);
    }

    #[test]
    fn prop_find_is_idempotent(keys in prop::collection::vec(any::<GroupKey>(), 1..=100), probe in any::<GroupKey>()) {
        let mut m = new_map(64, 0.5);
        for key in &keys {
            write_key(&mut m, key).create().unwrap().add_long(COUNT, 1);
        }

        let slots: Vec<usize> = m.directory.live().collect();
        let arena_size = m.arena_size();
        let before = snapshot(&m);

        for _ in 0..3 {
            let _ = write_key(&mut m, &probe).find().unwrap();
        }

        prop_assert_eq!(m.directory.live().collect::<Vec<_>>(), slots);
        prop_assert_eq!(m.arena_size(), arena_size);
        prop_assert_eq!(snapshot(&m), before);
    }

    #[test]
    fn prop_arena_growth_preserves_records(tags in prop::collection::vec("[a-z]{0,200}", 1..=60)) {
        let mut m = FastMap::new(
            FastMapConfig::default().with_page_size(8),
            [ColumnType::String, ColumnType::Int],
            [ColumnType::Long],
        )
        .unwrap();

        let mut addresses: HashMap<String, usize> = HashMap::new();
        for (i, tag) in tags.iter().enumerate() {
            let mut key = m.with_key();
            key.put_str(Some(tag.as_str())).unwrap().put_int(tag.len() as i32).unwrap();
            let mut v = key.create().unwrap();
            if v.is_new() {
                v.put_long(0, i as i64);
                addresses.insert(tag.clone(), v.address());
            }
        }
        prop_assert!(m.resize_count() > 0);

        for (tag, address) in &addresses {
            let mut key = m.with_key();
            key.put_str(Some(tag.as_str())).unwrap().put_int(tag.len() as i32).unwrap();
            let v = key.find().unwrap().unwrap();
            prop_assert_eq!(v.address(), *address);

            let record = m.record_at(*address - 4);
            prop_assert_eq!(record.get_str(1), Some(tag.as_str()));
            prop_assert_eq!(record.get_int(2), tag.len() as i32);
        }
    }
}

#[test]
fn rehash_keeps_every_key_reachable() {
    let mut m = new_map(1024, 0.5);
    let mut capacity = m.capacity();
    let mut inserted = Vec::new();

    for id in 0..2000 {
        let key = GroupKey {
            id,
            tag: if id % 3 == 0 { None } else { Some(format!("t{}", id % 17)) },
            bucket: (id % 5) as i64,
        };
        write_key(&mut m, &key).create().unwrap().put_long(SUM, id as i64);
        inserted.push(key);

        if m.capacity() != capacity {
            assert_eq!(m.capacity(), capacity * 2, "rehash must exactly double");
            capacity = m.capacity();
            for (i, k) in inserted.iter().enumerate() {
                let v = write_key(&mut m, k).find().unwrap().unwrap();
                assert_eq!(v.get_long(SUM), i as i64);
            }
        }
    }

    validate_map(&m);
    assert_eq!(m.size(), 2000);
}

#[test]
fn merge_matches_single_map() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(7);
    let rows: Vec<(GroupKey, i64)> = (0..5000)
        .map(|_| {
            let key = GroupKey {
                id: rng.gen_range(0..20),
                tag: if rng.gen_bool(0.1) {
                    None
                } else {
                    Some(["a", "bb", "ccc"][rng.gen_range(0..3)].to_string())
                },
                bucket: rng.gen_range(-3..3),
            };
            (key, rng.gen_range(-1000..1000))
        })
        .collect();

    let mut single = new_map(256, 0.5);
    for (key, amount) in &rows {
        let mut v = write_key(&mut single, key).create().unwrap();
        v.add_long(COUNT, 1);
        v.add_long(SUM, *amount);
    }

    let mut workers: Vec<FastMap> = (0..4).map(|_| new_map(256, 0.5)).collect();
    for (i, (key, amount)) in rows.iter().enumerate() {
        let m = &mut workers[i % 4];
        let mut v = write_key(m, key).create().unwrap();
        v.add_long(COUNT, 1);
        v.add_long(SUM, *amount);
    }

    let mut merged = workers.remove(0);
    for other in &workers {
        merged
            .merge(other, |dst, src| {
                dst.add_long(COUNT, src.get_long(COUNT));
                dst.add_long(SUM, src.get_long(SUM));
                Ok(())
            })
            .unwrap();
    }

    validate_map(&merged);
    assert_eq!(snapshot(&merged), snapshot(&single));
}
