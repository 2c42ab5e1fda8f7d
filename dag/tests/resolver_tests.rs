mod common;

use common::Fixture;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use weave_dag::DagError;
use weave_types::{AssetId, Hash};

#[test]
fn concurrent_authoring_keeps_both_units_one_on_trunk() {
    let f = Fixture::new(3);
    let tip = f.unit(0, vec![f.genesis], 1);
    f.insert(&tip);

    let left = f.unit(1, vec![tip.hash()], 2);
    let right = f.unit(2, vec![tip.hash()], 3);
    f.insert(&left);
    f.insert(&right);

    assert!(f.resolver.contains(&left.hash()));
    assert!(f.resolver.contains(&right.hash()));
    let left_main = f.resolver.chain_index(&left.hash()).unwrap().is_main;
    let right_main = f.resolver.chain_index(&right.hash()).unwrap().is_main;
    assert!(left_main ^ right_main, "exactly one sibling is on the trunk");

    let winner = left.hash().min(right.hash());
    assert_eq!(f.resolver.main_chain(&AssetId::PTN).last(), Some(&winner));
    f.assert_main_chain_contiguous();
}

#[test]
fn later_merge_keeps_loser_off_trunk_and_in_dag() {
    let f = Fixture::new(3);
    let tip = f.unit(0, vec![f.genesis], 1);
    f.insert(&tip);
    let a = f.unit(1, vec![tip.hash()], 2);
    let b = f.unit(2, vec![tip.hash()], 3);
    f.insert(&a);
    f.insert(&b);

    let merge = f.unit(0, vec![a.hash(), b.hash()], 4);
    f.insert(&merge);
    let loser = a.hash().max(b.hash());
    assert!(!f.resolver.chain_index(&loser).unwrap().is_main);
    assert_eq!(f.resolver.free_units(&AssetId::PTN), vec![merge.hash()]);
    f.assert_main_chain_contiguous();
}

#[test]
fn three_parent_units_compare_full_parent_sets() {
    let f = Fixture::new(3);
    let root = f.unit(0, vec![f.genesis], 1);
    f.insert(&root);
    let p1 = f.unit(0, vec![root.hash()], 2);
    let p2 = f.unit(1, vec![root.hash()], 3);
    let p3 = f.unit(2, vec![root.hash()], 4);
    for p in [&p1, &p2, &p3] {
        f.insert(p);
    }

    let forward = f.unit(0, vec![p1.hash(), p2.hash(), p3.hash()], 5);
    let reversed = f.unit(0, vec![p3.hash(), p2.hash(), p1.hash()], 5);
    assert_ne!(forward.hash(), reversed.hash());
    assert!(forward.header().same_parent_set(reversed.header()));
    assert!(!forward.header().same_parents(reversed.header()));

    // same first two parents, different third
    let other_third = f.unit(0, vec![p1.hash(), p2.hash(), root.hash()], 5);
    assert!(!forward.header().same_parent_set(other_third.header()));

    f.insert(&forward);
    let ins = f.insert(&reversed);
    assert_eq!(ins.double_authored, Some(forward.hash()));

    let ins = f.insert(&other_third);
    assert_eq!(ins.double_authored, None);
    f.assert_main_chain_contiguous();
}

#[test]
fn unauthorized_author_never_enters_dag() {
    let f = Fixture::new(3);
    let outsider = weave_crypto::keypair_from_seed(&[99; 32]);
    let mut header = weave_dag::Header::new(vec![f.genesis], vec![AssetId::PTN], 10, 0, vec![])
        .unwrap();
    header.sign(&outsider);
    let unit = weave_dag::Unit::new(&header, Vec::<weave_dag::Transaction>::new());
    let err = f
        .resolver
        .insert_unit(unit.clone(), &f.schedule)
        .unwrap_err();
    assert!(matches!(err, DagError::UnauthorizedAuthor(_)));
    assert!(!f.resolver.contains(&unit.hash()));
    assert_eq!(f.resolver.main_chain_len(&AssetId::PTN), 1);
}

#[test]
fn stable_units_stay_stable_as_dag_grows() {
    let f = Fixture::new(3);
    let mut stable: HashSet<Hash> = HashSet::from([f.genesis]);
    let mut parents = vec![f.genesis];
    for n in 0..30u64 {
        let author = (n % 3) as usize;
        let unit = f.unit(author, parents.clone(), n + 1);
        let ins = f.insert(&unit);
        for (_, hash) in &ins.stabilized {
            stable.insert(*hash);
        }
        for hash in &stable {
            assert!(f.resolver.is_stable(hash));
        }
        // every second unit of a triple forks beside the previous one;
        // the next unit merges all tips
        if n % 3 != 1 {
            parents = f.resolver.free_units(&AssetId::PTN);
        }
    }
    assert!(f.resolver.last_stable_index(&AssetId::PTN).unwrap() > 10);
    f.assert_main_chain_contiguous();
}

#[test]
fn parallel_ingestion_keeps_indices_gap_free() {
    // Build the DAG once to obtain a valid unit set, then replay it from
    // several threads in scrambled order.
    let source = Fixture::new(3);
    let mut units = Vec::new();
    let mut frontier = vec![source.genesis];
    for n in 0..48u64 {
        let author = (n % 3) as usize;
        let parents: Vec<Hash> = frontier.iter().rev().take(2).copied().collect();
        let unit = source.unit(author, parents, n + 1);
        source.insert(&unit);
        frontier.push(unit.hash());
        units.push(unit);
    }

    let target = Fixture::new(3);
    let queues: Vec<Mutex<VecDeque<weave_dag::Unit>>> = (0..4)
        .map(|t| {
            Mutex::new(
                units
                    .iter()
                    .rev()
                    .skip(t)
                    .step_by(4)
                    .cloned()
                    .collect(),
            )
        })
        .collect();

    std::thread::scope(|scope| {
        for queue in &queues {
            let target = &target;
            scope.spawn(move || loop {
                let Some(unit) = queue.lock().unwrap().pop_front() else {
                    break;
                };
                match target.resolver.insert_unit(unit.clone(), &target.schedule) {
                    Ok(_) | Err(DagError::Duplicate(_)) => {}
                    Err(DagError::MissingParents(_)) => {
                        queue.lock().unwrap().push_back(unit);
                        std::thread::yield_now();
                    }
                    Err(e) => panic!("unexpected rejection: {e}"),
                }
            });
        }
    });

    assert_eq!(target.resolver.unit_count(), units.len() + 1);
    assert_eq!(
        target.resolver.main_chain(&AssetId::PTN),
        source.resolver.main_chain(&AssetId::PTN)
    );
    target.assert_main_chain_contiguous();
}

#[test]
fn missing_parent_then_arrival() {
    let f = Fixture::new(3);
    let parent = f.unit(0, vec![f.genesis], 1);
    let child = f.unit(1, vec![parent.hash()], 2);
    assert_eq!(
        f.resolver.insert_unit(child.clone(), &f.schedule),
        Err(DagError::MissingParents(vec![parent.hash()]))
    );
    f.insert(&parent);
    let ins = f.insert(&child);
    assert_eq!(ins.chain_index.index, 2);
}
