use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Orders the keys of `graph` so that each key comes after the keys it depends on.
///
/// Depth-first post-order over the keys in map order. Dependencies that are not
/// keys are ignored. An edge back into the current path closes a cycle and is
/// skipped, so every key is returned exactly once whatever the input.
pub fn order_functions<K: Ord + Clone>(graph: &BTreeMap<K, Vec<K>>) -> Vec<K> {
    let mut states: BTreeMap<&K, VisitState> = BTreeMap::new();
    let mut order = Vec::with_capacity(graph.len());

    for (root, dependencies) in graph {
        if states.contains_key(root) {
            continue;
        }
        states.insert(root, VisitState::InProgress);
        let mut stack = vec![(root, dependencies.iter())];

        loop {
            let Some((node, pending)) = stack.last_mut() else {
                break;
            };
            let node = *node;
            match pending.next() {
                Some(dependency) => {
                    if let Some((key, next)) = graph.get_key_value(dependency) {
                        // visited keys are either done or on the path (a cycle)
                        if !states.contains_key(key) {
                            states.insert(key, VisitState::InProgress);
                            stack.push((key, next.iter()));
                        }
                    }
                }
                None => {
                    states.insert(node, VisitState::Done);
                    order.push(node.clone());
                    stack.pop();
                }
            }
        }
    }

    order
}
