use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::model::{Summary, TopTransaction, Transaction};

/// Number of transactions kept in `Summary::top_transactions`.
pub const TOP_K: usize = 3;

/// Heap key for top-K selection.
///
/// Ordered by amount, then by `transaction_id` *descending*, so that among
/// equal amounts the lexicographically smallest id ranks highest. Draining the
/// heap therefore yields amount descending, ties by id ascending.
#[derive(Debug, Clone)]
struct Ranked<'a> {
    amount: f64,
    transaction_id: &'a str,
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount
            .total_cmp(&other.amount)
            .then_with(|| other.transaction_id.cmp(self.transaction_id))
    }
}

/// Bounded min-heap holding the `k` largest amounts seen so far.
struct TopK<'a> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<'a>>>,
}

impl<'a> TopK<'a> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    fn offer(&mut self, tx: &'a Transaction) {
        if self.capacity == 0 {
            return;
        }
        let candidate = Ranked {
            amount: tx.amount,
            transaction_id: &tx.transaction_id,
        };

        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(candidate));
            return;
        }

        // Strictly greater only: an amount equal to the current minimum never
        // displaces it, so the first one seen keeps the slot.
        if let Some(Reverse(min)) = self.heap.peek() {
            if candidate.amount > min.amount {
                self.heap.pop();
                self.heap.push(Reverse(candidate));
            }
        }
    }

    fn into_descending(self) -> Vec<TopTransaction> {
        // Ascending over `Reverse<_>` is descending over `Ranked`.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| TopTransaction {
                transaction_id: r.transaction_id.to_string(),
                amount: r.amount,
            })
            .collect()
    }
}

/// Computes the aggregate summary over the full transaction set.
///
/// Pure and synchronous. Amounts are summed as raw numbers regardless of
/// currency. An empty input yields `Summary::empty()`.
pub fn compute(transactions: &[Transaction]) -> Summary {
    if transactions.is_empty() {
        return Summary::empty();
    }

    let mut total_amount = 0.0_f64;
    let mut top = TopK::new(TOP_K);

    for tx in transactions {
        total_amount += tx.amount;
        top.offer(tx);
    }

    Summary {
        total_transactions: transactions.len() as u64,
        average_amount: total_amount / transactions.len() as f64,
        top_transactions: top.into_descending(),
    }
}
