use std::cell::Cell;

use uuid::Uuid;

/// Supplies globally unique identifiers for new quote, section and item
/// records. Only uniqueness is required, not a format.
pub trait IdGenerator {
    fn next_id(&self) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids, for fixtures and tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: Cell<u64>,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), next: Cell::new(1) }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let value = self.next.get();
        self.next.set(value + 1);
        format!("{}-{value}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};

    #[test]
    fn sequential_ids_increment() {
        let ids = SequentialIdGenerator::new("q");
        assert_eq!(ids.next_id(), "q-1");
        assert_eq!(ids.next_id(), "q-2");
    }

    #[test]
    fn uuid_ids_do_not_repeat() {
        let ids = UuidIdGenerator;
        let generated = (0..64).map(|_| ids.next_id()).collect::<HashSet<_>>();
        assert_eq!(generated.len(), 64);
    }
}
