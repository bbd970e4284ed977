//! Producer-to-consumer category mapping.

use crate::category::Category;

/// Ordered mapping from producer categories to consumer categories.
///
/// Mapping is additive: mapping the same producer twice appends the new
/// consumers after the existing ones. Consumers already mapped are not
/// duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMapping {
    table: Vec<(Category, Vec<Category>)>,
}

impl ClassMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends consumers for a producer category.
    pub fn map<I, C>(&mut self, producer: impl Into<Category>, consumers: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        let producer = producer.into();
        let index = match self.table.iter().position(|(p, _)| *p == producer) {
            Some(index) => index,
            None => {
                self.table.push((producer, Vec::new()));
                self.table.len() - 1
            }
        };
        let entry = &mut self.table[index].1;
        for consumer in consumers {
            let consumer = consumer.into();
            if !entry.contains(&consumer) {
                entry.push(consumer);
            }
        }
    }

    /// Returns the consumers mapped for a producer category. Empty if
    /// unmapped.
    pub fn get(&self, producer: &str) -> &[Category] {
        self.table
            .iter()
            .find(|(p, _)| p.as_str() == producer)
            .map(|(_, consumers)| consumers.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates over producer categories in the order they were first mapped.
    pub fn iter(&self) -> impl Iterator<Item = (&Category, &[Category])> {
        self.table.iter().map(|(p, c)| (p, c.as_slice()))
    }

    /// Returns the number of mapped producer categories.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every mapping.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_is_empty() {
        let mapping = ClassMapping::new();
        assert!(mapping.get("NsyncTestFoo").is_empty());
    }

    #[test]
    fn mapping_appends_in_order() {
        let mut mapping = ClassMapping::new();
        mapping.map("NsyncTestFoo", ["NsyncTestBar"]);
        mapping.map("NsyncTestFoo", ["NsyncTestBaz", "NsyncTestBar"]);

        let consumers: Vec<&str> = mapping
            .get("NsyncTestFoo")
            .iter()
            .map(Category::as_str)
            .collect();
        assert_eq!(consumers, ["NsyncTestBar", "NsyncTestBaz"]);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let mut mapping = ClassMapping::new();
        mapping.map("A", ["B"]);
        mapping.clear();
        assert!(mapping.is_empty());
        assert!(mapping.get("A").is_empty());
    }
}
