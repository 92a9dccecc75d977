use std::rc::Rc;

use rand::Rng;

use crate::interpreter::value::{Value, equal};

/// A Scratch list. `modified` is raised by every mutation so watchers know
/// to redraw; hosts clear it after reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct List {
    items: Vec<Value>,
    pub modified: bool,
}

/// Where a list index expression points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListIndex {
    /// A zero-based position within bounds.
    At(usize),
    /// The `all` keyword; only meaningful for deletion.
    All,
    Invalid,
}

impl List {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
            modified: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Resolves an index against a list of `length` items. Accepts 1-based
    /// numbers and the keywords `last`, `random`/`any` and `all`.
    pub fn resolve(index: &Value, length: usize, rng: &mut impl Rng) -> ListIndex {
        if let Value::String(keyword) = index {
            match &**keyword {
                "last" => {
                    return if length > 0 {
                        ListIndex::At(length - 1)
                    } else {
                        ListIndex::Invalid
                    };
                }
                "random" | "any" => {
                    return if length > 0 {
                        ListIndex::At(rng.gen_range(0..length))
                    } else {
                        ListIndex::Invalid
                    };
                }
                "all" => return ListIndex::All,
                _ => {}
            }
        }

        let position = index.cast_number().trunc();
        if position >= 1.0 && position <= length as f64 {
            ListIndex::At(position as usize - 1)
        } else {
            ListIndex::Invalid
        }
    }

    /// `item (index) of list`; out of range yields the empty string.
    pub fn item(&self, index: &Value, rng: &mut impl Rng) -> Value {
        match Self::resolve(index, self.len(), rng) {
            ListIndex::At(i) => self.items[i].clone(),
            ListIndex::All | ListIndex::Invalid => Value::default(),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
        self.modified = true;
    }

    pub fn delete(&mut self, index: &Value, rng: &mut impl Rng) {
        match Self::resolve(index, self.len(), rng) {
            ListIndex::At(i) => {
                self.items.remove(i);
            }
            ListIndex::All => self.items.clear(),
            ListIndex::Invalid => return,
        }
        self.modified = true;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.modified = true;
    }

    /// Inserts so the new item ends up at `index`; one past the end appends.
    pub fn insert(&mut self, index: &Value, value: Value, rng: &mut impl Rng) {
        if let ListIndex::At(i) = Self::resolve(index, self.len() + 1, rng) {
            self.items.insert(i, value);
            self.modified = true;
        }
    }

    pub fn replace(&mut self, index: &Value, value: Value, rng: &mut impl Rng) {
        if let ListIndex::At(i) = Self::resolve(index, self.len(), rng) {
            self.items[i] = value;
            self.modified = true;
        }
    }

    /// 1-based position of the first item equal to `value`, or 0.
    pub fn index_of(&self, value: &Value) -> usize {
        self.items
            .iter()
            .position(|item| equal(item, value))
            .map_or(0, |i| i + 1)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|item| equal(item, value))
    }

    /// The list as a single string: items are joined without separators if
    /// every item is a single character, otherwise with spaces.
    pub fn contents(&self) -> Rc<str> {
        let strings: Vec<_> = self.items.iter().map(Value::cast_string).collect();
        let single_chars = strings.iter().all(|s| s.chars().count() == 1);
        strings.join(if single_chars { "" } else { " " }).into()
    }
}

impl FromIterator<Value> for List {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn list(items: &[&str]) -> List {
        items.iter().map(|&s| Value::from(s)).collect()
    }

    #[test]
    fn keyword_indices() {
        let mut rng = StdRng::seed_from_u64(1);
        let l = list(&["a", "b", "c"]);
        assert_eq!(l.item(&"last".into(), &mut rng), Value::from("c"));
        assert_eq!(l.item(&Value::Number(1.9), &mut rng), Value::from("a"));
        assert_eq!(l.item(&Value::Number(4.0), &mut rng), Value::default());
        assert!(matches!(List::resolve(&"any".into(), 3, &mut rng), ListIndex::At(0..=2)));
        assert_eq!(List::resolve(&"last".into(), 0, &mut rng), ListIndex::Invalid);
    }

    #[test]
    fn mutation_marks_modified() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut l = list(&["a", "b"]);
        assert!(!l.modified);

        l.delete(&Value::Number(5.0), &mut rng);
        assert!(!l.modified);

        l.insert(&Value::Number(3.0), "c".into(), &mut rng);
        assert!(l.modified);
        assert_eq!(l, {
            let mut expected = list(&["a", "b", "c"]);
            expected.modified = true;
            expected
        });

        l.delete(&"all".into(), &mut rng);
        assert!(l.is_empty());
    }

    #[test]
    fn contents_joining() {
        assert_eq!(&*list(&["a", "b", "c"]).contents(), "abc");
        assert_eq!(&*list(&["hello", "b"]).contents(), "hello b");
        assert_eq!(&*List::new([Value::Number(1.0), Value::Number(2.0)]).contents(), "12");
    }

    #[test]
    fn lookups_use_scratch_equality() {
        let l = list(&["Apple", "10"]);
        assert_eq!(l.index_of(&"apple".into()), 1);
        assert_eq!(l.index_of(&Value::Number(10.0)), 2);
        assert!(!l.contains(&"pear".into()));
    }
}
