//! String-keyed map of 64-bit values

use rustc_hash::FxHashMap;

/// Maps string tokens to values; 0 is never stored and reads as absent.
#[derive(Debug, Default)]
pub struct StringToLongMap {
    map: FxHashMap<String, u64>,
}

impl StringToLongMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Storing 0 removes the key.
    pub fn put(&mut self, key: &str, value: u64) {
        if value == 0 {
            self.map.remove(key);
        } else {
            self.map.insert(key.to_string(), value);
        }
    }

    /// The value under `key`, or 0.
    pub fn get(&self, key: &str) -> u64 {
        self.map.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_means_absent() {
        let mut map = StringToLongMap::new();
        assert_eq!(map.get("x"), 0);
        map.put("x", 9);
        assert_eq!(map.get("x"), 9);
        map.put("x", 0);
        assert!(map.is_empty());
    }
}
