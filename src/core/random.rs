use rand::Rng;

/// Source of the uniform random picks used for voices, styles, tracks and loops.
pub trait Chooser: Send + Sync {
    /// Returns an index in `0..len`. `len` is never zero.
    fn index(&self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngChooser;

impl Chooser for ThreadRngChooser {
    fn index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Always picks the same position, clamped to the slice.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedChooser(pub usize);

impl Chooser for FixedChooser {
    fn index(&self, len: usize) -> usize {
        self.0.min(len - 1)
    }
}

pub fn pick<'a, T>(chooser: &dyn Chooser, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(chooser.index(items.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_empty() {
        let items: Vec<u8> = vec![];
        assert!(pick(&ThreadRngChooser, &items).is_none());
    }

    #[test]
    fn test_fixed_chooser_clamps() {
        let items = ["a", "b", "c"];
        assert_eq!(pick(&FixedChooser(1), &items), Some(&"b"));
        assert_eq!(pick(&FixedChooser(10), &items), Some(&"c"));
    }

    #[test]
    fn test_thread_rng_in_range() {
        let items = [1, 2, 3, 4];
        for _ in 0..50 {
            assert!(items.contains(pick(&ThreadRngChooser, &items).unwrap()));
        }
    }
}
