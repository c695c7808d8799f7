pub struct PadIter<I>
where
    I: Iterator,
{
    inner: Option<I>,
    min_len: usize,
    pad: I::Item,
}

/// Pads an iterator with clones of `pad` until at least `min_len` items have
/// been produced. The render projection uses this to keep every frame at the
/// full visible-row count.
pub trait IterExt<I>
where
    I: Iterator,
{
    fn pad(self, min_len: usize, pad: I::Item) -> PadIter<I>;
}

impl<I> IterExt<I> for I
where
    I: Iterator,
{
    fn pad(self, min_len: usize, pad: I::Item) -> PadIter<I> {
        PadIter {
            inner: Some(self),
            min_len,
            pad,
        }
    }
}

impl<I> Iterator for PadIter<I>
where
    I: Iterator,
    I::Item: Clone,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(inner) = &mut self.inner {
            if let Some(v) = inner.next() {
                self.min_len = self.min_len.saturating_sub(1);
                return Some(v);
            } else {
                self.inner = None;
            }
        }
        if self.min_len > 0 {
            self.min_len -= 1;
            Some(self.pad.clone())
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if let Some(inner) = &self.inner {
            let (min, max) = inner.size_hint();
            (min.max(self.min_len), max.map(|max| max.max(self.min_len)))
        } else {
            (self.min_len, Some(self.min_len))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_padded_to_min_len() {
        let padded: Vec<i32> = [1, 2].into_iter().pad(5, 0).collect();
        assert_eq!(padded, vec![1, 2, 0, 0, 0]);
    }

    #[test]
    fn long_input_is_left_alone() {
        let padded: Vec<i32> = [1, 2, 3].into_iter().pad(2, 0).collect();
        assert_eq!(padded, vec![1, 2, 3]);
    }
}
