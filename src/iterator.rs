use crate::error::Result;

pub trait DBIterator {
    fn valid(&self) -> bool;

    fn seek_to_first(&mut self);

    fn seek_to_last(&mut self);

    fn seek(&mut self, target: &[u8]);

    fn next(&mut self);

    fn prev(&mut self);

    fn key(&self) -> &[u8];

    fn value(&self) -> &[u8];

    fn status(&mut self) -> Result<()>;
}

/// An iterator that is always invalid, used as the degenerate zero-child
/// case of a merging iterator.
pub struct EmptyIterator;

impl DBIterator for EmptyIterator {
    fn valid(&self) -> bool {
        false
    }
    fn seek_to_first(&mut self) {}
    fn seek_to_last(&mut self) {}
    fn seek(&mut self, _target: &[u8]) {}
    fn next(&mut self) {
        panic!("next called on an invalid iterator");
    }
    fn prev(&mut self) {
        panic!("prev called on an invalid iterator");
    }
    fn key(&self) -> &[u8] {
        panic!("key called on an invalid iterator");
    }
    fn value(&self) -> &[u8] {
        panic!("value called on an invalid iterator");
    }
    fn status(&mut self) -> Result<()> {
        Ok(())
    }
}
