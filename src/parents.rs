use crate::handle::Handle;

/// Which input of the derivation a parent was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

/// Something that can name a single parent of a new registration.
///
/// Implemented for [`Handle`] and `Option<Handle>`, so call sites that only
/// sometimes have a tracked input can pass it through unchanged.
pub trait Parent: Copy {
    fn handle(&self) -> Option<Handle>;
}

impl Parent for Handle {
    fn handle(&self) -> Option<Handle> {
        Some(*self)
    }
}

impl Parent for Option<Handle> {
    fn handle(&self) -> Option<Handle> {
        *self
    }
}

/// The set of handles a new resource was derived from.
///
/// Derivations in the bridge take at most two tracked inputs: generators and
/// host uploads take none, unary maps and transposes take one, binary maps,
/// products and joins take two. This trait is implemented for `()`, for a
/// single [`Parent`], and for tuples of one or two of them.
pub trait Parents {
    /// Returns the left and right parent, in that order.
    fn sides(&self) -> [Option<Handle>; 2];
}

impl Parents for () {
    fn sides(&self) -> [Option<Handle>; 2] {
        [None, None]
    }
}

impl<P> Parents for P
where
    P: Parent,
{
    fn sides(&self) -> [Option<Handle>; 2] {
        [self.handle(), None]
    }
}

impl<A> Parents for (A,)
where
    A: Parent,
{
    fn sides(&self) -> [Option<Handle>; 2] {
        [self.0.handle(), None]
    }
}

impl<A, B> Parents for (A, B)
where
    A: Parent,
    B: Parent,
{
    fn sides(&self) -> [Option<Handle>; 2] {
        [self.0.handle(), self.1.handle()]
    }
}
