use std::marker::PhantomData;

/// The backend that owns the memory behind every registered resource.
///
/// The registry never looks inside a resource. It only hands each one back
/// to [`free`](Self::free), exactly once, when the resource is destroyed.
pub trait ResourceFactory {
    /// The array object (or raw pointer wrapper) allocated by the backend.
    type Resource;

    /// Releases a resource previously handed to the registry.
    fn free(&mut self, resource: Self::Resource);
}

impl<F> ResourceFactory for &mut F
where
    F: ResourceFactory,
{
    type Resource = F::Resource;

    fn free(&mut self, resource: Self::Resource) {
        (**self).free(resource)
    }
}

/// Factory for resources whose `Drop` already releases them.
pub struct Dropping<R>(PhantomData<fn(R)>);

impl<R> Dropping<R> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R> Default for Dropping<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResourceFactory for Dropping<R> {
    type Resource = R;

    fn free(&mut self, resource: R) {
        drop(resource);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::Registry;

    #[test]
    fn test_dropping_releases_on_destroy() {
        let array = Rc::new([1.0f32; 4]);
        let mut reg = Registry::new(Dropping::new());

        let a = reg.register(Rc::clone(&array), ()).unwrap();
        let b = reg.register(Rc::clone(&array), a).unwrap();
        assert_eq!(Rc::strong_count(&array), 3);

        reg.destroy(b);
        assert_eq!(Rc::strong_count(&array), 1);
    }
}
