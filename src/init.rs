/// Provides a constant default value.
pub trait Init {
    /// `Self`'s default value.
    const INIT: Self;
}

/// Implements [`const_default1::ConstDefault`] in terms of [`Init`] for the
/// listed types.
macro_rules! impl_const_default_via_init {
    ($($ty:ty),* $(,)?) => {
        $(
            impl const_default1::ConstDefault for $ty {
                const DEFAULT: Self = <Self as $crate::Init>::INIT;
            }
        )*
    };
}
