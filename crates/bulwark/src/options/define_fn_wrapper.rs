// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a clonable, thread-safe wrapper around a user callback.
///
/// ```rust,ignore
/// define_fn_wrapper!(ShouldHandle<T>(Fn(outcome: &Outcome<T>) -> bool));
/// ```
///
/// The generated type stores an `Arc<dyn Fn(..) + Send + Sync>` and provides `new`, `call`,
/// `Clone` and an opaque `Debug`. Parameter names are optional; without a return type the
/// callback returns `()`.
macro_rules! define_fn_wrapper {
    ($name:ident<$($generics:ident),*>(Fn($($arg:ident: $arg_ty:ty),*) -> $ret:ty)) => {
        pub(crate) struct $name<$($generics),*>(std::sync::Arc<dyn Fn($($arg_ty),*) -> $ret + Send + Sync>);

        impl<$($generics),*> $name<$($generics),*> {
            pub(crate) fn new<F>(callback: F) -> Self
            where
                F: Fn($($arg_ty),*) -> $ret + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(callback))
            }

            pub(crate) fn call(&self, $($arg: $arg_ty),*) -> $ret {
                (self.0)($($arg),*)
            }
        }

        impl<$($generics),*> Clone for $name<$($generics),*> {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl<$($generics),*> std::fmt::Debug for $name<$($generics),*> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };

    ($name:ident<$($generics:ident),*>(Fn($($arg:ident: $arg_ty:ty),*))) => {
        $crate::options::define_fn_wrapper!($name<$($generics),*>(Fn($($arg: $arg_ty),*) -> ()));
    };

    ($name:ident<$($generics:ident),*>(Fn($first:ty, $second:ty) -> $ret:ty)) => {
        $crate::options::define_fn_wrapper!($name<$($generics),*>(Fn(first: $first, second: $second) -> $ret));
    };

    ($name:ident<$($generics:ident),*>(Fn($first:ty, $second:ty))) => {
        $crate::options::define_fn_wrapper!($name<$($generics),*>(Fn(first: $first, second: $second) -> ()));
    };

    ($name:ident<$($generics:ident),*>(Fn($first:ty) -> $ret:ty)) => {
        $crate::options::define_fn_wrapper!($name<$($generics),*>(Fn(first: $first) -> $ret));
    };

    ($name:ident<$($generics:ident),*>(Fn($first:ty))) => {
        $crate::options::define_fn_wrapper!($name<$($generics),*>(Fn(first: $first) -> ()));
    };

    ($name:ident(Fn($($tail:tt)*))) => {
        $crate::options::define_fn_wrapper!($name<>(Fn($($tail)*)));
    };

    ($name:ident(Fn($($tail:tt)*) -> $ret:ty)) => {
        $crate::options::define_fn_wrapper!($name<>(Fn($($tail)*) -> $ret));
    };
}

pub(crate) use define_fn_wrapper;
