//! Type-state markers for the client builder
//!
//! `build()` only exists on `WebSocketClientBuilder<HasUrl, HasRouter, ..>`,
//! so a client without a URL or router does not compile.

use std::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Whether the URL has been provided
pub trait UrlState: sealed::Sealed {}

/// Whether the router (and its handlers) has been provided
pub trait RouterState: sealed::Sealed {}

pub struct NoUrl;
pub struct HasUrl;
pub struct NoRouter;
pub struct HasRouter;

impl sealed::Sealed for NoUrl {}
impl sealed::Sealed for HasUrl {}
impl sealed::Sealed for NoRouter {}
impl sealed::Sealed for HasRouter {}

impl UrlState for NoUrl {}
impl UrlState for HasUrl {}
impl RouterState for NoRouter {}
impl RouterState for HasRouter {}

/// Zero-sized carrier of the builder's current states
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U, R> {
    _url: PhantomData<U>,
    _router: PhantomData<R>,
}

impl<U, R> TypeState<U, R> {
    pub(crate) fn new() -> Self {
        Self {
            _url: PhantomData,
            _router: PhantomData,
        }
    }
}
