//! # Handlers
//!
//! A [`Handler`] is the processing logic a pool runs for each payload. The
//! pool only ever invokes it; what it does is entirely up to the caller.
//!
//! Handlers see the payload's context, its error (if the payload carried one)
//! and its data (if it carried a value), and return:
//!
//! - `Ok(Some(value))`: forwarded to every subscriber's data entry point
//! - `Ok(None)`: nothing is forwarded
//! - `Err(error)`: forwarded to every subscriber's error entry point

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use crate::context::Context;
use crate::error::StageError;

pub type HandlerResult<O> = std::result::Result<Option<O>, StageError>;

/// Processing logic for one pool
#[async_trait]
pub trait Handler<I: Send + 'static, O: Send + 'static>: Send + Sync + 'static {
    async fn handle(
        &self,
        ctx: &Context,
        error: Option<StageError>,
        data: Option<I>,
    ) -> HandlerResult<O>;
}

/// Handler backed by a synchronous function
pub struct FnHandler<F> {
    f: F,
}

/// Turn a synchronous function into a [`Handler`].
///
/// The function runs inline on the executor task, so it should not block for
/// long; use [`async_handler_fn`] for work that waits.
pub fn handler_fn<I, O, F>(f: F) -> FnHandler<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&Context, Option<StageError>, Option<I>) -> HandlerResult<O> + Send + Sync + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<I, O, F> Handler<I, O> for FnHandler<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&Context, Option<StageError>, Option<I>) -> HandlerResult<O> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        ctx: &Context,
        error: Option<StageError>,
        data: Option<I>,
    ) -> HandlerResult<O> {
        (self.f)(ctx, error, data)
    }
}

/// Handler backed by an async function taking an owned context
pub struct AsyncFnHandler<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

pub fn async_handler_fn<I, O, F, Fut>(f: F) -> AsyncFnHandler<F, Fut>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(Context, Option<StageError>, Option<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<O>> + Send + 'static,
{
    AsyncFnHandler {
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<I, O, F, Fut> Handler<I, O> for AsyncFnHandler<F, Fut>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(Context, Option<StageError>, Option<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<O>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: &Context,
        error: Option<StageError>,
        data: Option<I>,
    ) -> HandlerResult<O> {
        (self.f)(ctx.clone(), error, data).await
    }
}
