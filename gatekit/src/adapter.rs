//! Wraps route handlers so every failure reaches the error channel.
//!
//! ```ignore
//! web::get().to(guard(|| async { Err::<HttpResponse, _>(AppError::bad_request("nope")) }))
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use actix_web::Handler;
use futures_util::future::{ready, FutureExt, LocalBoxFuture};

use crate::error::HandlerError;

/// Wraps `handler` so its errors and panics become [`HandlerError`] responses.
pub fn guard<F>(handler: F) -> Guarded<F> {
    Guarded(handler)
}

#[derive(Clone)]
pub struct Guarded<F>(F);

impl<F, Args, R, E> Handler<Args> for Guarded<F>
where
    F: Handler<Args, Output = Result<R, E>>,
    F::Future: 'static,
    R: 'static,
    E: Into<HandlerError> + 'static,
{
    type Output = Result<R, HandlerError>;
    type Future = LocalBoxFuture<'static, Self::Output>;

    fn call(&self, args: Args) -> Self::Future {
        // the call itself may panic before a future exists
        let fut = match catch_unwind(AssertUnwindSafe(|| self.0.call(args))) {
            Ok(fut) => fut,
            Err(panic) => return ready(Err(panicked(panic))).boxed_local(),
        };

        async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result.map_err(Into::into),
                Err(panic) => Err(panicked(panic)),
            }
        }
        .boxed_local()
    }
}

fn panicked(panic: Box<dyn Any + Send>) -> HandlerError {
    let message = panic_message(panic.as_ref());
    log::error!("handler panicked: {message}");
    HandlerError::from(anyhow::Error::msg(message))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::new()
    }
}
