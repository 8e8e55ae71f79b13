//! Middleware pipeline — composable logic that wraps every routed request.
//!
//! Each middleware receives the request [`Context`] and a [`Next`] cursor. It
//! can inspect the request, call [`Next::run`] to reach the rest of the chain
//! (and finally the route handler), and decorate the response on the way out.
//!
//! Built-in middleware:
//!
//! - [`LoggerMiddleware`] — one structured log line per request.
//! - [`RecoverMiddleware`] — turns a panicking handler into a `500` response
//!   instead of a dropped connection.

use std::any::Any;
use std::{future::Future, pin::Pin, sync::Arc};

use tokio::time::Instant;
use tracing::{error, info};

use crate::error::ApiError;
use crate::router::Handler;
use crate::{Response, context::Context};

/// Boxed, `Send` future returned by every middleware and handler.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// Once every middleware has run, the next call reaches the `endpoint`: the
/// handler of the matched route, or the router's fallback. `Next` is consumed
/// by [`run`](Self::run), so a middleware can forward a request at most once.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    index: usize,
    endpoint: Handler,
}

impl Next {
    /// Positions a cursor at the start of `middlewares`, ending at `endpoint`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, endpoint: Handler) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint once the chain is exhausted.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let middleware = Arc::clone(&self.middlewares[self.index]);
            self.index += 1;
            middleware(ctx, self).await
        } else {
            (self.endpoint)(ctx).await
        }
    }
}

/// The trait every middleware implements.
///
/// Implementations may pass through (`next.run(ctx).await`), short-circuit by
/// returning a response without calling `next`, or decorate the downstream
/// response. They are shared across connection tasks, hence `Send + Sync`.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture;
}

/// Logs method, path, query, status and elapsed time once the response is ready.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_owned();
            let query = ctx.request().query_string().unwrap_or_default().to_owned();
            let body_len = ctx.request().body().len();

            let response = next.run(ctx).await;

            info!(
                %method,
                %path,
                %query,
                body_len,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );

            response
        })
    }
}

/// Runs the rest of the chain on its own task so that a panic anywhere below
/// is caught and answered with [`ApiError::Uncategorized`].
pub struct RecoverMiddleware;

impl Middleware for RecoverMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(async move {
            match tokio::spawn(next.run(ctx)).await {
                Ok(response) => response,
                Err(join_error) if join_error.is_panic() => {
                    let description = panic_message(join_error.into_panic());
                    error!(panic = %description, "request handler panicked");
                    ApiError::Uncategorized(description).into_response()
                }
                Err(join_error) => ApiError::Internal(join_error.to_string()).into_response(),
            }
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, StatusCode};

    fn context() -> Context {
        let raw = b"GET /api/gestures/hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
        Context::new(Request::parse(raw).unwrap().0)
    }

    fn endpoint(status: StatusCode) -> Handler {
        Arc::new(move |_ctx: Context| -> BoxFuture {
            Box::pin(async move { Response::new(status) })
        })
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Order", tag);
                response
            })
        }
    }

    struct Reject;

    impl Middleware for Reject {
        fn handle(&self, _ctx: Context, _next: Next) -> BoxFuture {
            Box::pin(async { Response::new(StatusCode::BadRequest) })
        }
    }

    async fn explode(_ctx: Context) -> Response {
        panic!("store exploded")
    }

    #[tokio::test]
    async fn empty_chain_reaches_endpoint() {
        let next = Next::new(Vec::new(), endpoint(StatusCode::NoContent));
        assert_eq!(next.run(context()).await.status(), StatusCode::NoContent);
    }

    #[tokio::test]
    async fn middlewares_unwind_innermost_first() {
        let chain = vec![
            from_middleware(Arc::new(Tag("outer"))),
            from_middleware(Arc::new(Tag("inner"))),
        ];
        let response = Next::new(chain, endpoint(StatusCode::Ok))
            .run(context())
            .await;
        let order: Vec<_> = response
            .headers()
            .iter()
            .filter(|(name, _)| *name == "X-Order")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(order, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_endpoint() {
        let chain = vec![from_middleware(Arc::new(Reject))];
        let response = Next::new(chain, endpoint(StatusCode::Ok)).run(context()).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let chain = vec![from_middleware(Arc::new(LoggerMiddleware))];
        let response = Next::new(chain, endpoint(StatusCode::Created))
            .run(context())
            .await;
        assert_eq!(response.status(), StatusCode::Created);
    }

    #[tokio::test]
    async fn recover_turns_panic_into_500() {
        let panicking: Handler = Arc::new(|ctx: Context| -> BoxFuture { Box::pin(explode(ctx)) });
        let chain = vec![from_middleware(Arc::new(RecoverMiddleware))];
        let response = Next::new(chain, panicking).run(context()).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(
            response.body_text(),
            "unexpected error executing request : store exploded"
        );
    }

    #[test]
    fn panic_message_handles_formatted_payloads() {
        let payload: Box<dyn Any + Send> = Box::new(format!("bad key {}", 7));
        assert_eq!(panic_message(payload), "bad key 7");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload), "handler panicked");
    }
}
