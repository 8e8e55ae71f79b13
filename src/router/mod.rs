//! Request routing — an explicit table from (method, path pattern) to handler.
//!
//! Two pattern styles are supported:
//!
//! | Pattern                      | Example match              | Captured params            |
//! |------------------------------|----------------------------|----------------------------|
//! | `/api/gestures`              | `/api/gestures`            | *(none)*                   |
//! | `/api/gestures/:gestureType` | `/api/gestures/hello`      | `gestureType → "hello"`    |
//!
//! Trailing slashes are ignored on patterns and paths alike. Routes are tried
//! in registration order and the first match wins, so a literal route such as
//! `/api/gestures/all` must be registered before the parameterized one it
//! overlaps with.
//!
//! Every dispatched request, matched or not, runs through the middleware
//! registered with [`Router::layer`].

use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::error::ApiError;
use crate::http::headers::names;
use crate::http::request::decode_component;
use crate::middleware::{BoxFuture, Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler stored in the routing table.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture + Send + Sync + 'static>;

/// Anything callable as `Fn(Context) -> impl Future<Output = Response>`.
///
/// Router methods take `impl IntoHandler` so plain closures and `async fn`s
/// can be registered without boxing at the call site.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        Box::pin((self)(ctx))
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone)]
enum Pattern {
    /// One literal path, e.g. `/api/gestures`.
    Exact(String),
    /// Fixed segment count with named captures, e.g. `/api/gestures/:gestureType`.
    Parameterized { segments: Vec<Segment> },
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if !pattern.contains(':') {
            return Pattern::Exact(pattern.to_owned());
        }

        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Parameter(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect();

        Pattern::Parameterized { segments }
    }

    /// Matches `path`, returning the decoded captures on success.
    ///
    /// A capture never matches an empty segment, so `/api/gestures//` is not
    /// a request for the gesture type `""`.
    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').skip(1).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (segment, actual) in segments.iter().zip(path_segments) {
                    match segment {
                        Segment::Static(expected) if expected == actual => {}
                        Segment::Static(_) => return None,
                        Segment::Parameter(_) if actual.is_empty() => return None,
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), decode_component(actual));
                        }
                    }
                }
                Some(params)
            }
        }
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Routing table plus the middleware stack wrapped around every dispatch.
///
/// # Examples
///
/// ```rust
/// use gestures::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/api/gestures/:gestureType", |ctx: gestures::context::Context| async move {
///     let key = ctx.param("gestureType").unwrap_or_default().to_owned();
///     Response::text(StatusCode::Ok, key)
/// });
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    middlewares: Vec<MiddlewareHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(&[Method::Get], path, handler);
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(&[Method::Post], path, handler);
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(&[Method::Put], path, handler);
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(&[Method::Delete], path, handler);
    }

    /// Registers one handler for several methods, e.g. `POST` and `PUT`.
    pub fn on(&mut self, methods: &[Method], path: &str, handler: impl IntoHandler) {
        self.add_route(methods, path, handler);
    }

    fn add_route(&mut self, methods: &[Method], path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        let pattern = Pattern::parse(path);
        for method in methods {
            self.routes.push(Route {
                method: method.clone(),
                pattern: pattern.clone(),
                handler: Arc::clone(&handler),
            });
        }
    }

    /// Appends a middleware. The first one added is the outermost.
    pub fn layer(&mut self, middleware: impl Middleware + 'static) {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
    }

    /// Number of (method, pattern) entries in the table.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `request` through the middleware stack to its handler.
    ///
    /// Without a matching route the endpoint becomes a fallback: `405` with an
    /// `Allow` header when the path is known under other methods, `404`
    /// otherwise.
    pub async fn route(&self, request: Request) -> Response {
        let mut allowed: Vec<&str> = Vec::new();
        let mut matched = None;

        for route in &self.routes {
            if let Some(params) = route.pattern.matches(request.path()) {
                if &route.method == request.method() {
                    matched = Some((Arc::clone(&route.handler), params));
                    break;
                }
                if !allowed.contains(&route.method.as_str()) {
                    allowed.push(route.method.as_str());
                }
            }
        }

        let (endpoint, params) = match matched {
            Some(found) => found,
            None if !allowed.is_empty() => (method_not_allowed(allowed.join(", ")), PathParams::new()),
            None => (no_route(), PathParams::new()),
        };

        let ctx = Context::with_params(request, params);
        Next::new(self.middlewares.clone(), endpoint).run(ctx).await
    }
}

fn method_not_allowed(allow: String) -> Handler {
    Arc::new(move |ctx: Context| -> BoxFuture {
        let response = Response::text(
            StatusCode::MethodNotAllowed,
            format!("method {} not allowed", ctx.request().method()),
        )
        .header(names::ALLOW, allow.clone());
        Box::pin(async move { response })
    })
}

fn no_route() -> Handler {
    Arc::new(|ctx: Context| -> BoxFuture {
        let err = ApiError::NotFound(format!("no route for {}", ctx.request().path()));
        Box::pin(async move { err.into_response() })
    })
}
