//! The exposed-method registry.
//!
//! Callers supply a nested mapping from path segments to handlers;
//! lookup walks the segments at dispatch time. This is the explicit
//! `call(path, args)` surface: there is no property-interception
//! proxy, and typed wrappers belong to the application.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use streamrpc_codec::Value;

use crate::error::RpcError;

/// Future returned by a handler: the method result, or an error value
/// that becomes an Error envelope on the wire.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>;

/// An exposed method.
pub trait Handler: Send + Sync {
    fn call(&self, args: Vec<Value>) -> HandlerFuture;
}

impl std::fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

impl<F, Fut> Handler for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Value>> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> HandlerFuture {
        Box::pin(self(args))
    }
}

enum Node {
    Handler(Arc<dyn Handler>),
    Namespace(HashMap<String, Node>),
}

/// Nested registry of exposed methods, keyed by path segment.
#[derive(Default)]
pub struct Methods {
    root: HashMap<String, Node>,
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a dot-separated path, e.g.
    /// `"math.add"`. Re-registering a path replaces the previous
    /// handler; registering through an existing leaf replaces that
    /// leaf with a namespace.
    pub fn expose(mut self, path: &str, handler: impl Handler + 'static) -> Self {
        let mut segments = path.split('.').peekable();
        let mut current = &mut self.root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), Node::Handler(Arc::new(handler)));
                break;
            }
            let entry = current
                .entry(segment.to_string())
                .and_modify(|node| {
                    if matches!(node, Node::Handler(_)) {
                        *node = Node::Namespace(HashMap::new());
                    }
                })
                .or_insert_with(|| Node::Namespace(HashMap::new()));
            let Node::Namespace(children) = entry else {
                unreachable!("leaf nodes are replaced above");
            };
            current = children;
        }
        self
    }

    /// Resolve a method path to its handler.
    pub fn lookup(&self, topics: &[String]) -> Result<Arc<dyn Handler>, RpcError> {
        let not_found = || RpcError::MethodNotFound(topics.join("."));
        let (first, rest) = topics.split_first().ok_or_else(not_found)?;

        let mut node = self.root.get(first).ok_or_else(not_found)?;
        for segment in rest {
            let Node::Namespace(children) = node else {
                return Err(not_found());
            };
            node = children.get(segment).ok_or_else(not_found)?;
        }

        match node {
            Node::Handler(handler) => Ok(Arc::clone(handler)),
            Node::Namespace(_) => Err(not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn echo() -> impl Handler {
        |mut args: Vec<Value>| async move {
            Ok(args.pop().unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn exposes_and_resolves_nested_paths() {
        let methods = Methods::new()
            .expose("ping", echo())
            .expose("math.add", echo())
            .expose("math.sub", echo());

        assert!(methods.lookup(&topics(&["ping"])).is_ok());
        assert!(methods.lookup(&topics(&["math", "add"])).is_ok());
        assert!(methods.lookup(&topics(&["math", "sub"])).is_ok());

        let result = methods
            .lookup(&topics(&["ping"]))
            .unwrap()
            .call(vec![Value::from(5)])
            .await;
        assert_eq!(result, Ok(Value::from(5)));
    }

    #[test]
    fn missing_segment_is_method_not_found() {
        let methods = Methods::new().expose("math.add", echo());

        let err = methods.lookup(&topics(&["math", "mul"])).unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(path) if path == "math.mul"));
    }

    #[test]
    fn namespace_itself_is_not_callable() {
        let methods = Methods::new().expose("math.add", echo());

        let err = methods.lookup(&topics(&["math"])).unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(_)));
    }

    #[test]
    fn path_through_a_leaf_is_method_not_found() {
        let methods = Methods::new().expose("math", echo());

        let err = methods.lookup(&topics(&["math", "add"])).unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(_)));
    }

    #[test]
    fn empty_path_is_method_not_found() {
        let methods = Methods::new().expose("ping", echo());
        assert!(matches!(
            methods.lookup(&[]),
            Err(RpcError::MethodNotFound(_))
        ));
    }

    #[test]
    fn re_registering_replaces() {
        let methods = Methods::new()
            .expose("a.b", echo())
            .expose("a.b", echo())
            .expose("a", echo()); // replaces the namespace

        assert!(methods.lookup(&topics(&["a"])).is_ok());
        assert!(methods.lookup(&topics(&["a", "b"])).is_err());
    }
}
