use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use hydra_model::{CodecError, FunctionCall, JobKind, JobSpec, JsonCodec, PayloadCodec};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    error::{ExecError, ExecResult},
    runner::Runner,
};

type RawFn = dyn Fn(Value, Value) -> ExecResult<Value> + Send + Sync;

/// Runs FUNCTION jobs against functions registered by name.
///
/// Arguments and results use the JSON codec; specs naming another codec are refused.
/// Functions run on the blocking pool.
#[derive(Default)]
pub struct FnRegistry {
    functions: RwLock<HashMap<String, Arc<RawFn>>>,
}

impl FnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed function taking the decoded positional arguments.
    pub fn register<I, O, F>(&self, name: impl Into<String>, func: F) -> &Self
    where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Result<O, String> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Arc::new(move |args: Value, _kwargs: Value| -> ExecResult<Value> {
                let input: I = serde_json::from_value(args)
                    .map_err(|e| ExecError::Codec(CodecError::Decode(e.to_string())))?;
                let output = func(input).map_err(ExecError::Function)?;
                serde_json::to_value(output)
                    .map_err(|e| ExecError::Codec(CodecError::Encode(e.to_string())))
            }),
        );
        self
    }

    /// Register a function over raw `(args, kwargs)` values.
    pub fn register_raw<F>(&self, name: impl Into<String>, func: F) -> &Self
    where
        F: Fn(Value, Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Arc::new(move |args: Value, kwargs: Value| {
                func(args, kwargs).map_err(ExecError::Function)
            }),
        );
        self
    }

    fn insert(&self, name: String, func: Arc<RawFn>) {
        trace!(callable = %name, "function registered");
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, func);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, name: &str) -> Option<Arc<RawFn>> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Decode `call`, run the registered function and encode its result.
    pub async fn invoke(
        &self,
        call: &FunctionCall,
        cancel: CancellationToken,
    ) -> ExecResult<Vec<u8>> {
        if call.codec != JsonCodec::NAME {
            return Err(CodecError::Unsupported(call.codec.clone()).into());
        }
        let func = self
            .resolve(&call.callable)
            .ok_or_else(|| ExecError::FunctionNotFound(call.callable.clone()))?;

        let args = JsonCodec.decode(&call.args)?;
        let kwargs = JsonCodec.decode(&call.kwargs)?;

        let task = tokio::task::spawn_blocking(move || func(args, kwargs));
        let value = tokio::select! {
            joined = task => match joined {
                Ok(result) => result?,
                Err(e) => return Err(ExecError::Function(format!("function panicked: {e}"))),
            },
            _ = cancel.cancelled() => return Err(ExecError::Cancelled),
        };

        debug!(callable = %call.callable, "function returned");
        Ok(JsonCodec.encode(&value)?)
    }
}

#[async_trait]
impl Runner for FnRegistry {
    fn name(&self) -> &'static str {
        "fn"
    }

    fn supports(&self, spec: &JobSpec) -> bool {
        matches!(spec.kind(), JobKind::Function(_))
    }

    async fn run(&self, spec: &JobSpec, cancel: CancellationToken) -> ExecResult<Option<Vec<u8>>> {
        let JobKind::Function(call) = spec.kind() else {
            return Err(ExecError::UnsupportedKind(spec.kind().kind()));
        };
        self.invoke(call, cancel).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Input {
        path: String,
    }

    fn call(name: &str, args: &str) -> FunctionCall {
        FunctionCall::new(name, args.as_bytes().to_vec(), b"{}".to_vec())
    }

    #[tokio::test]
    async fn typed_function_round_trips_through_json() {
        let registry = FnRegistry::new();
        registry.register("analyze_data", |(input,): (Input,)| {
            Ok::<_, String>(serde_json::json!({ "status": "success", "path": input.path }))
        });

        let out = registry
            .invoke(&call("analyze_data", r#"[{"path":"/data/in.csv"}]"#), CancellationToken::new())
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["path"], "/data/in.csv");
    }

    #[tokio::test]
    async fn raw_function_sees_kwargs() {
        let registry = FnRegistry::new();
        registry.register_raw("scale", |args, kwargs| {
            let x = args[0].as_f64().ok_or("x must be a number")?;
            let by = kwargs["by"].as_f64().unwrap_or(1.0);
            Ok(Value::from(x * by))
        });

        let call = FunctionCall::new("scale", b"[2.5]".to_vec(), br#"{"by":4}"#.to_vec());
        let out = registry.invoke(&call, CancellationToken::new()).await.unwrap();
        assert_eq!(out, b"10.0");
    }

    #[tokio::test]
    async fn function_error_message_is_kept() {
        let registry = FnRegistry::new();
        registry.register("fail", |_: Value| Err::<Value, _>("ValueError: bad row".to_string()));

        let err = registry
            .invoke(&call("fail", "[]"), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ValueError: bad row");
    }

    #[tokio::test]
    async fn unknown_function_and_codec_are_refused() {
        let registry = FnRegistry::new();
        registry.register("noop", |_: Value| Ok::<_, String>(Value::Null));

        let err = registry
            .invoke(&call("missing", "[]"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::FunctionNotFound(_)));

        let err = registry
            .invoke(&call("noop", "[]").with_codec("pickle"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Codec(CodecError::Unsupported(_))));
    }

    #[test]
    fn unregister_removes_the_function() {
        let registry = FnRegistry::new();
        registry.register("noop", |_: Value| Ok::<_, String>(Value::Null));
        assert!(registry.is_registered("noop"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("noop"));
        assert!(registry.is_empty());
    }
}
