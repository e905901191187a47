//! Isolated execution of compiled widget modules.
//!
//! Every widget gets its own engine context. The module body runs inside a
//! function scope whose only bindings are `exports`, `require` and `React`;
//! whatever goes wrong on the way (compile, import resolution, top-level
//! throw, missing export) comes back as a [`Diagnostic`], never as a panic or
//! an `Err` the caller has to route.

mod host;

use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    time::Instant,
};

use boa_engine::{
    context::ContextBuilder,
    object::{FunctionObjectBuilder, ObjectInitializer},
    Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue,
    NativeFunction, Source,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    compiler::{CompileError, SourceCompiler},
    config::{
        errors::{
            ERR_SANDBOX_CONTEXT, ERR_SANDBOX_EVAL, ERR_SANDBOX_EXPORT, ERR_SANDBOX_RENDER,
            ERR_SANDBOX_RUNTIME,
        },
        limits::SandboxLimits,
    },
    resolver::{Capability, CapabilityResolver, ResolutionError},
};

pub const NO_SUCH_EXPORT: &str = "no such export";

/// Key under which `require` records a rejected symbol.
const DENIED_SYMBOL: &str = "symbol";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Compile,
    Resolution,
    Runtime,
    ExportNotFound,
    Render,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Compile => "compile",
            DiagnosticKind::Resolution => "resolution",
            DiagnosticKind::Runtime => "runtime",
            DiagnosticKind::ExportNotFound => "export-not-found",
            DiagnosticKind::Render => "render",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized failure of one load or render attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind} error: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub stack: Option<String>,
    /// The source exactly as it was handed to the executor.
    pub offending_code: String,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, message: impl Into<String>, source: &str) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: None,
            offending_code: source.to_string(),
        }
    }

    fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }

    fn from_compile(err: CompileError) -> Self {
        let stack = err.location();
        Self {
            kind: DiagnosticKind::Compile,
            message: err.message,
            stack,
            offending_code: err.source_code,
        }
    }
}

/// One node of a rendered element tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RenderNode {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<RenderNode>,
    },
}

/// A successfully executed module with its component export.
///
/// Owns the engine context the module ran in, so renders see the module's
/// own top-level state and nothing else.
pub struct LoadedComponent {
    context: Context,
    component: JsObject,
    renderer: JsObject,
    export_name: String,
    source: String,
}

impl fmt::Debug for LoadedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedComponent")
            .field("export_name", &self.export_name)
            .field("source_bytes", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl LoadedComponent {
    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    /// Render the component with `props` into an element tree.
    pub fn render(&mut self, props: &Value) -> Result<Vec<RenderNode>, Diagnostic> {
        let _span = tracing::info_span!("render_widget", export = %self.export_name).entered();
        let props_json = serde_json::to_string(props).map_err(|err| {
            Diagnostic::new(
                DiagnosticKind::Render,
                format!("{ERR_SANDBOX_RENDER}: props are not serializable: {err}"),
                &self.source,
            )
        })?;

        let args = [
            JsValue::from(self.component.clone()),
            JsValue::from(JsString::from(props_json.as_str())),
        ];
        let context = &mut self.context;
        let rendered = catch_unwind(AssertUnwindSafe(|| {
            self.renderer.call(&JsValue::undefined(), &args, context)
        }));

        let value = match rendered {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                let (message, stack) = describe_error(&err, &mut self.context);
                tracing::warn!(target = "aiwidget", code = ERR_SANDBOX_RENDER, %message, "widget render threw");
                return Err(Diagnostic::new(DiagnosticKind::Render, message, &self.source)
                    .with_stack(stack));
            }
            Err(_) => {
                return Err(Diagnostic::new(
                    DiagnosticKind::Render,
                    format!("{ERR_SANDBOX_RENDER}: engine panicked while rendering"),
                    &self.source,
                ));
            }
        };

        let Some(json) = value.as_string().map(|s| s.to_std_string_escaped()) else {
            return Err(Diagnostic::new(
                DiagnosticKind::Render,
                format!("{ERR_SANDBOX_RENDER}: renderer returned a non-string value"),
                &self.source,
            ));
        };
        serde_json::from_str::<Vec<RenderNode>>(&json).map_err(|err| {
            Diagnostic::new(
                DiagnosticKind::Render,
                format!("{ERR_SANDBOX_RENDER}: rendered tree could not be decoded: {err}"),
                &self.source,
            )
        })
    }
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Success(LoadedComponent),
    Failure(Diagnostic),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            ExecutionOutcome::Success(_) => None,
            ExecutionOutcome::Failure(diagnostic) => Some(diagnostic),
        }
    }
}

/// Compiles and executes widget sources, one fresh context per load.
#[derive(Clone, Default)]
pub struct SandboxExecutor {
    compiler: SourceCompiler,
    resolver: CapabilityResolver,
    limits: SandboxLimits,
}

impl SandboxExecutor {
    pub fn new(compiler: SourceCompiler) -> Self {
        Self {
            compiler,
            resolver: CapabilityResolver::new(),
            limits: SandboxLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn compiler(&self) -> &SourceCompiler {
        &self.compiler
    }

    pub fn load(&self, source: &str, export_name: &str) -> ExecutionOutcome {
        let _span = tracing::info_span!("execute_widget", export = %export_name).entered();
        let started = Instant::now();

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.try_load(source, export_name))) {
            Ok(Ok(component)) => ExecutionOutcome::Success(component),
            Ok(Err(diagnostic)) => ExecutionOutcome::Failure(diagnostic),
            Err(_) => ExecutionOutcome::Failure(Diagnostic::new(
                DiagnosticKind::Runtime,
                format!("{ERR_SANDBOX_RUNTIME}: engine panicked while executing module"),
                source,
            )),
        };

        match &outcome {
            ExecutionOutcome::Success(_) => tracing::info!(
                target = "aiwidget",
                duration_ms = started.elapsed().as_millis() as u64,
                "widget module loaded"
            ),
            ExecutionOutcome::Failure(diagnostic) => tracing::warn!(
                target = "aiwidget",
                kind = %diagnostic.kind,
                message = %diagnostic.message,
                "widget module failed to load"
            ),
        }
        outcome
    }

    fn try_load(&self, source: &str, export_name: &str) -> Result<LoadedComponent, Diagnostic> {
        let module = self
            .compiler
            .compile(source, export_name)
            .map_err(Diagnostic::from_compile)?;

        let mut context = ContextBuilder::new().build().map_err(|err| {
            Diagnostic::new(
                DiagnosticKind::Runtime,
                format!("{ERR_SANDBOX_CONTEXT}: failed to construct JS context: {err}"),
                source,
            )
        })?;
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.limits.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.limits.recursion_limit);

        let react = eval_object(&mut context, host::REACT_PRIMITIVE, "host UI primitive", source)?;
        let renderer_factory =
            eval_object(&mut context, host::RENDER_GLUE, "render glue", source)?;
        let renderer = renderer_factory
            .call(
                &JsValue::undefined(),
                &[
                    JsValue::from(react.clone()),
                    JsValue::from(self.limits.max_render_depth),
                ],
                &mut context,
            )
            .ok()
            .and_then(|value| value.as_object().cloned())
            .ok_or_else(|| {
                Diagnostic::new(
                    DiagnosticKind::Runtime,
                    format!("{ERR_SANDBOX_CONTEXT}: render glue did not produce a function"),
                    source,
                )
            })?;

        let wrapper_src = module_wrapper(module.executable_body());
        let wrapper = match context.eval(Source::from_bytes(wrapper_src.as_bytes())) {
            Ok(value) => value.as_object().cloned(),
            Err(err) => {
                let (message, stack) = describe_error(&err, &mut context);
                return Err(Diagnostic::new(
                    DiagnosticKind::Compile,
                    format!("{ERR_SANDBOX_EVAL}: {message}"),
                    source,
                )
                .with_stack(stack));
            }
        };
        let Some(wrapper) = wrapper else {
            return Err(Diagnostic::new(
                DiagnosticKind::Compile,
                format!("{ERR_SANDBOX_EVAL}: module wrapper is not a function"),
                source,
            ));
        };

        let exports = ObjectInitializer::new(&mut context).build();
        let denials = JsObject::with_null_proto();
        let require = self.require_function(&react, &denials, &mut context);
        let args = [
            JsValue::from(exports.clone()),
            require,
            JsValue::from(react),
        ];
        if let Err(err) = wrapper.call(&JsValue::undefined(), &args, &mut context) {
            return Err(runtime_diagnostic(&err, &denials, &mut context, source));
        }

        let export = exports
            .get(JsString::from(export_name), &mut context)
            .map_err(|err| runtime_diagnostic(&err, &denials, &mut context, source))?;
        let component = match export.as_object() {
            Some(object) if object.is_callable() => object.clone(),
            _ => {
                tracing::debug!(
                    target = "aiwidget",
                    code = ERR_SANDBOX_EXPORT,
                    export = %export_name,
                    "export missing or not callable"
                );
                return Err(Diagnostic::new(DiagnosticKind::ExportNotFound, NO_SUCH_EXPORT, source));
            }
        };

        Ok(LoadedComponent {
            context,
            component,
            renderer,
            export_name: export_name.to_string(),
            source: source.to_string(),
        })
    }

    /// `require(specifier)` backed by the capability resolver. Rejections
    /// surface inside the module as a thrown `ReferenceError` and are recorded
    /// on `denials`, which module code never sees.
    fn require_function(&self, react: &JsObject, denials: &JsObject, context: &mut Context) -> JsValue {
        let resolver = self.resolver;
        let native = NativeFunction::from_copy_closure_with_captures(
            move |_this: &JsValue,
                  args: &[JsValue],
                  (react, denials): &(JsObject, JsObject),
                  context: &mut Context|
                  -> JsResult<JsValue> {
                let symbol = args
                    .get_or_undefined(0)
                    .to_string(context)?
                    .to_std_string_escaped();
                match resolver.resolve(&symbol) {
                    Ok(Capability::Ui) => Ok(JsValue::from(react.clone())),
                    Err(err) => {
                        tracing::warn!(target = "aiwidget", symbol = %err.symbol, "module reference rejected");
                        denials.set(
                            JsString::from(DENIED_SYMBOL),
                            JsString::from(err.symbol.as_str()),
                            false,
                            context,
                        )?;
                        Err(JsNativeError::reference().with_message(err.to_string()).into())
                    }
                }
            },
            (react.clone(), denials.clone()),
        );
        JsValue::from(
            FunctionObjectBuilder::new(context.realm(), native)
                .length(1)
                .build(),
        )
    }
}

/// The body sits in its own block so a module-level `import React` can
/// shadow the `React` parameter.
fn module_wrapper(body: &str) -> String {
    format!("(function (exports, require, React) {{\n{{\n{body}\n}}\nreturn exports;\n}})")
}

fn eval_object(
    context: &mut Context,
    script: &str,
    what: &str,
    source: &str,
) -> Result<JsObject, Diagnostic> {
    context
        .eval(Source::from_bytes(script.as_bytes()))
        .ok()
        .and_then(|value| value.as_object().cloned())
        .ok_or_else(|| {
            Diagnostic::new(
                DiagnosticKind::Runtime,
                format!("{ERR_SANDBOX_CONTEXT}: failed to install {what}"),
                source,
            )
        })
}

/// A failed module run is a resolution failure only when `require` itself
/// rejected a symbol; the thrown value's text is never trusted.
fn runtime_diagnostic(err: &JsError, denials: &JsObject, context: &mut Context, source: &str) -> Diagnostic {
    let (message, stack) = describe_error(err, context);
    let denied = denials
        .get(JsString::from(DENIED_SYMBOL), context)
        .ok()
        .and_then(|value| value.as_string().map(|s| s.to_std_string_escaped()));
    match denied {
        Some(symbol) => Diagnostic::new(
            DiagnosticKind::Resolution,
            ResolutionError { symbol }.to_string(),
            source,
        )
        .with_stack(stack),
        None => Diagnostic::new(DiagnosticKind::Runtime, message, source).with_stack(stack),
    }
}

/// Human-readable message and, when the engine attached one, a stack.
fn describe_error(err: &JsError, context: &mut Context) -> (String, Option<String>) {
    let opaque = err.to_opaque(context);
    let stack = opaque.as_object().and_then(|object| {
        object
            .get(JsString::from("stack"), context)
            .ok()
            .and_then(|value| value.as_string().map(|s| s.to_std_string_escaped()))
            .filter(|stack| !stack.is_empty())
    });
    let message = match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => opaque.display().to_string(),
    };
    (message, stack)
}
